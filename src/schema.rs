//! Per-kind attribute rules.
//!
//! The registry is built once and never mutated. Each [`SchemaRule`] names
//! one header attribute, says whether it is required, optional or
//! forbidden for its kinds, which value shapes it accepts, and carries a
//! check that turns a value into zero or more diagnostics.

use std::sync::LazyLock;

use regex::Regex;
use unicode_normalization::UnicodeNormalization;

use crate::diagnostics::{
    Diagnostic, ARGUMENT_HINT_FORMAT, COLOR_UNKNOWN, DESCRIPTION_EMPTY, DESCRIPTION_MARKUP,
    DESCRIPTION_TOO_LONG, MODEL_FORBIDDEN, MODEL_INVALID, MODEL_SHORT_ALIAS, MODEL_UNPINNED,
    NAME_EMPTY, NAME_FORMAT, NAME_RESERVED, NAME_TOO_LONG, NOT_BOOLEAN, TOOL_UNKNOWN,
    VERSION_FORMAT,
};
use crate::models::{AttributeValue, ComponentKind, Shape};

/// Maximum length of a component name.
pub const MAX_NAME_LENGTH: usize = 64;

/// Maximum length of a skill description.
pub const MAX_SKILL_DESCRIPTION_LENGTH: usize = 1024;

/// Words that may not appear as a hyphen segment of a skill name.
const RESERVED_WORDS: &[&str] = &["anthropic", "claude"];

/// Short model mnemonics.
pub const MODEL_MNEMONICS: &[&str] = &["sonnet", "opus", "haiku"];

/// Built-in tools the host knows about.
const KNOWN_TOOLS: &[&str] = &[
    "Bash",
    "BashOutput",
    "Edit",
    "ExitPlanMode",
    "Glob",
    "Grep",
    "KillShell",
    "LS",
    "MultiEdit",
    "NotebookEdit",
    "NotebookRead",
    "Read",
    "SlashCommand",
    "Skill",
    "Task",
    "TodoWrite",
    "WebFetch",
    "WebSearch",
    "Write",
];

const KNOWN_COLORS: &[&str] = &[
    "blue", "cyan", "green", "yellow", "magenta", "red", "purple", "orange", "pink",
];

static NAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-z0-9]+(-[a-z0-9]+)*$").expect("name regex must compile")
});

static XML_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[a-zA-Z/][^>]*>").expect("XML tag regex must compile"));

static VERSION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\d+(\.\d+)?$").expect("version regex must compile"));

/// `claude-<family>-<major>-<minor>` without a snapshot date.
static MODEL_VERSION_ALIAS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^claude-(haiku|sonnet|opus)-\d+-\d+$").expect("model alias regex must compile")
});

/// `claude-<family>-<major>-<minor>-<yyyymmdd>`.
static MODEL_FULL_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^claude-(haiku|sonnet|opus)-\d+-\d+-\d{8}$")
        .expect("model id regex must compile")
});

/// Whether an attribute must, may, or must not be present.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
    Forbidden,
}

/// Check run on a present attribute value.
pub type RuleCheck = fn(&AttributeValue) -> Vec<Diagnostic>;

/// One attribute rule in the registry.
#[derive(Debug, Clone)]
pub struct SchemaRule {
    /// Stable rule id (`<kind>.<attribute>`, or the attribute alone when shared).
    pub id: &'static str,
    pub attribute: &'static str,
    pub presence: Presence,
    /// Shapes the value may take. Ignored for forbidden attributes.
    pub allowed_shapes: &'static [Shape],
    /// For forbidden attributes the check produces the rejection.
    pub check: RuleCheck,
    pub kinds: &'static [ComponentKind],
}

impl SchemaRule {
    #[must_use]
    pub fn required(&self) -> bool {
        self.presence == Presence::Required
    }

    #[must_use]
    pub fn applies_to(&self, kind: ComponentKind) -> bool {
        self.kinds.contains(&kind)
    }
}

use ComponentKind::{Agent, Command, Skill};

const SCALAR: &[Shape] = &[Shape::Scalar];
const SCALAR_OR_LIST: &[Shape] = &[Shape::Scalar, Shape::List];
const ANY_SHAPE: &[Shape] = &[Shape::Scalar, Shape::List, Shape::Unknown];

const fn rule(
    id: &'static str,
    attribute: &'static str,
    presence: Presence,
    allowed_shapes: &'static [Shape],
    check: RuleCheck,
    kinds: &'static [ComponentKind],
) -> SchemaRule {
    SchemaRule {
        id,
        attribute,
        presence,
        allowed_shapes,
        check,
        kinds,
    }
}

static REGISTRY: LazyLock<Vec<SchemaRule>> = LazyLock::new(|| {
    use Presence::{Forbidden, Optional, Required};
    vec![
        // Agent
        rule("agent.name", "name", Required, SCALAR, check_name, &[Agent]),
        rule("agent.description", "description", Required, SCALAR, check_description, &[Agent]),
        rule("agent.tools", "tools", Optional, SCALAR_OR_LIST, check_tools, &[Agent]),
        rule("agent.model", "model", Optional, SCALAR, check_agent_model, &[Agent]),
        rule("agent.color", "color", Optional, SCALAR, check_color, &[Agent]),
        // Skill
        rule("skill.name", "name", Required, SCALAR, check_skill_name, &[Skill]),
        rule("skill.description", "description", Required, SCALAR, check_skill_description, &[Skill]),
        rule("skill.model", "model", Forbidden, ANY_SHAPE, reject_skill_model, &[Skill]),
        rule("allowed-tools", "allowed-tools", Optional, SCALAR_OR_LIST, check_tools, &[Skill, Command]),
        rule("skill.version", "version", Optional, SCALAR, check_version, &[Skill]),
        rule("skill.license", "license", Optional, SCALAR, no_check, &[Skill]),
        rule("skill.compatibility", "compatibility", Optional, SCALAR, no_check, &[Skill]),
        rule("skill.metadata", "metadata", Optional, ANY_SHAPE, no_check, &[Skill]),
        // Command
        rule("command.description", "description", Required, SCALAR, check_description, &[Command]),
        rule("command.argument-hint", "argument-hint", Optional, SCALAR_OR_LIST, check_argument_hint, &[Command]),
        rule("command.model", "model", Optional, SCALAR, check_command_model, &[Command]),
        rule(
            "command.disable-model-invocation",
            "disable-model-invocation",
            Optional,
            SCALAR,
            check_boolean,
            &[Command],
        ),
    ]
});

/// The rules that apply to `kind`, in registry order.
///
/// Hook configurations have no header rules; they are checked by
/// [`crate::hooks::validate_hooks`].
#[must_use]
pub fn rules_for(kind: ComponentKind) -> Vec<&'static SchemaRule> {
    REGISTRY.iter().filter(|r| r.applies_to(kind)).collect()
}

/// Attribute names the registry knows for `kind`.
#[must_use]
pub fn known_attributes(kind: ComponentKind) -> Vec<&'static str> {
    rules_for(kind).iter().map(|r| r.attribute).collect()
}

// ── Name ────────────────────────────────────────────────────────────────

fn no_check(_: &AttributeValue) -> Vec<Diagnostic> {
    Vec::new()
}

/// Canonical lowercase-hyphen form of arbitrary text.
///
/// Lowercases, maps every run of characters outside `[a-z0-9]` to one
/// hyphen, trims hyphens and truncates to [`MAX_NAME_LENGTH`].
#[must_use]
pub fn canonical_name(raw: &str) -> String {
    let lowered: String = raw.nfkc().collect::<String>().to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_hyphen = false;
    for c in lowered.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            if pending_hyphen && !out.is_empty() {
                out.push('-');
            }
            pending_hyphen = false;
            out.push(c);
        } else {
            pending_hyphen = true;
        }
    }
    if out.len() > MAX_NAME_LENGTH {
        out.truncate(MAX_NAME_LENGTH);
        while out.ends_with('-') {
            out.pop();
        }
    }
    out
}

fn check_name(value: &AttributeValue) -> Vec<Diagnostic> {
    let Some(raw) = value.as_scalar() else {
        return Vec::new();
    };
    let name: String = raw.trim().nfkc().collect();
    let mut diags = Vec::new();

    if name.is_empty() {
        diags.push(Diagnostic::error(NAME_EMPTY, "name must not be empty").with_field("name"));
        return diags;
    }
    if name.chars().count() > MAX_NAME_LENGTH {
        diags.push(
            Diagnostic::error(
                NAME_TOO_LONG,
                format!("name exceeds {MAX_NAME_LENGTH} characters"),
            )
            .with_field("name"),
        );
    }
    if !NAME_RE.is_match(&name) {
        let suggestion = canonical_name(&name);
        let mut d = Diagnostic::error(
            NAME_FORMAT,
            format!("name \"{name}\" must be lowercase letters, digits and single hyphens"),
        )
        .with_field("name");
        if !suggestion.is_empty() {
            d = d.with_suggestion(format!("Use: '{suggestion}'"));
        }
        diags.push(d);
    }
    diags
}

fn check_skill_name(value: &AttributeValue) -> Vec<Diagnostic> {
    let mut diags = check_name(value);
    if let Some(name) = value.as_scalar() {
        let lowered = name.trim().to_lowercase();
        for word in RESERVED_WORDS {
            if lowered.split('-').any(|seg| seg == *word) {
                diags.push(
                    Diagnostic::error(
                        NAME_RESERVED,
                        format!("name contains reserved word \"{word}\""),
                    )
                    .with_field("name"),
                );
            }
        }
    }
    diags
}

// ── Description ─────────────────────────────────────────────────────────

fn check_description(value: &AttributeValue) -> Vec<Diagnostic> {
    match value.as_scalar() {
        Some(d) if d.trim().is_empty() => vec![Diagnostic::error(
            DESCRIPTION_EMPTY,
            "description must not be empty",
        )
        .with_field("description")],
        _ => Vec::new(),
    }
}

fn check_skill_description(value: &AttributeValue) -> Vec<Diagnostic> {
    let mut diags = check_description(value);
    let Some(desc) = value.as_scalar() else {
        return diags;
    };
    let len = desc.chars().count();
    if len > MAX_SKILL_DESCRIPTION_LENGTH {
        diags.push(
            Diagnostic::error(
                DESCRIPTION_TOO_LONG,
                format!(
                    "description is {len} characters (limit {MAX_SKILL_DESCRIPTION_LENGTH})"
                ),
            )
            .with_field("description"),
        );
    }
    if XML_TAG_RE.is_match(desc) {
        diags.push(
            Diagnostic::error(DESCRIPTION_MARKUP, "description must not contain XML/HTML tags")
                .with_field("description"),
        );
    }
    diags
}

// ── Model ───────────────────────────────────────────────────────────────

fn reject_skill_model(_: &AttributeValue) -> Vec<Diagnostic> {
    vec![Diagnostic::error(MODEL_FORBIDDEN, "model attribute not permitted for skills")
        .with_field("model")
        .with_suggestion("Remove the `model` attribute; skills run on the invoking model")]
}

fn check_agent_model(value: &AttributeValue) -> Vec<Diagnostic> {
    let Some(model) = value.as_scalar().map(str::trim) else {
        return Vec::new();
    };
    if MODEL_MNEMONICS.contains(&model) || model == "inherit" || model.starts_with("claude-") {
        return Vec::new();
    }
    vec![Diagnostic::error(MODEL_INVALID, format!("unknown model \"{model}\""))
        .with_field("model")
        .with_suggestion("Use sonnet, opus, haiku, inherit, or a full claude-* identifier")]
}

fn check_command_model(value: &AttributeValue) -> Vec<Diagnostic> {
    let Some(model) = value.as_scalar().map(str::trim) else {
        return Vec::new();
    };
    if MODEL_MNEMONICS.contains(&model) || model == "inherit" {
        let mut d = Diagnostic::error(
            MODEL_SHORT_ALIAS,
            format!("short alias \"{model}\" not permitted for commands"),
        )
        .with_field("model");
        d = if model == "inherit" {
            d.with_suggestion("Remove `model` to use the session model")
        } else {
            d.with_suggestion("Use a version alias such as claude-<family>-<major>-<minor>")
        };
        return vec![d];
    }
    if MODEL_FULL_ID_RE.is_match(model) {
        return Vec::new();
    }
    if MODEL_VERSION_ALIAS_RE.is_match(model) {
        return vec![Diagnostic::info(
            MODEL_UNPINNED,
            format!("\"{model}\" is a version alias without a snapshot date"),
        )
        .with_field("model")];
    }
    vec![Diagnostic::warning(
        MODEL_INVALID,
        format!("unrecognised model identifier \"{model}\""),
    )
    .with_field("model")
    .with_suggestion("Use claude-<family>-<major>-<minor>[-<yyyymmdd>]")]
}

// ── Other attributes ────────────────────────────────────────────────────

fn check_tools(value: &AttributeValue) -> Vec<Diagnostic> {
    value
        .items()
        .into_iter()
        .filter_map(|tool| {
            // `Bash(git:*)` restricts a known tool.
            let base = tool.split('(').next().unwrap_or_default().trim();
            if KNOWN_TOOLS.contains(&base) || base.starts_with("mcp__") {
                None
            } else {
                Some(
                    Diagnostic::warning(TOOL_UNKNOWN, format!("unknown tool \"{tool}\""))
                        .with_field("tools"),
                )
            }
        })
        .collect()
}

fn check_color(value: &AttributeValue) -> Vec<Diagnostic> {
    match value.as_scalar().map(str::trim) {
        Some(c) if !KNOWN_COLORS.contains(&c) => vec![Diagnostic::warning(
            COLOR_UNKNOWN,
            format!("unknown color \"{c}\""),
        )
        .with_field("color")
        .with_suggestion(format!("Valid colors: {}", KNOWN_COLORS.join(", ")))],
        _ => Vec::new(),
    }
}

fn check_version(value: &AttributeValue) -> Vec<Diagnostic> {
    match value.as_scalar().map(str::trim) {
        Some(v) if !VERSION_RE.is_match(v) => vec![Diagnostic::warning(
            VERSION_FORMAT,
            format!("version \"{v}\" is not of the form N.N or N.N.N"),
        )
        .with_field("version")],
        _ => Vec::new(),
    }
}

fn check_argument_hint(value: &AttributeValue) -> Vec<Diagnostic> {
    match value.normalized() {
        Some(hint) if !hint.is_empty() && !hint.starts_with('[') => vec![Diagnostic::warning(
            ARGUMENT_HINT_FORMAT,
            format!("argument-hint \"{hint}\" should use bracket notation"),
        )
        .with_field("argument-hint")
        .with_suggestion("Use e.g. '[file] [mode]'")],
        _ => Vec::new(),
    }
}

fn check_boolean(value: &AttributeValue) -> Vec<Diagnostic> {
    match value.as_scalar().map(|s| s.trim().to_ascii_lowercase()) {
        Some(b) if !matches!(b.as_str(), "true" | "false" | "yes" | "no") => {
            vec![Diagnostic::error(NOT_BOOLEAN, format!("\"{b}\" is not a boolean"))
                .with_field("disable-model-invocation")
                .with_suggestion("Use true or false")]
        }
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rule(kind: ComponentKind, attribute: &str) -> &'static SchemaRule {
        rules_for(kind)
            .into_iter()
            .find(|r| r.attribute == attribute)
            .unwrap()
    }

    fn run(kind: ComponentKind, attribute: &str, value: &str) -> Vec<Diagnostic> {
        (rule(kind, attribute).check)(&AttributeValue::scalar(value))
    }

    // ── Registry ────────────────────────────────────────────────────────

    #[test]
    fn agent_requires_name_and_description() {
        let required: Vec<_> = rules_for(Agent)
            .iter()
            .filter(|r| r.required())
            .map(|r| r.attribute)
            .collect();
        assert_eq!(required, vec!["name", "description"]);
    }

    #[test]
    fn command_requires_only_description() {
        let required: Vec<_> = rules_for(Command)
            .iter()
            .filter(|r| r.required())
            .map(|r| r.attribute)
            .collect();
        assert_eq!(required, vec!["description"]);
    }

    #[test]
    fn skill_model_is_forbidden() {
        assert_eq!(rule(Skill, "model").presence, Presence::Forbidden);
    }

    #[test]
    fn hook_has_no_header_rules() {
        assert!(rules_for(ComponentKind::Hook).is_empty());
    }

    #[test]
    fn rule_ids_are_unique() {
        let mut ids: Vec<_> = REGISTRY.iter().map(|r| r.id).collect();
        ids.sort_unstable();
        let before = ids.len();
        ids.dedup();
        assert_eq!(before, ids.len());
    }

    // ── Name ────────────────────────────────────────────────────────────

    #[test]
    fn canonical_name_from_heading() {
        assert_eq!(canonical_name("My Helper"), "my-helper");
        assert_eq!(canonical_name("  API -- Client!! v2 "), "api-client-v2");
        assert_eq!(canonical_name(&"a".repeat(80)).len(), MAX_NAME_LENGTH);
    }

    #[test]
    fn valid_name_passes() {
        assert!(run(Agent, "name", "code-reviewer").is_empty());
    }

    #[test]
    fn uppercase_name_suggests_canonical() {
        let diags = run(Agent, "name", "Code_Reviewer");
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, NAME_FORMAT);
        assert_eq!(diags[0].suggestion.as_deref(), Some("Use: 'code-reviewer'"));
    }

    #[test]
    fn name_too_long() {
        let diags = run(Agent, "name", &"a".repeat(65));
        assert!(diags.iter().any(|d| d.code == NAME_TOO_LONG));
    }

    #[test]
    fn empty_name() {
        assert_eq!(run(Agent, "name", " ")[0].code, NAME_EMPTY);
    }

    #[test]
    fn reserved_word_segment_rejected_for_skills_only() {
        assert!(run(Skill, "name", "claude-helper")
            .iter()
            .any(|d| d.code == NAME_RESERVED));
        assert!(run(Skill, "name", "claudette").is_empty());
        assert!(run(Agent, "name", "claude-helper").is_empty());
    }

    // ── Description ─────────────────────────────────────────────────────

    #[test]
    fn skill_description_limits() {
        assert!(run(Skill, "description", &"x".repeat(1024)).is_empty());
        assert_eq!(
            run(Skill, "description", &"x".repeat(1025))[0].code,
            DESCRIPTION_TOO_LONG
        );
        assert_eq!(
            run(Skill, "description", "Use <b>this</b>")[0].code,
            DESCRIPTION_MARKUP
        );
    }

    // ── Model ───────────────────────────────────────────────────────────

    #[test]
    fn skill_model_always_rejected() {
        for value in ["sonnet", "claude-sonnet-4-5-20250929", ""] {
            let diags = run(Skill, "model", value);
            assert_eq!(diags[0].code, MODEL_FORBIDDEN);
            assert!(diags[0].message.contains("not permitted for skills"));
        }
    }

    #[test]
    fn agent_accepts_mnemonics() {
        for value in ["sonnet", "opus", "haiku", "inherit", "claude-opus-4-5"] {
            assert!(run(Agent, "model", value).is_empty(), "{value}");
        }
        assert_eq!(run(Agent, "model", "gpt-4")[0].code, MODEL_INVALID);
    }

    #[test]
    fn command_rejects_short_alias_with_suggestion() {
        let diags = run(Command, "model", "haiku");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].is_error());
        assert_eq!(diags[0].code, MODEL_SHORT_ALIAS);
        assert!(diags[0]
            .suggestion
            .as_deref()
            .is_some_and(|s| s.contains("version alias")));
    }

    #[test]
    fn command_version_alias_is_note() {
        let diags = run(Command, "model", "claude-sonnet-4-5");
        assert_eq!(diags.len(), 1);
        assert!(diags[0].is_info());
    }

    #[test]
    fn command_full_id_passes() {
        assert!(run(Command, "model", "claude-sonnet-4-5-20250929").is_empty());
    }

    #[test]
    fn command_other_model_warns() {
        let diags = run(Command, "model", "claude-instant");
        assert!(diags[0].is_warning());
    }

    // ── Other attributes ────────────────────────────────────────────────

    #[test]
    fn unknown_tool_warns() {
        let diags = (rule(Agent, "tools").check)(&AttributeValue::List(vec![
            "Read".into(),
            "Bash(git:*)".into(),
            "mcp__github__search".into(),
            "Teleport".into(),
        ]));
        assert_eq!(diags.len(), 1);
        assert!(diags[0].message.contains("Teleport"));
    }

    #[test]
    fn argument_hint_list_and_string_equivalent() {
        let check = rule(Command, "argument-hint").check;
        let list = check(&AttributeValue::List(vec!["[file]".into(), "[mode]".into()]));
        let joined = check(&AttributeValue::scalar("[file] [mode]"));
        assert_eq!(list, joined);
        assert!(list.is_empty());
        assert_eq!(
            check(&AttributeValue::scalar("file mode"))[0].code,
            ARGUMENT_HINT_FORMAT
        );
    }

    #[test]
    fn boolean_like_values() {
        assert!(run(Command, "disable-model-invocation", "Yes").is_empty());
        assert_eq!(
            run(Command, "disable-model-invocation", "maybe")[0].code,
            NOT_BOOLEAN
        );
    }

    #[test]
    fn version_and_color_warnings() {
        assert!(run(Skill, "version", "1.2.3").is_empty());
        assert!(run(Skill, "version", "v1")[0].is_warning());
        assert!(run(Agent, "color", "teal")[0].is_warning());
    }
}
