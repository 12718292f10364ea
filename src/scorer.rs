//! Quality scoring for component documents.
//!
//! Four fixed dimensions, each scored 0–10:
//! - Schema compliance: 10 minus 3 per validation error and 1 per warning
//! - Security: named risk categories, each subtracting its penalty once
//! - Content quality: role, examples, workflow, length, worked example
//! - Maintainability: structure and consistency
//!
//! Scoring is deterministic and side-effect free.

use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::config::EngineConfig;
use crate::diagnostics::Severity;
use crate::hooks::{self, HookConfig};
use crate::models::{ComponentDocument, ComponentKind};
use crate::validator;

/// Maximum points per dimension.
pub const DIMENSION_MAX: u32 = 10;

/// Dimensions scoring below this produce recommendations.
pub const RECOMMENDATION_THRESHOLD: u32 = 7;

/// Recommendations taken per dimension.
const RECOMMENDATIONS_PER_DIMENSION: usize = 3;

/// A scoring dimension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Dimension {
    SchemaCompliance,
    Security,
    ContentQuality,
    Maintainability,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::SchemaCompliance,
        Dimension::Security,
        Dimension::ContentQuality,
        Dimension::Maintainability,
    ];

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Dimension::SchemaCompliance => "Schema compliance",
            Dimension::Security => "Security",
            Dimension::ContentQuality => "Content quality",
            Dimension::Maintainability => "Maintainability",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One observation that cost points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Finding {
    pub dimension: Dimension,
    pub severity: Severity,
    pub message: String,
    /// Points this finding subtracted.
    pub points: u32,
}

/// Score and findings for a single dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DimensionScore {
    pub dimension: Dimension,
    pub score: u32,
    pub findings: Vec<Finding>,
}

/// Full scoring result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScoreReport {
    pub dimension_scores: BTreeMap<Dimension, u32>,
    pub findings: Vec<Finding>,
    pub total: u32,
    pub max: u32,
}

/// A ranked improvement suggestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Recommendation {
    pub dimension: Dimension,
    pub dimension_score: u32,
    pub message: String,
}

impl ScoreReport {
    /// Recommendations from dimensions scoring below
    /// [`RECOMMENDATION_THRESHOLD`], lowest dimension first, at most three
    /// per dimension, costliest finding first.
    #[must_use]
    pub fn recommendations(&self) -> Vec<Recommendation> {
        let mut weak: Vec<(Dimension, u32)> = self
            .dimension_scores
            .iter()
            .filter(|(_, s)| **s < RECOMMENDATION_THRESHOLD)
            .map(|(d, s)| (*d, *s))
            .collect();
        weak.sort_by_key(|(d, s)| (*s, *d));

        let mut out = Vec::new();
        for (dimension, score) in weak {
            let mut findings: Vec<&Finding> = self
                .findings
                .iter()
                .filter(|f| f.dimension == dimension)
                .collect();
            findings.sort_by(|a, b| b.points.cmp(&a.points));
            out.extend(
                findings
                    .into_iter()
                    .take(RECOMMENDATIONS_PER_DIMENSION)
                    .map(|f| Recommendation {
                        dimension,
                        dimension_score: score,
                        message: f.message.clone(),
                    }),
            );
        }
        out
    }

    #[must_use]
    pub fn score(&self, dimension: Dimension) -> u32 {
        self.dimension_scores.get(&dimension).copied().unwrap_or(0)
    }
}

/// Score a document on every dimension with the default engine options.
#[must_use]
pub fn score(doc: &ComponentDocument) -> ScoreReport {
    score_with(doc, &EngineConfig::default())
}

/// Score a document on every dimension.
#[must_use]
pub fn score_with(doc: &ComponentDocument, config: &EngineConfig) -> ScoreReport {
    let mut dimension_scores = BTreeMap::new();
    let mut findings = Vec::new();
    for dimension in Dimension::ALL {
        let d = score_dimension_with(doc, dimension, config);
        dimension_scores.insert(dimension, d.score);
        findings.extend(d.findings);
    }
    let max = DIMENSION_MAX * Dimension::ALL.len() as u32;
    let total = dimension_scores.values().sum::<u32>().min(max);
    ScoreReport {
        dimension_scores,
        findings,
        total,
        max,
    }
}

/// Score a document on one dimension with the default engine options.
#[must_use]
pub fn score_dimension(doc: &ComponentDocument, dimension: Dimension) -> DimensionScore {
    score_dimension_with(doc, dimension, &EngineConfig::default())
}

/// Score a document on one dimension.
#[must_use]
pub fn score_dimension_with(
    doc: &ComponentDocument,
    dimension: Dimension,
    config: &EngineConfig,
) -> DimensionScore {
    let mut card = Scorecard::new(dimension);
    match (dimension, doc.kind) {
        (Dimension::SchemaCompliance, _) => schema_compliance(doc, config, &mut card),
        (Dimension::Security, ComponentKind::Hook) => hook_security(&hook_config(doc), &mut card),
        (Dimension::Security, _) => markdown_security(doc, &mut card),
        (Dimension::ContentQuality, ComponentKind::Hook) => {
            hook_content(&hook_config(doc), &mut card)
        }
        (Dimension::ContentQuality, kind) => markdown_content(kind, &doc.body, &mut card),
        (Dimension::Maintainability, ComponentKind::Hook) => {
            hook_maintainability(&hook_config(doc), &mut card)
        }
        (Dimension::Maintainability, _) => markdown_maintainability(&doc.body, &mut card),
    }
    card.finish()
}

/// Running tally for one dimension. Starts at the maximum and loses points
/// per finding, floored at zero.
struct Scorecard {
    dimension: Dimension,
    lost: u32,
    findings: Vec<Finding>,
}

impl Scorecard {
    fn new(dimension: Dimension) -> Self {
        Self {
            dimension,
            lost: 0,
            findings: Vec::new(),
        }
    }

    fn deduct(&mut self, points: u32, severity: Severity, message: impl Into<String>) {
        self.lost += points;
        self.findings.push(Finding {
            dimension: self.dimension,
            severity,
            message: message.into(),
            points,
        });
    }

    fn finish(self) -> DimensionScore {
        DimensionScore {
            dimension: self.dimension,
            score: DIMENSION_MAX.saturating_sub(self.lost),
            findings: self.findings,
        }
    }
}

fn hook_config(doc: &ComponentDocument) -> HookConfig {
    hooks::parse_config(&doc.body).unwrap_or(HookConfig {
        wrapped: doc.has_header,
        documentation: None,
        events: Vec::new(),
    })
}

// ── Schema compliance ───────────────────────────────────────────────────

fn schema_compliance(doc: &ComponentDocument, config: &EngineConfig, card: &mut Scorecard) {
    let result = validator::validate_with(doc, config);
    for e in &result.errors {
        card.deduct(3, Severity::Error, e.message.clone());
    }
    for w in &result.warnings {
        card.deduct(1, Severity::Warning, w.message.clone());
    }
}

// ── Security ────────────────────────────────────────────────────────────

/// Positional or argument interpolation (`$1`, `$@`, `$*`, `$ARGUMENTS`).
static INTERPOLATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\$(\{?[0-9@*]|\{?ARGUMENTS\b)").expect("interpolation regex must compile")
});

/// Evidence that input is checked before use.
static VALIDATION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(\[\[|\btest\s+-|\bif\s|\bcase\s|validat|sanitiz|jq\s+-e|grep\s+-q|set\s+-[a-z]*e[a-z]*u)")
        .expect("validation regex must compile")
});

/// Reading the hook's input payload.
static INPUT_READ_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\bjq\b|\bread\s|\$\{?CLAUDE_TOOL_INPUT|\$\{?TOOL_INPUT|\bcat\s*(-\s*)?(\||$))")
        .expect("input regex must compile")
});

/// Path built from a traversal segment or an unquoted variable.
static PATH_BUILD_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(\.\./|(^|[\s=])\$\{?([A-Za-z_][A-Za-z0-9_]*)\}?/)"#)
        .expect("path regex must compile")
});

/// Variables that the host sets to trusted directories.
const TRUSTED_PATH_VARS: &[&str] = &["CLAUDE_PLUGIN_ROOT", "CLAUDE_PROJECT_DIR", "HOME"];

static DANGEROUS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(\brm\s+-[a-zA-Z]*[rf][a-zA-Z]*\s|\bdd\s+if=|\bmkfs|\b(curl|wget)\b[^|\n]*\|\s*(ba|z)?sh\b|\beval\s|chmod\s+(-R\s+)?777|>\s*/dev/sd|:\(\)\s*\{)",
    )
    .expect("dangerous command regex must compile")
});

static SENSITIVE_LOG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)((echo|printf|tee|logger)\b[^\n]*\$\{?[A-Z_]*(TOKEN|SECRET|PASSWORD|API_KEY|CREDENTIAL)|\bprintenv\b|\benv\s*(>|\|)|\bset\s+-x\b)",
    )
    .expect("sensitive logging regex must compile")
});

static PRIVILEGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\bsudo\b|\bsu\s+-?\w*|\bdoas\b|chmod\s+[ugoa]*\+s|chown\s+root)")
        .expect("privilege regex must compile")
});

static SECRET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"((?i:api[_-]?key|secret|password|passwd|token)\s*[:=]\s*["']?[A-Za-z0-9_\-]{12,}|sk-[A-Za-z0-9]{20,}|ghp_[A-Za-z0-9]{36}|AKIA[0-9A-Z]{16})"#,
    )
    .expect("secret regex must compile")
});

static BODY_VALIDATION_DOC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(validat|sanitiz|escap|quot(e|ing)|allow-?list)")
        .expect("validation doc regex must compile")
});

fn untrusted_path(command: &str) -> bool {
    PATH_BUILD_RE.captures_iter(command).any(|c| match c.get(3) {
        Some(var) => !TRUSTED_PATH_VARS.contains(&var.as_str()),
        None => true,
    })
}

fn hook_security(config: &HookConfig, card: &mut Scorecard) {
    let commands: Vec<&str> = config
        .actions()
        .filter_map(|(_, _, a)| a.command.as_deref())
        .collect();
    let validated = |c: &str| VALIDATION_RE.is_match(c);

    if commands
        .iter()
        .any(|c| INTERPOLATION_RE.is_match(c) && !validated(c))
    {
        card.deduct(
            3,
            Severity::Warning,
            "command interpolates arguments ($1, $@) without validating them",
        );
    }
    if commands.iter().any(|c| untrusted_path(c)) {
        card.deduct(
            2,
            Severity::Warning,
            "command builds a path from untrusted input; quote it and reject `..`",
        );
    }
    if config
        .entries()
        .any(|(event, e)| hooks::is_tool_event(event) && e.matcher.as_deref().is_some_and(hooks::is_wildcard))
    {
        card.deduct(
            2,
            Severity::Warning,
            "wildcard matcher runs the hook for every tool; name the tools instead",
        );
    }
    if commands
        .iter()
        .any(|c| INPUT_READ_RE.is_match(c) && !validated(c))
    {
        card.deduct(
            1,
            Severity::Warning,
            "hook input is read without a validation step or `set -euo pipefail`",
        );
    }
    if commands.iter().any(|c| DANGEROUS_RE.is_match(c)) {
        card.deduct(3, Severity::Warning, "command uses a destructive operation");
    }
    if commands.iter().any(|c| SENSITIVE_LOG_RE.is_match(c)) {
        card.deduct(2, Severity::Warning, "command may log sensitive values");
    }
    if commands.iter().any(|c| PRIVILEGE_RE.is_match(c)) {
        card.deduct(3, Severity::Warning, "command escalates privileges");
    }
}

fn declares_shell(doc: &ComponentDocument) -> bool {
    ["tools", "allowed-tools"].iter().any(|key| {
        doc.attribute(key).is_some_and(|v| {
            v.items()
                .iter()
                .any(|t| t.split('(').next().is_some_and(|base| base.trim() == "Bash"))
        })
    })
}

fn markdown_security(doc: &ComponentDocument, card: &mut Scorecard) {
    if declares_shell(doc) {
        card.deduct(2, Severity::Warning, "declares shell execution (Bash)");
        if !BODY_VALIDATION_DOC_RE.is_match(&doc.body) {
            card.deduct(
                3,
                Severity::Warning,
                "shell access without documented input validation",
            );
        }
    }
    let shell_blocks: Vec<String> = fenced_blocks(&doc.body)
        .into_iter()
        .filter(|(lang, _)| matches!(lang.as_str(), "bash" | "sh" | "shell" | "zsh" | "console"))
        .map(|(_, code)| code)
        .collect();
    if shell_blocks.iter().any(|b| DANGEROUS_RE.is_match(b)) {
        card.deduct(3, Severity::Warning, "shell example uses a destructive operation");
    }
    if shell_blocks.iter().any(|b| PRIVILEGE_RE.is_match(b)) {
        card.deduct(2, Severity::Warning, "shell example escalates privileges");
    }
    if SECRET_RE.is_match(&doc.body) {
        card.deduct(3, Severity::Warning, "body appears to contain a hard-coded secret");
    }
}

// ── Content quality ─────────────────────────────────────────────────────

static ROLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^\s*(you are\b|#{1,3}\s*(role|purpose|overview|when to use)\b)")
        .expect("role regex must compile")
});

static EXAMPLES_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)^#{2,3}\s*(examples?|usage)\b").expect("examples regex must compile")
});

static WORKFLOW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)(^#{1,3}\s*.*\b(workflow|steps?|process|how it works|instructions)\b|^\s*1\.\s)")
        .expect("workflow regex must compile")
});

static WORKED_EXAMPLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?im)(^```|^#{3,4}\s*example\b)").expect("worked example regex must compile")
});

/// Accepted body word count per kind.
fn word_band(kind: ComponentKind) -> std::ops::RangeInclusive<usize> {
    match kind {
        ComponentKind::Command => 50..=1000,
        _ => 100..=3000,
    }
}

fn markdown_content(kind: ComponentKind, body: &str, card: &mut Scorecard) {
    if !ROLE_RE.is_match(body) {
        card.deduct(
            2,
            Severity::Info,
            "add a role statement (\"You are ...\") or a Purpose section",
        );
    }
    if !EXAMPLES_RE.is_match(body) {
        card.deduct(2, Severity::Info, "add an Examples or Usage section");
    }
    if !WORKFLOW_RE.is_match(body) {
        card.deduct(2, Severity::Info, "describe the workflow as steps");
    }
    let words = body.split_whitespace().count();
    let band = word_band(kind);
    if !band.contains(&words) {
        card.deduct(
            2,
            Severity::Info,
            format!(
                "body has {words} words; aim for {}-{}",
                band.start(),
                band.end()
            ),
        );
    }
    if !WORKED_EXAMPLE_RE.is_match(body) {
        card.deduct(2, Severity::Info, "include at least one worked example");
    }
}

fn hook_content(config: &HookConfig, card: &mut Scorecard) {
    if config
        .documentation
        .as_deref()
        .is_none_or(|d| d.trim().is_empty())
    {
        card.deduct(
            4,
            Severity::Info,
            "document the configuration with a top-level `_comment` or `description`",
        );
    }
    let vague_prompts = config
        .actions()
        .filter_map(|(_, _, a)| (a.hook_type.as_deref() == Some("prompt")).then_some(a))
        .filter(|a| {
            a.prompt
                .as_deref()
                .is_none_or(|p| p.split_whitespace().count() < 5)
        })
        .count();
    if vague_prompts > 0 {
        card.deduct(
            3,
            Severity::Info,
            format!("{vague_prompts} prompt hook(s) are too short to be clear"),
        );
    }
    let empty_entries = config
        .entries()
        .filter(|(_, e)| {
            e.hooks.as_ref().is_none_or(|actions| {
                actions.is_empty()
                    || actions
                        .iter()
                        .any(|a| a.payload().is_none_or(|p| p.trim().is_empty()))
            })
        })
        .count();
    if empty_entries > 0 || config.events.is_empty() {
        card.deduct(3, Severity::Info, "some hook entries have no effective action");
    }
}

// ── Maintainability ─────────────────────────────────────────────────────

static LIST_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^\s*([-*+]|\d+\.)\s+\S|^\|.*\|").expect("list regex must compile")
});

static CROSS_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\]\([^)]+\)|\b(references|scripts|assets|templates|examples)/|\$\{CLAUDE_PLUGIN_ROOT\}|@[\w./-]+\.md\b)")
        .expect("cross reference regex must compile")
});

static FORMATTING_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(\*\*[^*\n]+\*\*|`[^`\n]+`)").expect("formatting regex must compile")
});

/// Bodies longer than this should use lists or tables.
const LONG_BODY_LINES: usize = 50;

/// Hook configurations with more actions than this are hard to follow.
const MAX_HOOK_ACTIONS: usize = 20;

fn markdown_maintainability(body: &str, card: &mut Scorecard) {
    let prose = prose_lines(body);
    let headings = prose.iter().filter(|l| l.starts_with('#')).count();
    match headings {
        0 | 1 => card.deduct(2, Severity::Info, "structure the body with section headings"),
        2 => card.deduct(1, Severity::Info, "add more section headings"),
        _ => {}
    }
    if body.lines().count() > LONG_BODY_LINES && !LIST_RE.is_match(body) {
        card.deduct(3, Severity::Info, "break long prose into lists or tables");
    }
    if !CROSS_REF_RE.is_match(body) {
        card.deduct(
            2,
            Severity::Info,
            "link related resources (references/, scripts/) instead of inlining them",
        );
    }
    if !FORMATTING_RE.is_match(body) {
        card.deduct(
            2,
            Severity::Info,
            "use inline code or bold for commands and key terms",
        );
    }
}

/// How a command refers to its script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum PathStyle {
    PluginRoot,
    Relative,
    Absolute,
}

fn path_style(command: &str) -> Option<PathStyle> {
    let script = command
        .split_whitespace()
        .find(|t| t.contains('/'))?
        .trim_matches(|c| c == '"' || c == '\'');
    Some(if script.contains("CLAUDE_PLUGIN_ROOT") {
        PathStyle::PluginRoot
    } else if script.starts_with('/') {
        PathStyle::Absolute
    } else {
        PathStyle::Relative
    })
}

fn hook_maintainability(config: &HookConfig, card: &mut Scorecard) {
    let commands: Vec<&str> = config
        .actions()
        .filter_map(|(_, _, a)| a.command.as_deref())
        .collect();

    let action_count = config.actions().count();
    if action_count > MAX_HOOK_ACTIONS {
        card.deduct(
            4,
            Severity::Info,
            format!("{action_count} hook actions; consider consolidating"),
        );
    }

    let mut seen = HashSet::new();
    let duplicates = commands.iter().filter(|c| !seen.insert(c.trim())).count();
    if duplicates > 0 {
        card.deduct(
            3,
            Severity::Info,
            format!("{duplicates} duplicate command(s); share one script"),
        );
    }

    let styles: HashSet<PathStyle> = commands.iter().filter_map(|c| path_style(c)).collect();
    if styles.len() > 1 {
        card.deduct(
            3,
            Severity::Info,
            "script paths mix styles; use ${CLAUDE_PLUGIN_ROOT} consistently",
        );
    }
}

// ── Markdown helpers ────────────────────────────────────────────────────

/// Fenced code blocks as `(language, content)`.
fn fenced_blocks(body: &str) -> Vec<(String, String)> {
    let mut blocks = Vec::new();
    let mut current: Option<(String, String)> = None;
    for line in body.lines() {
        let trimmed = line.trim_start();
        match current.take() {
            None => {
                if let Some(lang) = trimmed.strip_prefix("```") {
                    current = Some((lang.trim().to_ascii_lowercase(), String::new()));
                }
            }
            Some((lang, mut code)) => {
                if trimmed.starts_with("```") {
                    blocks.push((lang, code));
                } else {
                    code.push_str(line);
                    code.push('\n');
                    current = Some((lang, code));
                }
            }
        }
    }
    blocks
}

/// Body lines outside fenced code blocks.
fn prose_lines(body: &str) -> Vec<&str> {
    let mut in_fence = false;
    body.lines()
        .filter(|line| {
            if line.trim_start().starts_with("```") {
                in_fence = !in_fence;
                return false;
            }
            !in_fence
        })
        .collect()
}
