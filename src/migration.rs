//! Migration planning.
//!
//! A [`MigrationPlan`] is an ordered list of [`Change`]s that together bring
//! a document to [`SchemaVersion::Current`]. Each change is a pure
//! transformation from one document to the next; planning never touches
//! the filesystem.

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::diagnostics::Diagnostic;
use crate::errors::MigrationConflict;
use crate::hooks;
use crate::models::{AttributeValue, ComponentDocument, ComponentKind};
use crate::schema::{self, MODEL_MNEMONICS};
use crate::validator;
use crate::version::{self, SchemaVersion};

/// Default `tools` inserted into a migrated agent.
pub const DEFAULT_AGENT_TOOLS: &str = "Read, Grep, Glob";

/// Default `model` inserted into a migrated agent.
pub const DEFAULT_AGENT_MODEL: &str = "sonnet";

/// Extracted descriptions are cut to this many characters.
const MAX_EXTRACTED_DESCRIPTION: usize = 1024;

/// Paragraphs shorter than this are not used as descriptions.
const MIN_PARAGRAPH_CHARS: usize = 20;

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#\s+(.+)$").expect("heading regex must compile"));

static ROLE_SENTENCE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)\byou are\s+(.*?)(?:[.!]|\n\n)").expect("role sentence regex must compile")
});

/// How a change is allowed to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChangeMode {
    /// Lossless; always applied.
    Automatic,
    /// Applied only when approved.
    NeedsConfirmation,
    /// Cannot be automated; reported as a gap.
    ManualOnly,
}

/// Pure document transformation.
pub type ApplyFn = Arc<
    dyn Fn(&ComponentDocument) -> Result<ComponentDocument, MigrationConflict> + Send + Sync,
>;

/// One step of a migration plan.
#[derive(Clone, Serialize)]
pub struct Change {
    pub id: &'static str,
    pub description: String,
    pub mode: ChangeMode,
    /// Attribute a manual gap concerns.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip)]
    apply: Option<ApplyFn>,
}

impl fmt::Debug for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Change")
            .field("id", &self.id)
            .field("description", &self.description)
            .field("mode", &self.mode)
            .field("field", &self.field)
            .field("apply", &self.apply.as_ref().map(|_| "<fn>"))
            .finish()
    }
}

impl Change {
    fn new<F>(id: &'static str, description: impl Into<String>, mode: ChangeMode, f: F) -> Self
    where
        F: Fn(&ComponentDocument) -> Result<ComponentDocument, MigrationConflict>
            + Send
            + Sync
            + 'static,
    {
        Self {
            id,
            description: description.into(),
            mode,
            field: None,
            apply: Some(Arc::new(f)),
        }
    }

    fn manual(id: &'static str, description: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            mode: ChangeMode::ManualOnly,
            field: None,
            apply: None,
        }
    }

    fn on_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    #[must_use]
    pub fn automatic(&self) -> bool {
        self.mode == ChangeMode::Automatic
    }

    #[must_use]
    pub fn requires_confirmation(&self) -> bool {
        self.mode == ChangeMode::NeedsConfirmation
    }

    #[must_use]
    pub fn is_manual(&self) -> bool {
        self.apply.is_none()
    }

    /// Run the transformation. Manual-only changes have none and return
    /// `None`.
    pub fn apply(
        &self,
        doc: &ComponentDocument,
    ) -> Option<Result<ComponentDocument, MigrationConflict>> {
        self.apply.as_ref().map(|f| f(doc))
    }
}

/// Ordered changes from one schema generation to the current one.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationPlan {
    pub kind: ComponentKind,
    pub from_version: SchemaVersion,
    pub to_version: SchemaVersion,
    pub changes: Vec<Change>,
}

impl MigrationPlan {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    /// Changes that cannot be automated.
    #[must_use]
    pub fn manual_gaps(&self) -> Vec<&Change> {
        self.changes.iter().filter(|c| c.is_manual()).collect()
    }
}

/// Detect the document's version and plan its migration.
#[must_use]
pub fn plan(doc: &ComponentDocument, config: &EngineConfig) -> MigrationPlan {
    let from = version::detect_version_with(doc, config);
    plan_migration(doc, from, config)
}

/// Plan the changes that bring `doc` from `from` to the current version.
///
/// A current document yields an empty plan. Any other document gets at
/// least one change: errors no planned step resolves become manual gaps.
#[must_use]
pub fn plan_migration(
    doc: &ComponentDocument,
    from: SchemaVersion,
    config: &EngineConfig,
) -> MigrationPlan {
    let mut changes = match (from, doc.kind) {
        (SchemaVersion::Current, _) => Vec::new(),
        (_, ComponentKind::Hook) => plan_hooks(doc),
        (SchemaVersion::PreInitial, kind) => plan_pre_initial(doc, kind),
        (SchemaVersion::Incomplete, kind) => plan_incomplete(doc, kind, config),
    };
    if from != SchemaVersion::Current {
        let gaps = unresolved_errors(doc, &changes, config);
        changes.extend(gaps);
    }
    MigrationPlan {
        kind: doc.kind,
        from_version: from,
        to_version: SchemaVersion::Current,
        changes,
    }
}

/// Manual gaps for errors that remain once every automatable change has
/// run. Errors on an attribute already flagged manual are not repeated.
fn unresolved_errors(
    doc: &ComponentDocument,
    changes: &[Change],
    config: &EngineConfig,
) -> Vec<Change> {
    let mut migrated = doc.clone();
    for change in changes {
        if let Some(Ok(next)) = change.apply(&migrated) {
            migrated = next;
        }
    }
    let flagged: Vec<&str> = changes
        .iter()
        .filter(|c| c.is_manual())
        .filter_map(|c| c.field.as_deref())
        .collect();

    let mut gaps: Vec<Change> = Vec::new();
    for d in validator::validate_with(&migrated, config).errors {
        if d.field.as_deref().is_some_and(|f| flagged.contains(&f)) {
            continue;
        }
        if gaps.iter().any(|g| g.id == d.code && g.field == d.field) {
            continue;
        }
        gaps.push(manual_gap(d));
    }
    gaps
}

fn manual_gap(d: Diagnostic) -> Change {
    let description = match &d.suggestion {
        Some(s) => format!("{}; fix by hand ({s})", d.message),
        None => format!("{}; fix by hand", d.message),
    };
    let change = Change::manual(d.code, description);
    match d.field {
        Some(field) => change.on_field(field),
        None => change,
    }
}

// ── Extraction ──────────────────────────────────────────────────────────

/// Canonical name from the first `# Title` line.
#[must_use]
pub fn extract_name(body: &str) -> Option<String> {
    let title = HEADING_RE.captures(body)?.get(1)?.as_str();
    Some(schema::canonical_name(title)).filter(|n| !n.is_empty())
}

/// Description from a `You are ...` sentence, or the first paragraph of
/// descriptive prose.
#[must_use]
pub fn extract_description(body: &str) -> Option<String> {
    let from_role = ROLE_SENTENCE_RE
        .captures(body)
        .and_then(|c| c.get(1))
        .map(|m| collapse_whitespace(m.as_str()))
        .filter(|d| !d.is_empty());
    let desc = from_role.or_else(|| {
        body.split("\n\n")
            .map(str::trim)
            .filter(|p| !p.starts_with('#') && !p.starts_with("```"))
            .find(|p| p.chars().count() > MIN_PARAGRAPH_CHARS)
            .map(collapse_whitespace)
    })?;
    Some(desc.chars().take(MAX_EXTRACTED_DESCRIPTION).collect())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn needs_name(kind: ComponentKind) -> bool {
    matches!(kind, ComponentKind::Agent | ComponentKind::Skill)
}

fn set_attribute(
    key: &'static str,
    value: String,
) -> impl Fn(&ComponentDocument) -> Result<ComponentDocument, MigrationConflict> + Send + Sync {
    move |doc: &ComponentDocument| {
        Ok(doc.with_attribute(key, AttributeValue::scalar(value.clone())))
    }
}

// ── Markdown kinds ──────────────────────────────────────────────────────

fn plan_pre_initial(doc: &ComponentDocument, kind: ComponentKind) -> Vec<Change> {
    let mut changes = Vec::new();

    if needs_name(kind) {
        let from_heading = extract_name(&doc.body);
        let source = if from_heading.is_some() {
            "leading heading"
        } else {
            "file name"
        };
        match from_heading.or_else(|| stem_name(doc)) {
            Some(name) => changes.push(Change::new(
                "extract-name",
                format!("set `name: {name}` from the {source}"),
                ChangeMode::NeedsConfirmation,
                set_attribute("name", name),
            )),
            None => changes.push(
                Change::manual(
                    "missing-name",
                    "no heading or file name to derive `name` from; add it by hand",
                )
                .on_field("name"),
            ),
        }
    }

    match extract_description(&doc.body) {
        Some(description) => {
            let preview: String = description.chars().take(50).collect();
            changes.push(Change::new(
                "extract-description",
                format!("set `description` from the body (\"{preview}\")"),
                ChangeMode::NeedsConfirmation,
                set_attribute("description", description),
            ));
        }
        None => changes.push(
            Change::manual(
                "missing-description",
                "no descriptive text found; write `description` by hand",
            )
            .on_field("description"),
        ),
    }

    if kind == ComponentKind::Agent {
        changes.push(Change::new(
            "insert-defaults",
            format!("add `tools: {DEFAULT_AGENT_TOOLS}` and `model: {DEFAULT_AGENT_MODEL}`"),
            ChangeMode::NeedsConfirmation,
            |doc: &ComponentDocument| {
                let mut next = doc.clone();
                for (key, value) in [("tools", DEFAULT_AGENT_TOOLS), ("model", DEFAULT_AGENT_MODEL)]
                {
                    if !next.header.contains(key) {
                        next = next.with_attribute(key, AttributeValue::scalar(value));
                    }
                }
                Ok(next)
            },
        ));
    }

    changes
}

fn stem_name(doc: &ComponentDocument) -> Option<String> {
    doc.file_stem()
        .map(|s| schema::canonical_name(&s))
        .filter(|n| !n.is_empty())
}

fn plan_incomplete(
    doc: &ComponentDocument,
    kind: ComponentKind,
    config: &EngineConfig,
) -> Vec<Change> {
    let mut changes = Vec::new();

    if needs_name(kind) {
        match doc.attribute("name") {
            None => match stem_name(doc).or_else(|| extract_name(&doc.body)) {
                Some(name) => changes.push(Change::new(
                    "default-name",
                    format!("set missing `name` to `{name}`"),
                    ChangeMode::Automatic,
                    set_attribute("name", name),
                )),
                None => changes.push(
                    Change::manual(
                        "missing-name",
                        "`name` is missing and cannot be derived; add it by hand",
                    )
                    .on_field("name"),
                ),
            },
            Some(AttributeValue::Scalar(s)) if schema::canonical_name(s) != *s => changes.push(Change::new(
                "canonical-name",
                "rewrite `name` in lowercase-hyphen form",
                ChangeMode::Automatic,
                canonicalize_name,
            )),
            Some(_) => {}
        }
    }

    let description_missing = doc
        .attribute("description")
        .is_none_or(|d| d.as_scalar().is_some_and(|s| s.trim().is_empty()));
    if description_missing {
        changes.push(
            Change::manual(
                "missing-description",
                "`description` is missing; write it by hand",
            )
            .on_field("description"),
        );
    }

    if kind == ComponentKind::Skill && doc.header.contains("model") {
        changes.push(Change::new(
            "remove-skill-model",
            "remove `model`; skills run on the invoking model",
            ChangeMode::Automatic,
            |doc: &ComponentDocument| Ok(doc.without_attribute("model")),
        ));
    }

    if matches!(kind, ComponentKind::Skill | ComponentKind::Command) && doc.header.contains("tools")
    {
        changes.push(Change::new(
            "rename-tools",
            "rename `tools` to `allowed-tools`",
            ChangeMode::Automatic,
            |doc: &ComponentDocument| {
                if doc.header.contains("allowed-tools") {
                    return Err(MigrationConflict::new(
                        "rename-tools",
                        "both `tools` and `allowed-tools` are present",
                    ));
                }
                Ok(doc.with_renamed_attribute("tools", "allowed-tools"))
            },
        ));
    }

    if kind == ComponentKind::Command {
        if let Some(AttributeValue::List(_)) = doc.attribute("argument-hint") {
            changes.push(Change::new(
                "join-argument-hint",
                "join the `argument-hint` list into one string",
                ChangeMode::Automatic,
                |doc: &ComponentDocument| match doc.attribute("argument-hint") {
                    Some(v @ AttributeValue::List(_)) => {
                        let joined = v.normalized().unwrap_or_default();
                        Ok(doc.with_attribute("argument-hint", AttributeValue::scalar(joined)))
                    }
                    _ => Ok(doc.clone()),
                },
            ));
        }

        if let Some(change) = qualify_command_model(doc, config) {
            changes.push(change);
        }
    }

    changes
}

fn canonicalize_name(doc: &ComponentDocument) -> Result<ComponentDocument, MigrationConflict> {
    match doc.attribute("name") {
        Some(AttributeValue::Scalar(s)) => {
            let canonical = schema::canonical_name(s);
            if canonical.is_empty() {
                return Err(MigrationConflict::new(
                    "canonical-name",
                    format!("`name` \"{s}\" has no usable characters"),
                ));
            }
            Ok(doc.with_attribute("name", AttributeValue::scalar(canonical)))
        }
        Some(other) => Err(MigrationConflict::new(
            "canonical-name",
            format!("`name` is a {}, not a scalar", other.shape()),
        )),
        None => Ok(doc.clone()),
    }
}

fn qualify_command_model(doc: &ComponentDocument, config: &EngineConfig) -> Option<Change> {
    let model = doc.attribute("model")?.as_scalar()?.trim().to_string();
    if model == "inherit" {
        return Some(Change::new(
            "qualify-command-model",
            "remove `model: inherit`; commands inherit the session model by default",
            ChangeMode::NeedsConfirmation,
            |doc: &ComponentDocument| Ok(doc.without_attribute("model")),
        ));
    }
    if !MODEL_MNEMONICS.contains(&model.as_str()) {
        return None;
    }
    let Some(alias) = config.version_alias(&model).map(str::to_string) else {
        return Some(
            Change::manual(
                "qualify-command-model",
                format!("no version alias configured for `{model}`; set `model` by hand"),
            )
            .on_field("model"),
        );
    };
    Some(Change::new(
        "qualify-command-model",
        format!("replace `model: {model}` with `{alias}`"),
        ChangeMode::NeedsConfirmation,
        set_attribute("model", alias),
    ))
}

// ── Hooks ───────────────────────────────────────────────────────────────

fn plan_hooks(doc: &ComponentDocument) -> Vec<Change> {
    let Ok(config) = hooks::parse_config(&doc.body) else {
        return vec![Change::manual(
            "hook-structure",
            "hook configuration is not an object of event arrays; fix it by hand",
        )];
    };
    let mut changes = Vec::new();

    if !config.wrapped {
        changes.push(Change::new(
            "wrap-hooks",
            "move the event map under a top-level `hooks` key",
            ChangeMode::Automatic,
            wrap_hooks,
        ));
    }

    let needs_type = config.actions().any(|(_, _, a)| {
        let valid = a
            .hook_type
            .as_deref()
            .is_some_and(|t| hooks::VALID_HOOK_TYPES.contains(&t));
        !valid && (a.command.is_some() || a.prompt.is_some())
    });
    if needs_type {
        changes.push(Change::new(
            "infer-hook-type",
            "set missing or invalid hook `type` from the `command`/`prompt` field",
            ChangeMode::Automatic,
            |doc: &ComponentDocument| edit_events(doc, "infer-hook-type", infer_hook_types),
        ));
    }

    let empty_lifecycle_matcher = config.entries().any(|(event, e)| {
        hooks::is_lifecycle_event(event) && e.matcher.as_deref().is_some_and(|m| m.trim().is_empty())
    });
    if empty_lifecycle_matcher {
        changes.push(Change::new(
            "drop-lifecycle-matcher",
            "remove empty matchers from lifecycle events",
            ChangeMode::Automatic,
            |doc: &ComponentDocument| edit_events(doc, "drop-lifecycle-matcher", drop_lifecycle_matchers),
        ));
    }

    let unknown: Vec<String> = config
        .events
        .iter()
        .map(|(e, _)| e.clone())
        .filter(|e| !hooks::is_known_event(e))
        .collect();
    if !unknown.is_empty() {
        changes.push(Change::new(
            "remove-invalid-events",
            format!("remove unknown events: {}", unknown.join(", ")),
            ChangeMode::NeedsConfirmation,
            |doc: &ComponentDocument| {
                edit_events(doc, "remove-invalid-events", |events| {
                    events.retain(|k, _| !is_event_key(k) || hooks::is_known_event(k));
                })
            },
        ));
    }

    let missing_matcher = config
        .entries()
        .any(|(event, e)| hooks::is_tool_event(event) && e.matcher.is_none());
    if missing_matcher {
        changes.push(Change::new(
            "add-default-matcher",
            "add a `*` matcher to tool-event entries that lack one",
            ChangeMode::NeedsConfirmation,
            |doc: &ComponentDocument| edit_events(doc, "add-default-matcher", add_default_matchers),
        ));
    }

    changes
}

/// Keys of a legacy bare map that are documentation, not events.
fn is_event_key(key: &str) -> bool {
    !key.starts_with('_') && key != "description"
}

fn parse_root(doc: &ComponentDocument, id: &str) -> Result<Map<String, Value>, MigrationConflict> {
    match serde_json::from_str::<Value>(&doc.body) {
        Ok(Value::Object(root)) => Ok(root),
        Ok(_) => Err(MigrationConflict::new(id, "hook configuration is not a JSON object")),
        Err(e) => Err(MigrationConflict::new(id, format!("invalid JSON: {e}"))),
    }
}

fn render_root(
    doc: &ComponentDocument,
    root: Map<String, Value>,
    id: &str,
) -> Result<ComponentDocument, MigrationConflict> {
    let wrapped = root.get("hooks").is_some_and(Value::is_object);
    let mut text = serde_json::to_string_pretty(&Value::Object(root))
        .map_err(|e| MigrationConflict::new(id, e.to_string()))?;
    text.push('\n');
    let mut next = doc.with_body(text);
    next.has_header = wrapped;
    Ok(next)
}

fn wrap_hooks(doc: &ComponentDocument) -> Result<ComponentDocument, MigrationConflict> {
    let root = parse_root(doc, "wrap-hooks")?;
    if root.get("hooks").is_some_and(Value::is_object) {
        return Ok(doc.clone());
    }
    let mut wrapped = Map::new();
    let mut events = Map::new();
    for (key, value) in root {
        if is_event_key(&key) {
            events.insert(key, value);
        } else {
            wrapped.insert(key, value);
        }
    }
    wrapped.insert("hooks".to_string(), Value::Object(events));
    render_root(doc, wrapped, "wrap-hooks")
}

/// Apply `edit` to the event map, wherever it lives.
fn edit_events(
    doc: &ComponentDocument,
    id: &'static str,
    edit: impl FnOnce(&mut Map<String, Value>),
) -> Result<ComponentDocument, MigrationConflict> {
    let mut root = parse_root(doc, id)?;
    match root.get_mut("hooks") {
        Some(Value::Object(events)) => edit(events),
        Some(_) => return Err(MigrationConflict::new(id, "`hooks` is not an object")),
        None => edit(&mut root),
    }
    render_root(doc, root, id)
}

fn entries_mut<'a>(
    events: &'a mut Map<String, Value>,
) -> impl Iterator<Item = (&'a String, &'a mut Map<String, Value>)> {
    events
        .iter_mut()
        .filter(|(k, _)| is_event_key(k))
        .filter_map(|(k, v)| v.as_array_mut().map(|a| (k, a)))
        .flat_map(|(k, entries)| {
            entries
                .iter_mut()
                .filter_map(Value::as_object_mut)
                .map(move |e| (k, e))
        })
}

fn infer_hook_types(events: &mut Map<String, Value>) {
    for (_, entry) in entries_mut(events) {
        let Some(actions) = entry.get_mut("hooks").and_then(Value::as_array_mut) else {
            continue;
        };
        for action in actions.iter_mut().filter_map(Value::as_object_mut) {
            let valid = action
                .get("type")
                .and_then(Value::as_str)
                .is_some_and(|t| hooks::VALID_HOOK_TYPES.contains(&t));
            if valid {
                continue;
            }
            let inferred = if action.contains_key("command") {
                "command"
            } else if action.contains_key("prompt") {
                "prompt"
            } else {
                continue;
            };
            action.insert("type".to_string(), Value::String(inferred.to_string()));
        }
    }
}

fn drop_lifecycle_matchers(events: &mut Map<String, Value>) {
    for (event, entry) in entries_mut(events) {
        if !hooks::is_lifecycle_event(event) {
            continue;
        }
        let empty = entry
            .get("matcher")
            .and_then(Value::as_str)
            .is_some_and(|m| m.trim().is_empty());
        if empty {
            entry.remove("matcher");
        }
    }
}

fn add_default_matchers(events: &mut Map<String, Value>) {
    for (event, entry) in entries_mut(events) {
        if hooks::is_tool_event(event) && !entry.contains_key("matcher") {
            entry.insert("matcher".to_string(), Value::String("*".to_string()));
        }
    }
}
