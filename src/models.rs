use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;

/// The four kinds of component the engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Agent,
    Skill,
    Command,
    Hook,
}

impl ComponentKind {
    /// All kinds, in registry order.
    pub const ALL: [ComponentKind; 4] = [
        ComponentKind::Agent,
        ComponentKind::Skill,
        ComponentKind::Command,
        ComponentKind::Hook,
    ];

    /// Infer the kind from a file path.
    ///
    /// `hooks.json` (or any `.json` file) is a hook configuration; `SKILL.md`
    /// or anything under a `skills/` directory is a skill; files under
    /// `commands/` and `agents/` are commands and agents. Returns `None` when
    /// the path gives no hint.
    #[must_use]
    pub fn infer(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_string_lossy();
        if path
            .extension()
            .is_some_and(|e| e.eq_ignore_ascii_case("json"))
        {
            return Some(ComponentKind::Hook);
        }
        if file_name.eq_ignore_ascii_case("SKILL.md") {
            return Some(ComponentKind::Skill);
        }
        let mut dirs = path
            .parent()
            .into_iter()
            .flat_map(Path::components)
            .map(|c| c.as_os_str().to_string_lossy().to_ascii_lowercase())
            .collect::<Vec<_>>();
        // The nearest enclosing directory wins.
        dirs.reverse();
        dirs.iter().find_map(|d| match d.as_str() {
            "skills" => Some(ComponentKind::Skill),
            "commands" => Some(ComponentKind::Command),
            "agents" => Some(ComponentKind::Agent),
            _ => None,
        })
    }

    /// Returns `true` for kinds stored as header + markdown body.
    #[must_use]
    pub fn is_markdown(self) -> bool {
        !matches!(self, ComponentKind::Hook)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ComponentKind::Agent => "agent",
            ComponentKind::Skill => "skill",
            ComponentKind::Command => "command",
            ComponentKind::Hook => "hook",
        }
    }
}

impl fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structural shape of an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    Scalar,
    List,
    Unknown,
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Shape::Scalar => "scalar",
            Shape::List => "list",
            Shape::Unknown => "structured value",
        })
    }
}

/// A header attribute value.
///
/// Strings, numbers and booleans are scalars, a sequence of scalars is a
/// list, and anything else (nested mappings, mixed sequences) is kept raw.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Scalar(String),
    List(Vec<String>),
    Unknown(serde_yaml_ng::Value),
}

impl AttributeValue {
    /// Build a scalar value.
    #[must_use]
    pub fn scalar(s: impl Into<String>) -> Self {
        AttributeValue::Scalar(s.into())
    }

    /// Convert a raw YAML value.
    #[must_use]
    pub fn from_yaml(value: serde_yaml_ng::Value) -> Self {
        use serde_yaml_ng::Value;
        match value {
            Value::Null => AttributeValue::Scalar(String::new()),
            Value::Sequence(items) => match items.iter().map(yaml_scalar).collect() {
                Some(list) => AttributeValue::List(list),
                None => AttributeValue::Unknown(Value::Sequence(items)),
            },
            other => match yaml_scalar(&other) {
                Some(s) => AttributeValue::Scalar(s),
                None => AttributeValue::Unknown(other),
            },
        }
    }

    /// Convert back to a YAML value for rendering.
    #[must_use]
    pub fn to_yaml(&self) -> serde_yaml_ng::Value {
        use serde_yaml_ng::Value;
        match self {
            AttributeValue::Scalar(s) => Value::String(s.clone()),
            AttributeValue::List(items) => {
                Value::Sequence(items.iter().cloned().map(Value::String).collect())
            }
            AttributeValue::Unknown(v) => v.clone(),
        }
    }

    #[must_use]
    pub fn shape(&self) -> Shape {
        match self {
            AttributeValue::Scalar(_) => Shape::Scalar,
            AttributeValue::List(_) => Shape::List,
            AttributeValue::Unknown(_) => Shape::Unknown,
        }
    }

    /// The scalar text, if this is a scalar.
    #[must_use]
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            AttributeValue::Scalar(s) => Some(s),
            _ => None,
        }
    }

    /// Canonical string form: scalars trimmed, lists joined with single
    /// spaces. `Unknown` values have no normalized form.
    ///
    /// A list `["[file]", "[mode]"]` and the string `"[file] [mode]"`
    /// normalize to the same text.
    #[must_use]
    pub fn normalized(&self) -> Option<String> {
        match self {
            AttributeValue::Scalar(s) => Some(s.trim().to_string()),
            AttributeValue::List(items) => Some(
                items
                    .iter()
                    .map(|i| i.trim())
                    .filter(|i| !i.is_empty())
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            AttributeValue::Unknown(_) => None,
        }
    }

    /// Split a comma-separated scalar or a list into trimmed items.
    #[must_use]
    pub fn items(&self) -> Vec<String> {
        match self {
            AttributeValue::Scalar(s) => s
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect(),
            AttributeValue::List(items) => items
                .iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
            AttributeValue::Unknown(_) => Vec::new(),
        }
    }
}

fn yaml_scalar(value: &serde_yaml_ng::Value) -> Option<String> {
    use serde_yaml_ng::Value;
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Ordered attribute map parsed from a component header.
///
/// Insertion order is preserved so a migrated file keeps its attribute
/// layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Header {
    entries: Vec<(String, AttributeValue)>,
}

impl Header {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<&AttributeValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Replace the value in place, or append a new attribute.
    pub fn insert(&mut self, key: impl Into<String>, value: AttributeValue) {
        let key = key.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(slot) => slot.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn remove(&mut self, key: &str) -> Option<AttributeValue> {
        let idx = self.entries.iter().position(|(k, _)| k == key)?;
        Some(self.entries.remove(idx).1)
    }

    /// Rename an attribute, keeping its position. Returns `false` when `from`
    /// is absent. An existing `to` attribute is replaced.
    pub fn rename(&mut self, from: &str, to: &str) -> bool {
        let Some(idx) = self.entries.iter().position(|(k, _)| k == from) else {
            return false;
        };
        if let Some(dup) = self.entries.iter().position(|(k, _)| k == to) {
            if dup != idx {
                self.entries.remove(dup);
            }
        }
        let idx = self
            .entries
            .iter()
            .position(|(k, _)| k == from)
            .unwrap_or(idx);
        self.entries[idx].0 = to.to_string();
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A parsed component file.
///
/// Documents are values: migrations build new documents with the `with_*`
/// methods instead of mutating in place.
///
/// For hook configurations the header is always empty, `body` holds the
/// JSON text and `has_header` records whether the event map sits under the
/// top-level `hooks` key.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ComponentDocument {
    pub kind: ComponentKind,
    pub header: Header,
    /// `false` when the file has no header delimiter at all.
    pub has_header: bool,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_path: Option<PathBuf>,
}

impl ComponentDocument {
    #[must_use]
    pub fn new(kind: ComponentKind, header: Option<Header>, body: impl Into<String>) -> Self {
        Self {
            kind,
            has_header: header.is_some(),
            header: header.unwrap_or_default(),
            body: body.into(),
            source_path: None,
        }
    }

    #[must_use]
    pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    /// Copy with `key` set. Setting an attribute creates the header if the
    /// document had none.
    #[must_use]
    pub fn with_attribute(&self, key: &str, value: AttributeValue) -> Self {
        let mut next = self.clone();
        next.header.insert(key, value);
        next.has_header = true;
        next
    }

    #[must_use]
    pub fn without_attribute(&self, key: &str) -> Self {
        let mut next = self.clone();
        next.header.remove(key);
        next
    }

    #[must_use]
    pub fn with_renamed_attribute(&self, from: &str, to: &str) -> Self {
        let mut next = self.clone();
        next.header.rename(from, to);
        next
    }

    #[must_use]
    pub fn with_body(&self, body: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.body = body.into();
        next
    }

    #[must_use]
    pub fn attribute(&self, key: &str) -> Option<&AttributeValue> {
        self.header.get(key)
    }

    /// File stem of the source path, or the parent directory name for
    /// `SKILL.md`.
    #[must_use]
    pub fn file_stem(&self) -> Option<String> {
        let path = self.source_path.as_deref()?;
        let is_skill_md = path
            .file_name()
            .is_some_and(|n| n.eq_ignore_ascii_case("SKILL.md"));
        if is_skill_md {
            let parent = path.parent()?.file_name()?;
            return Some(parent.to_string_lossy().into_owned());
        }
        Some(path.file_stem()?.to_string_lossy().into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── ComponentKind::infer ────────────────────────────────────────────

    #[test]
    fn infer_hook_from_json() {
        assert_eq!(
            ComponentKind::infer(Path::new("plugin/hooks/hooks.json")),
            Some(ComponentKind::Hook)
        );
    }

    #[test]
    fn infer_skill_from_file_name() {
        assert_eq!(
            ComponentKind::infer(Path::new("anywhere/my-skill/SKILL.md")),
            Some(ComponentKind::Skill)
        );
    }

    #[test]
    fn infer_from_enclosing_directory() {
        assert_eq!(
            ComponentKind::infer(Path::new("plugin/commands/git/commit.md")),
            Some(ComponentKind::Command)
        );
        assert_eq!(
            ComponentKind::infer(Path::new(".claude/agents/reviewer.md")),
            Some(ComponentKind::Agent)
        );
    }

    #[test]
    fn infer_nearest_directory_wins() {
        assert_eq!(
            ComponentKind::infer(Path::new("agents/commands/x.md")),
            Some(ComponentKind::Command)
        );
    }

    #[test]
    fn infer_none_without_hint() {
        assert_eq!(ComponentKind::infer(Path::new("notes/readme.md")), None);
    }

    // ── AttributeValue ──────────────────────────────────────────────────

    #[test]
    fn yaml_scalars_become_scalar() {
        use serde_yaml_ng::Value;
        assert_eq!(
            AttributeValue::from_yaml(Value::Bool(true)),
            AttributeValue::scalar("true")
        );
        assert_eq!(
            AttributeValue::from_yaml(Value::Null),
            AttributeValue::scalar("")
        );
    }

    #[test]
    fn yaml_sequence_of_scalars_becomes_list() {
        let v: serde_yaml_ng::Value = serde_yaml_ng::from_str("[Read, Grep]").unwrap();
        assert_eq!(
            AttributeValue::from_yaml(v),
            AttributeValue::List(vec!["Read".into(), "Grep".into()])
        );
    }

    #[test]
    fn yaml_mapping_is_unknown() {
        let v: serde_yaml_ng::Value = serde_yaml_ng::from_str("a: 1").unwrap();
        assert_eq!(AttributeValue::from_yaml(v).shape(), Shape::Unknown);
    }

    #[test]
    fn list_and_joined_string_normalize_identically() {
        let list = AttributeValue::List(vec!["[file]".into(), "[mode]".into()]);
        let joined = AttributeValue::scalar("[file] [mode]");
        assert_eq!(list.normalized(), joined.normalized());
    }

    #[test]
    fn items_split_comma_scalar() {
        let v = AttributeValue::scalar("Read, Grep,  Glob");
        assert_eq!(v.items(), vec!["Read", "Grep", "Glob"]);
    }

    // ── Header ──────────────────────────────────────────────────────────

    #[test]
    fn header_preserves_insertion_order() {
        let mut h = Header::new();
        h.insert("name", AttributeValue::scalar("a"));
        h.insert("description", AttributeValue::scalar("b"));
        h.insert("name", AttributeValue::scalar("c"));
        let keys: Vec<_> = h.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["name", "description"]);
        assert_eq!(h.get("name"), Some(&AttributeValue::scalar("c")));
    }

    #[test]
    fn header_rename_keeps_position() {
        let mut h = Header::new();
        h.insert("name", AttributeValue::scalar("a"));
        h.insert("tools", AttributeValue::scalar("Read"));
        h.insert("model", AttributeValue::scalar("x"));
        assert!(h.rename("tools", "allowed-tools"));
        let keys: Vec<_> = h.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["name", "allowed-tools", "model"]);
        assert!(!h.rename("missing", "other"));
    }

    #[test]
    fn header_rename_replaces_existing_target() {
        let mut h = Header::new();
        h.insert("allowed-tools", AttributeValue::scalar("Bash"));
        h.insert("tools", AttributeValue::scalar("Read"));
        assert!(h.rename("tools", "allowed-tools"));
        assert_eq!(h.len(), 1);
        assert_eq!(
            h.get("allowed-tools"),
            Some(&AttributeValue::scalar("Read"))
        );
    }

    // ── ComponentDocument ───────────────────────────────────────────────

    #[test]
    fn with_attribute_creates_header() {
        let doc = ComponentDocument::new(ComponentKind::Agent, None, "# Body\n");
        assert!(!doc.has_header);
        let next = doc.with_attribute("name", AttributeValue::scalar("x"));
        assert!(next.has_header);
        assert!(!doc.has_header, "original must be untouched");
    }

    #[test]
    fn file_stem_uses_skill_directory() {
        let doc = ComponentDocument::new(ComponentKind::Skill, None, "")
            .with_source_path("skills/pdf-tools/SKILL.md");
        assert_eq!(doc.file_stem().as_deref(), Some("pdf-tools"));
        let doc = ComponentDocument::new(ComponentKind::Agent, None, "")
            .with_source_path("agents/code-reviewer.md");
        assert_eq!(doc.file_stem().as_deref(), Some("code-reviewer"));
    }
}
