use std::fmt;

use serde::Serialize;

use crate::config::EngineConfig;
use crate::models::ComponentDocument;
use crate::validator::{self, ValidationResult};

/// Schema generation of a document. Computed on demand, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SchemaVersion {
    /// No header at all (hooks: a bare event map without the `hooks` key).
    PreInitial,
    /// Header present, but a required attribute is missing or a blocking
    /// rule fails.
    Incomplete,
    /// Validates with no errors.
    Current,
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SchemaVersion::PreInitial => "pre-initial",
            SchemaVersion::Incomplete => "incomplete",
            SchemaVersion::Current => "current",
        })
    }
}

/// Classify a document's schema generation.
#[must_use]
pub fn detect_version(doc: &ComponentDocument) -> SchemaVersion {
    detect_version_with(doc, &EngineConfig::default())
}

/// Classify a document using engine options for validation.
#[must_use]
pub fn detect_version_with(doc: &ComponentDocument, config: &EngineConfig) -> SchemaVersion {
    classify(doc, &validator::validate_with(doc, config))
}

/// Classify from an existing validation result.
#[must_use]
pub fn classify(doc: &ComponentDocument, validation: &ValidationResult) -> SchemaVersion {
    if !doc.has_header {
        SchemaVersion::PreInitial
    } else if validation.passed() {
        SchemaVersion::Current
    } else {
        SchemaVersion::Incomplete
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ComponentKind;
    use crate::parser::parse_document;

    fn version(text: &str, kind: ComponentKind) -> SchemaVersion {
        detect_version(&parse_document(text, kind).unwrap())
    }

    #[test]
    fn no_header_is_pre_initial() {
        assert_eq!(
            version("# My Helper\n\nYou are a helpful assistant.\n", ComponentKind::Agent),
            SchemaVersion::PreInitial
        );
    }

    #[test]
    fn missing_required_is_incomplete() {
        assert_eq!(
            version("---\ndescription: d\n---\n", ComponentKind::Agent),
            SchemaVersion::Incomplete
        );
    }

    #[test]
    fn empty_header_is_incomplete() {
        assert_eq!(
            version("---\n---\nbody\n", ComponentKind::Skill),
            SchemaVersion::Incomplete
        );
    }

    #[test]
    fn blocking_rule_failure_is_incomplete() {
        assert_eq!(
            version(
                "---\nname: pdf\ndescription: d\nmodel: sonnet\n---\n",
                ComponentKind::Skill
            ),
            SchemaVersion::Incomplete
        );
    }

    #[test]
    fn warnings_only_is_current() {
        assert_eq!(
            version(
                "---\nname: x\ndescription: d\ncolor: teal\n---\n",
                ComponentKind::Agent
            ),
            SchemaVersion::Current
        );
    }

    #[test]
    fn hook_layouts() {
        assert_eq!(
            version(r#"{"Stop": []}"#, ComponentKind::Hook),
            SchemaVersion::PreInitial
        );
        assert_eq!(
            version(r#"{"hooks": {"Stop": []}}"#, ComponentKind::Hook),
            SchemaVersion::Current
        );
        assert_eq!(
            version(r#"{"hooks": {"OnSave": []}}"#, ComponentKind::Hook),
            SchemaVersion::Incomplete
        );
    }
}
