//! Structured diagnostics for validation and reporting.
//!
//! Every problem the validator finds is a [`Diagnostic`] carrying a stable
//! rule id, a severity, and optionally the attribute it concerns and a
//! suggested fix.

use std::fmt;

use serde::Serialize;

/// Severity of a diagnostic message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// A rule violation that blocks validation.
    Error,
    /// A potential issue that does not block validation.
    Warning,
    /// An informational note.
    Info,
}

impl Severity {
    /// Label used in the report summary table.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Severity::Error => "critical",
            Severity::Warning => "warning",
            Severity::Info => "info",
        }
    }
}

/// A structured diagnostic message from validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    /// Severity level.
    pub severity: Severity,
    /// Stable rule id (e.g., `"missing-required"`).
    pub code: &'static str,
    /// Human-readable message.
    pub message: String,
    /// Attribute that caused the diagnostic (e.g., `"name"`).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    /// Suggested fix (actionable text).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suggestion: Option<String>,
}

impl Diagnostic {
    /// Create a new diagnostic with the given severity, code, and message.
    #[must_use]
    pub fn new(severity: Severity, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            field: None,
            suggestion: None,
        }
    }

    /// Shorthand for an error diagnostic.
    #[must_use]
    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, code, message)
    }

    /// Shorthand for a warning diagnostic.
    #[must_use]
    pub fn warning(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, code, message)
    }

    /// Shorthand for an informational diagnostic.
    #[must_use]
    pub fn info(code: &'static str, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, code, message)
    }

    /// Set the attribute that caused this diagnostic.
    #[must_use]
    pub fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    /// Set a suggested fix for this diagnostic.
    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Returns `true` if this diagnostic is an error.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }

    /// Returns `true` if this diagnostic is a warning.
    #[must_use]
    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }

    /// Returns `true` if this diagnostic is informational.
    #[must_use]
    pub fn is_info(&self) -> bool {
        self.severity == Severity::Info
    }
}

/// Display format:
/// - Errors: `"error[code]: message"`
/// - Warnings: `"warning[code]: message"`
/// - Info: `"info[code]: message"`
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let prefix = match self.severity {
            Severity::Error => "error",
            Severity::Warning => "warning",
            Severity::Info => "info",
        };
        write!(f, "{prefix}[{}]: {}", self.code, self.message)
    }
}

// ── Rule ids ────────────────────────────────────────────────────────────

// Generic attribute rules

/// A required attribute is absent.
pub const MISSING_REQUIRED: &str = "missing-required";
/// An attribute has a shape (scalar/list) the rule does not allow.
pub const WRONG_SHAPE: &str = "wrong-shape";
/// An attribute is not known for this component kind.
pub const UNKNOWN_ATTRIBUTE: &str = "unknown-attribute";

// Name rules

/// Name is empty.
pub const NAME_EMPTY: &str = "name-empty";
/// Name exceeds 64 characters.
pub const NAME_TOO_LONG: &str = "name-too-long";
/// Name is not lowercase-hyphen form.
pub const NAME_FORMAT: &str = "name-format";
/// Name contains a reserved word.
pub const NAME_RESERVED: &str = "name-reserved";

// Description rules

/// Description is empty.
pub const DESCRIPTION_EMPTY: &str = "description-empty";
/// Description exceeds the length limit.
pub const DESCRIPTION_TOO_LONG: &str = "description-too-long";
/// Description contains XML/HTML tags.
pub const DESCRIPTION_MARKUP: &str = "description-markup";

// Model rules

/// `model` present on a skill.
pub const MODEL_FORBIDDEN: &str = "model-forbidden";
/// Bare short alias used where a qualified model id is required.
pub const MODEL_SHORT_ALIAS: &str = "model-short-alias";
/// Model value is not recognised.
pub const MODEL_INVALID: &str = "model-invalid";
/// Model is a version alias without snapshot date (accepted, lower confidence).
pub const MODEL_UNPINNED: &str = "model-unpinned";

// Other attribute rules

/// Unknown tool name in `tools`/`allowed-tools`.
pub const TOOL_UNKNOWN: &str = "tool-unknown";
/// `color` is not a known colour.
pub const COLOR_UNKNOWN: &str = "color-unknown";
/// `version` is not a dotted number.
pub const VERSION_FORMAT: &str = "version-format";
/// `argument-hint` is not in bracket notation.
pub const ARGUMENT_HINT_FORMAT: &str = "argument-hint-format";
/// `disable-model-invocation` is not boolean-like.
pub const NOT_BOOLEAN: &str = "not-boolean";

// Body rules

/// Body exceeds the line limit.
pub const BODY_TOO_LONG: &str = "body-too-long";
/// Body is empty.
pub const BODY_EMPTY: &str = "body-empty";

// Hook rules

/// Hook document is not an object of event arrays.
pub const HOOK_STRUCTURE: &str = "hook-structure";
/// Unknown hook event name.
pub const HOOK_UNKNOWN_EVENT: &str = "hook-unknown-event";
/// Hook entry has no `hooks` array.
pub const HOOK_MISSING_ACTIONS: &str = "hook-missing-actions";
/// Hook action type missing or unknown.
pub const HOOK_TYPE: &str = "hook-type";
/// Hook action lacks its `command`/`prompt` payload.
pub const HOOK_MISSING_PAYLOAD: &str = "hook-missing-payload";
/// Tool event entry without a matcher.
pub const HOOK_MISSING_MATCHER: &str = "hook-missing-matcher";
/// Matcher does not name a concrete capability.
pub const HOOK_MATCHER_INVALID: &str = "hook-matcher-invalid";
/// Matcher is the wildcard.
pub const HOOK_WILDCARD_MATCHER: &str = "hook-wildcard-matcher";
/// Matcher on an event that does not take one.
pub const HOOK_UNEXPECTED_MATCHER: &str = "hook-unexpected-matcher";
/// Timeout outside the recommended range.
pub const HOOK_TIMEOUT: &str = "hook-timeout";
/// Prompt hook on an event where prompts add little.
pub const HOOK_PROMPT_EVENT: &str = "hook-prompt-event";
/// Event map not wrapped under the top-level `hooks` key.
pub const HOOK_LEGACY_LAYOUT: &str = "hook-legacy-layout";
