use thiserror::Error;

/// A migration change that could not be applied to a document.
///
/// Raised when a change's prerequisite attribute is itself invalid (for
/// example a `name` written as a list). The batch for that file is aborted
/// and the file on disk is left untouched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot apply `{change}`: {reason}")]
pub struct MigrationConflict {
    /// Id of the change that failed.
    pub change: String,
    /// Why the change could not be applied.
    pub reason: String,
}

impl MigrationConflict {
    #[must_use]
    pub fn new(change: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            change: change.into(),
            reason: reason.into(),
        }
    }
}

/// Errors that can occur during component operations.
#[derive(Error, Debug)]
pub enum CompauditError {
    /// The component header (or hook JSON) is malformed.
    #[error("parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    /// A migration change could not be applied.
    #[error("migration conflict: {0}")]
    Conflict(#[from] MigrationConflict),

    /// The engine configuration file is invalid.
    #[error("config error: {message}")]
    Config { message: String },

    /// Filesystem I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization error.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml_ng::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CompauditError {
    /// Build a parse error pointing at a 1-based line.
    #[must_use]
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Returns `true` for errors that abort processing of a single file
    /// before validation.
    #[must_use]
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }
}

/// Convenience alias for `Result<T, CompauditError>`.
pub type Result<T> = std::result::Result<T, CompauditError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_error_display_includes_line() {
        let e = CompauditError::parse(3, "unterminated header");
        assert_eq!(e.to_string(), "parse error at line 3: unterminated header");
        assert!(e.is_parse());
    }

    #[test]
    fn conflict_converts_into_error() {
        let c = MigrationConflict::new("canonical-name", "`name` is a list");
        let e: CompauditError = c.clone().into();
        assert!(!e.is_parse());
        assert!(e.to_string().contains("canonical-name"));
        assert!(matches!(e, CompauditError::Conflict(inner) if inner == c));
    }
}
