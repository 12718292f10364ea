pub mod audit;
pub mod compare;
pub mod config;
pub mod diagnostics;
pub mod errors;
pub mod executor;
pub(crate) mod fs_util;
pub mod hooks;
pub mod migration;
pub mod models;
pub mod parser;
pub mod reporter;
pub mod schema;
pub mod scorer;
pub mod validator;
pub mod version;

// Re-export key types at crate root for convenience.
pub use audit::{audit_dir, audit_file, audit_paths, discover, AuditOptions};
pub use compare::{compare, Comparison};
pub use config::EngineConfig;
pub use diagnostics::{Diagnostic, Severity};
pub use errors::{CompauditError, MigrationConflict, Result};
pub use executor::{apply_changes, execute, Approval, MigrationOutcome};
pub use migration::{plan_migration, Change, ChangeMode, MigrationPlan};
pub use models::{AttributeValue, ComponentDocument, ComponentKind, Header};
pub use parser::{parse_document, read_document, render_document};
pub use reporter::{FileReport, Status};
pub use scorer::{
    score, score_dimension, score_dimension_with, score_with, Dimension, ScoreReport,
};
pub use validator::{validate, validate_with, ValidationResult};
pub use version::{detect_version, SchemaVersion};
