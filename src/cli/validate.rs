use std::path::PathBuf;

use compaudit::reporter::overall_status;
use compaudit::{AuditOptions, EngineConfig};

pub(crate) fn run(
    paths: Vec<PathBuf>,
    kind: Option<super::Kind>,
    deep: bool,
    format: super::Format,
    config: EngineConfig,
) {
    let files = super::expand_paths(&paths);
    if files.is_empty() {
        eprintln!("No component files found under the specified path(s).");
        std::process::exit(1);
    }

    let options = AuditOptions {
        kind: kind.map(Into::into),
        deep,
        config,
    };
    let reports = compaudit::audit_paths(&files, &options);
    super::emit_reports("validate", &reports, format);
    super::exit_with(overall_status(&reports).exit_code());
}
