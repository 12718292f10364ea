use std::path::PathBuf;

use compaudit::reporter::overall_status;
use compaudit::{AuditOptions, EngineConfig};

pub(crate) fn run(dir: PathBuf, deep: bool, format: super::Format, config: EngineConfig) {
    if !dir.is_dir() {
        super::fail(
            "audit",
            format!("{} is not a directory", super::display(&dir)),
        );
    }

    let options = AuditOptions {
        kind: None,
        deep,
        config,
    };
    let reports = compaudit::audit_dir(&dir, &options);
    if reports.is_empty() {
        eprintln!("No component files found under {}.", super::display(&dir));
        return;
    }
    super::emit_reports("audit", &reports, format);
    super::exit_with(overall_status(&reports).exit_code());
}
