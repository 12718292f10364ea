//! Migration execution: approval, backup, atomic write, re-validation.

use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::Serialize;
use similar::TextDiff;
use tempfile::NamedTempFile;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::errors::{MigrationConflict, Result};
use crate::migration::{Change, ChangeMode, MigrationPlan};
use crate::models::ComponentDocument;
use crate::parser::{parse_document, render_document};
use crate::scorer::{self, ScoreReport};
use crate::validator::{self, ValidationResult};
use crate::version::{self, SchemaVersion};

/// Infix between a file name and its backup timestamp.
pub const BACKUP_INFIX: &str = ".pre-migration-";

/// ISO 8601 basic format, UTC.
const BACKUP_TIMESTAMP: &str = "%Y%m%dT%H%M%SZ";

/// Which confirmation-gated changes may run.
///
/// Automatic changes always run and manual-only changes never do.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Approval {
    #[default]
    AutomaticOnly,
    All,
    /// Gated changes whose id is in the set.
    Selected(BTreeSet<String>),
}

impl Approval {
    #[must_use]
    pub fn allows(&self, change: &Change) -> bool {
        match change.mode {
            ChangeMode::Automatic => true,
            ChangeMode::ManualOnly => false,
            ChangeMode::NeedsConfirmation => match self {
                Approval::AutomaticOnly => false,
                Approval::All => true,
                Approval::Selected(ids) => ids.contains(change.id),
            },
        }
    }
}

/// Result of applying a plan in memory.
#[derive(Debug, Clone)]
pub struct AppliedChanges {
    pub document: ComponentDocument,
    pub applied: Vec<&'static str>,
    /// Gated changes left out for lack of approval.
    pub unapproved: Vec<&'static str>,
    pub manual: Vec<&'static str>,
}

/// Apply approved changes in plan order without touching the filesystem.
///
/// The first conflict aborts the whole batch.
pub fn apply_changes(
    doc: &ComponentDocument,
    plan: &MigrationPlan,
    approval: &Approval,
) -> std::result::Result<AppliedChanges, MigrationConflict> {
    let mut current = doc.clone();
    let mut applied = Vec::new();
    let mut unapproved = Vec::new();
    let mut manual = Vec::new();

    for change in &plan.changes {
        if change.is_manual() {
            manual.push(change.id);
            continue;
        }
        if !approval.allows(change) {
            unapproved.push(change.id);
            continue;
        }
        if let Some(next) = change.apply(&current) {
            current = next.inspect_err(|e| warn!(change = change.id, "{e}"))?;
            applied.push(change.id);
        }
    }

    Ok(AppliedChanges {
        document: current,
        applied,
        unapproved,
        manual,
    })
}

/// Before/after comparison of one executed migration.
#[derive(Debug, Clone, Serialize)]
pub struct MigrationOutcome {
    pub path: PathBuf,
    pub from_version: SchemaVersion,
    pub to_version: SchemaVersion,
    pub applied: Vec<&'static str>,
    pub unapproved: Vec<&'static str>,
    pub manual: Vec<&'static str>,
    /// `None` when nothing was written.
    pub backup: Option<PathBuf>,
    pub before: ValidationResult,
    pub after: ValidationResult,
    pub score_before: ScoreReport,
    pub score_after: ScoreReport,
}

impl MigrationOutcome {
    #[must_use]
    pub fn written(&self) -> bool {
        self.backup.is_some()
    }
}

/// Execute a plan against the file at `path`.
///
/// Changes are applied in memory first; a conflict returns an error and
/// leaves the file untouched. Otherwise the original is backed up, the new
/// text is written atomically and the result is re-validated. When no change
/// applies nothing is written and no backup is made.
pub fn execute(
    path: &Path,
    doc: &ComponentDocument,
    plan: &MigrationPlan,
    approval: &Approval,
    config: &EngineConfig,
) -> Result<MigrationOutcome> {
    let before = validator::validate_with(doc, config);
    let score_before = scorer::score_with(doc, config);
    let staged = apply_changes(doc, plan, approval)?;

    if staged.applied.is_empty() {
        info!(path = %path.display(), "nothing to apply");
        return Ok(MigrationOutcome {
            path: path.to_path_buf(),
            from_version: plan.from_version,
            to_version: version::classify(doc, &before),
            applied: staged.applied,
            unapproved: staged.unapproved,
            manual: staged.manual,
            backup: None,
            after: before.clone(),
            before,
            score_after: score_before.clone(),
            score_before,
        });
    }

    let rendered = render_document(&staged.document)?;
    let backup = create_backup(path, Utc::now())?;
    write_atomic(path, &rendered)?;
    info!(
        path = %path.display(),
        backup = %backup.display(),
        changes = staged.applied.len(),
        "migrated"
    );

    let written = parse_document(&rendered, doc.kind)?.with_source_path(path);
    let after = validator::validate_with(&written, config);
    Ok(MigrationOutcome {
        path: path.to_path_buf(),
        from_version: plan.from_version,
        to_version: version::classify(&written, &after),
        applied: staged.applied,
        unapproved: staged.unapproved,
        manual: staged.manual,
        backup: Some(backup),
        before,
        after,
        score_before,
        score_after: scorer::score_with(&written, config),
    })
}

/// Backup path for `path` at `now`. Attempts after the first get a `-N`
/// suffix.
#[must_use]
pub fn backup_path(path: &Path, now: DateTime<Utc>, attempt: usize) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = format!("{name}{BACKUP_INFIX}{}", now.format(BACKUP_TIMESTAMP));
    if attempt == 0 {
        path.with_file_name(base)
    } else {
        path.with_file_name(format!("{base}-{attempt}"))
    }
}

/// Copy `path` to a fresh backup and return the backup's path.
///
/// Each candidate is opened with `create_new`, so two runs never claim the
/// same backup. The backup keeps the original's permissions.
pub fn create_backup(path: &Path, now: DateTime<Utc>) -> Result<PathBuf> {
    let mut source = File::open(path)?;
    let permissions = source.metadata()?.permissions();
    let mut attempt = 0;
    loop {
        let candidate = backup_path(path, now, attempt);
        attempt += 1;
        let mut backup = match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        };
        io::copy(&mut source, &mut backup)?;
        backup.set_permissions(permissions)?;
        info!(backup = %candidate.display(), "backed up original");
        return Ok(candidate);
    }
}

/// Replace `path` with `contents` via a temp file in the same directory.
///
/// An existing file's permissions carry over to the replacement.
pub fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or(Path::new("."));
    let permissions = fs::metadata(path).ok().map(|m| m.permissions());
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(contents.as_bytes())?;
    if let Some(permissions) = permissions {
        tmp.as_file().set_permissions(permissions)?;
    }
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Unified diff between the current and migrated text of `label`.
#[must_use]
pub fn preview_diff(label: &str, before: &str, after: &str) -> String {
    TextDiff::from_lines(before, after)
        .unified_diff()
        .context_radius(3)
        .header(&format!("a/{label}"), &format!("b/{label}"))
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::migration;
    use crate::models::ComponentKind;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn load(path: &Path, kind: ComponentKind) -> ComponentDocument {
        let text = fs::read_to_string(path).unwrap();
        parse_document(&text, kind).unwrap().with_source_path(path)
    }

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 16, 10, 15, 0).unwrap()
    }

    // ── Approval ────────────────────────────────────────────────────────

    #[test]
    fn automatic_only_skips_gated_changes() {
        let doc = parse_document("# My Helper\n\nYou are a helper.\n", ComponentKind::Agent)
            .unwrap();
        let plan = migration::plan(&doc, &EngineConfig::default());
        let staged = apply_changes(&doc, &plan, &Approval::AutomaticOnly).unwrap();
        assert!(staged.applied.is_empty());
        assert_eq!(staged.unapproved.len(), 3);
        assert_eq!(staged.document, doc);
    }

    #[test]
    fn selected_approval_runs_named_changes() {
        let doc = parse_document("# My Helper\n\nYou are a helper.\n", ComponentKind::Agent)
            .unwrap();
        let plan = migration::plan(&doc, &EngineConfig::default());
        let approval = Approval::Selected(["extract-name".to_string()].into());
        let staged = apply_changes(&doc, &plan, &approval).unwrap();
        assert_eq!(staged.applied, vec!["extract-name"]);
        assert!(staged.document.attribute("description").is_none());
    }

    // ── Execution ───────────────────────────────────────────────────────

    #[test]
    fn execute_backs_up_and_rewrites() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("helper.md");
        let original = "# My Helper\n\nYou are a helpful assistant.\n";
        fs::write(&path, original).unwrap();

        let doc = load(&path, ComponentKind::Agent);
        let config = EngineConfig::default();
        let plan = migration::plan(&doc, &config);
        let outcome = execute(&path, &doc, &plan, &Approval::All, &config).unwrap();

        assert!(outcome.written());
        assert!(!outcome.before.passed());
        assert!(outcome.after.passed());
        assert_eq!(outcome.to_version, SchemaVersion::Current);
        let backup = outcome.backup.unwrap();
        assert_eq!(fs::read_to_string(&backup).unwrap(), original);
        let name = backup.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("helper.md.pre-migration-"), "{name}");

        let migrated = fs::read_to_string(&path).unwrap();
        assert!(migrated.starts_with("---\nname: my-helper\n"));
        assert!(migrated.ends_with(original));
    }

    #[test]
    fn nothing_to_apply_writes_nothing() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("ok.md");
        fs::write(&path, "---\nname: ok\ndescription: d\n---\nBody\n").unwrap();

        let doc = load(&path, ComponentKind::Agent);
        let config = EngineConfig::default();
        let plan = migration::plan(&doc, &config);
        assert!(plan.is_empty());
        let outcome = execute(&path, &doc, &plan, &Approval::All, &config).unwrap();
        assert!(!outcome.written());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn conflict_leaves_file_untouched() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bad.md");
        let original = "---\nname: \"***\"\ndescription: d\n---\n";
        fs::write(&path, original).unwrap();

        let doc = load(&path, ComponentKind::Agent);
        let config = EngineConfig::default();
        let plan = migration::plan(&doc, &config);
        let err = execute(&path, &doc, &plan, &Approval::All, &config).unwrap_err();
        assert!(matches!(err, crate::errors::CompauditError::Conflict(_)));
        assert_eq!(fs::read_to_string(&path).unwrap(), original);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn hook_migration_round_trips() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hooks.json");
        fs::write(&path, r#"{"Stop": [{"hooks": [{"command": "echo done"}]}]}"#).unwrap();

        let doc = load(&path, ComponentKind::Hook);
        let config = EngineConfig::default();
        let plan = migration::plan(&doc, &config);
        let outcome = execute(&path, &doc, &plan, &Approval::AutomaticOnly, &config).unwrap();
        assert_eq!(outcome.applied, vec!["wrap-hooks", "infer-hook-type"]);
        assert_eq!(outcome.to_version, SchemaVersion::Current);
        let value: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(value["hooks"]["Stop"][0]["hooks"][0]["type"], "command");
    }

    // ── Backups ─────────────────────────────────────────────────────────

    #[test]
    fn backup_name_uses_basic_utc_timestamp() {
        let path = Path::new("/nonexistent/agents/helper.md");
        assert_eq!(
            backup_path(path, fixed_time(), 0),
            Path::new("/nonexistent/agents/helper.md.pre-migration-20261016T101500Z")
        );
        assert_eq!(
            backup_path(path, fixed_time(), 2),
            Path::new("/nonexistent/agents/helper.md.pre-migration-20261016T101500Z-2")
        );
    }

    #[test]
    fn backup_name_avoids_collisions() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.md");
        fs::write(&path, "x").unwrap();
        let first = create_backup(&path, fixed_time()).unwrap();
        let second = create_backup(&path, fixed_time()).unwrap();
        assert_ne!(first, second);
        assert!(second.to_string_lossy().ends_with("T101500Z-1"));
        assert_eq!(fs::read_to_string(second).unwrap(), "x");
    }

    #[test]
    fn concurrent_backups_never_share_a_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("a.md");
        fs::write(&path, "x").unwrap();
        let mut backups: Vec<PathBuf> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..8)
                .map(|_| scope.spawn(|| create_backup(&path, fixed_time()).unwrap()))
                .collect();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });
        backups.sort();
        backups.dedup();
        assert_eq!(backups.len(), 8);
        for backup in &backups {
            assert_eq!(fs::read_to_string(backup).unwrap(), "x");
        }
    }

    #[cfg(unix)]
    #[test]
    fn migration_keeps_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempdir().unwrap();
        let path = dir.path().join("helper.md");
        fs::write(&path, "# My Helper\n\nYou are a helpful assistant.\n").unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o644)).unwrap();

        let doc = load(&path, ComponentKind::Agent);
        let config = EngineConfig::default();
        let plan = migration::plan(&doc, &config);
        let outcome = execute(&path, &doc, &plan, &Approval::All, &config).unwrap();

        let mode = |p: &Path| fs::metadata(p).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode(&path), 0o644);
        assert_eq!(mode(&outcome.backup.unwrap()), 0o644);
    }

    #[test]
    fn preview_diff_is_unified() {
        let diff = preview_diff("a.md", "one\ntwo\n", "one\nthree\n");
        assert!(diff.contains("--- a/a.md"));
        assert!(diff.contains("+++ b/a.md"));
        assert!(diff.contains("-two"));
        assert!(diff.contains("+three"));
    }
}
