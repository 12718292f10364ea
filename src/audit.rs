//! Project-wide audit: discover component files and check them in parallel.

use std::path::{Path, PathBuf};

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::fs_util::{is_regular_dir, is_regular_file};
use crate::models::ComponentKind;
use crate::parser::read_document;
use crate::reporter::FileReport;
use crate::scorer;
use crate::validator;

/// Directory names never descended into.
const SKIPPED_DIRS: &[&str] = &["target", "node_modules"];

/// Options shared by every file in one audit.
#[derive(Debug, Clone, Default)]
pub struct AuditOptions {
    /// Kind for every file; inferred from each path when `None`.
    pub kind: Option<ComponentKind>,
    /// Also score each file and collect recommendations.
    pub deep: bool,
    pub config: EngineConfig,
}

/// Kind of a file found during discovery, or `None` if it is not a
/// component.
///
/// Stricter than [`ComponentKind::infer`]: only `hooks.json` counts as a
/// hook configuration, and inside a skill only `SKILL.md` is a component.
/// Other markdown files take the kind of their nearest `agents/` or
/// `commands/` ancestor, so namespaced commands such as
/// `commands/git/commit.md` are found.
#[must_use]
pub fn discovered_kind(path: &Path) -> Option<ComponentKind> {
    let name = path.file_name()?.to_string_lossy();
    if name.eq_ignore_ascii_case("hooks.json") {
        return Some(ComponentKind::Hook);
    }
    if name.eq_ignore_ascii_case("SKILL.md") {
        return Some(ComponentKind::Skill);
    }
    let is_markdown = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("md"));
    if !is_markdown {
        return None;
    }
    match ComponentKind::infer(path)? {
        kind @ (ComponentKind::Agent | ComponentKind::Command) => Some(kind),
        _ => None,
    }
}

/// Every component file under `root`, sorted by path.
///
/// Symlinks, hidden directories and build output are skipped. A `root`
/// that is itself a file is returned as-is.
#[must_use]
pub fn discover(root: &Path) -> Vec<PathBuf> {
    if is_regular_file(root) {
        return vec![root.to_path_buf()];
    }
    // Ancestors above the root say nothing about what it holds.
    let base = root.parent().unwrap_or(root);
    let mut found = Vec::new();
    walk(base, root, &mut found);
    found.sort();
    found
}

fn walk(base: &Path, dir: &Path, found: &mut Vec<PathBuf>) {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(dir = %dir.display(), "cannot read directory: {e}");
            return;
        }
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().into_owned();
        if is_regular_dir(&path) {
            if !name.starts_with('.') && !SKIPPED_DIRS.contains(&name.as_str()) {
                walk(base, &path, found);
            }
        } else if is_regular_file(&path) {
            let relative = path.strip_prefix(base).unwrap_or(&path);
            if discovered_kind(relative).is_some() {
                found.push(path);
            }
        }
    }
}

/// Validate (and with `deep`, score) a single file.
///
/// Read and parse failures become critical entries rather than errors.
#[must_use]
pub fn audit_file(path: &Path, options: &AuditOptions) -> FileReport {
    let kind = options
        .kind
        .or_else(|| discovered_kind(path))
        .or_else(|| ComponentKind::infer(path))
        .unwrap_or(ComponentKind::Agent);
    let doc = match read_document(path, Some(kind)) {
        Ok(doc) => doc,
        Err(e) => {
            debug!(path = %path.display(), "parse failed: {e}");
            return FileReport::failed(path, kind, &e);
        }
    };
    let report = FileReport::validated(path, &doc, validator::validate_with(&doc, &options.config));
    if options.deep {
        report.with_score(scorer::score_with(&doc, &options.config))
    } else {
        report
    }
}

/// Check every path in parallel. Results are sorted by path.
#[must_use]
pub fn audit_paths(paths: &[PathBuf], options: &AuditOptions) -> Vec<FileReport> {
    let mut reports: Vec<FileReport> = paths
        .par_iter()
        .map(|p| audit_file(p, options))
        .collect();
    reports.sort_by(|a, b| a.path.cmp(&b.path));
    reports
}

/// Discover and check every component under `root`.
#[must_use]
pub fn audit_dir(root: &Path, options: &AuditOptions) -> Vec<FileReport> {
    let paths = discover(root);
    debug!(root = %root.display(), files = paths.len(), "discovered components");
    audit_paths(&paths, options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reporter::{overall_status, Status};
    use std::fs;
    use tempfile::tempdir;

    fn write(root: &Path, rel: &str, text: &str) -> PathBuf {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, text).unwrap();
        path
    }

    fn plugin() -> tempfile::TempDir {
        let dir = tempdir().unwrap();
        let root = dir.path();
        write(
            root,
            "agents/reviewer.md",
            "---\nname: reviewer\ndescription: Reviews code\n---\nYou are a reviewer.\n",
        );
        write(
            root,
            "commands/test.md",
            "---\ndescription: Run tests\nmodel: sonnet\n---\nRun the suite.\n",
        );
        write(
            root,
            "skills/pdf/SKILL.md",
            "---\nname: pdf\ndescription: Works with PDFs\n---\nSteps.\n",
        );
        write(root, "skills/pdf/reference.md", "# Reference\n");
        write(
            root,
            "hooks/hooks.json",
            r#"{"hooks": {"Stop": [{"hooks": [{"type": "command", "command": "echo ok"}]}]}}"#,
        );
        write(root, "package.json", "{}");
        write(root, "README.md", "# Plugin\n");
        write(root, ".git/agents/ignored.md", "# Ignored\n");
        dir
    }

    // ── Discovery ───────────────────────────────────────────────────────

    #[test]
    fn discovered_kinds() {
        assert_eq!(
            discovered_kind(Path::new("p/hooks/hooks.json")),
            Some(ComponentKind::Hook)
        );
        assert_eq!(discovered_kind(Path::new("p/package.json")), None);
        assert_eq!(
            discovered_kind(Path::new("p/skills/x/SKILL.md")),
            Some(ComponentKind::Skill)
        );
        assert_eq!(discovered_kind(Path::new("p/skills/x/notes.md")), None);
        assert_eq!(
            discovered_kind(Path::new("p/commands/run.md")),
            Some(ComponentKind::Command)
        );
        assert_eq!(discovered_kind(Path::new("p/README.md")), None);
        assert_eq!(
            discovered_kind(Path::new("p/commands/git/commit.md")),
            Some(ComponentKind::Command)
        );
        assert_eq!(
            discovered_kind(Path::new("p/agents/review/deep/security.md")),
            Some(ComponentKind::Agent)
        );
    }

    #[test]
    fn discover_finds_namespaced_commands() {
        let dir = tempdir().unwrap();
        write(
            dir.path(),
            "commands/git/commit.md",
            "---\ndescription: Commit staged work\n---\nCommit.\n",
        );
        write(
            dir.path(),
            "commands/git/flow/release.md",
            "---\ndescription: Cut a release\n---\nRelease.\n",
        );
        let found = discover(dir.path());
        assert_eq!(found.len(), 2);
        let reports = audit_paths(&found, &AuditOptions::default());
        assert!(reports.iter().all(|r| r.kind == ComponentKind::Command));
    }

    #[test]
    fn discover_ignores_kind_hints_above_root() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("agents").join("project");
        write(&root, "README.md", "# Project\n");
        write(&root, "commands/run.md", "---\ndescription: Run\n---\nRun.\n");
        let found = discover(&root);
        assert_eq!(found, vec![root.join("commands/run.md")]);
    }

    #[test]
    fn discover_finds_components_only() {
        let dir = plugin();
        let found: Vec<_> = discover(dir.path())
            .into_iter()
            .map(|p| {
                p.strip_prefix(dir.path())
                    .unwrap()
                    .to_string_lossy()
                    .replace('\\', "/")
            })
            .collect();
        assert_eq!(
            found,
            vec![
                "agents/reviewer.md",
                "commands/test.md",
                "hooks/hooks.json",
                "skills/pdf/SKILL.md"
            ]
        );
    }

    #[cfg(unix)]
    #[test]
    fn discover_skips_symlinks() {
        let dir = plugin();
        let outside = tempdir().unwrap();
        write(outside.path(), "agents/evil.md", "# Evil\n");
        std::os::unix::fs::symlink(outside.path().join("agents"), dir.path().join("linked"))
            .unwrap();
        assert_eq!(discover(dir.path()).len(), 4);
    }

    // ── Audit ───────────────────────────────────────────────────────────

    #[test]
    fn audit_reports_per_file_and_worst_status() {
        let dir = plugin();
        let reports = audit_dir(dir.path(), &AuditOptions::default());
        assert_eq!(reports.len(), 4);
        let command = reports
            .iter()
            .find(|r| r.kind == ComponentKind::Command)
            .unwrap();
        assert_eq!(command.status(), Status::Critical);
        assert_eq!(overall_status(&reports), Status::Critical);
        assert!(reports.iter().all(|r| r.score.is_none()));
    }

    #[test]
    fn deep_audit_scores_every_file() {
        let dir = plugin();
        let options = AuditOptions {
            deep: true,
            ..AuditOptions::default()
        };
        let reports = audit_dir(dir.path(), &options);
        assert!(reports.iter().all(|r| r.score.is_some()));
    }

    #[test]
    fn parse_failure_is_reported_not_raised() {
        let dir = tempdir().unwrap();
        let bad = write(dir.path(), "agents/bad.md", "---\nname: [unclosed\n---\n");
        let good = write(
            dir.path(),
            "agents/good.md",
            "---\nname: good\ndescription: d\n---\n",
        );
        let reports = audit_paths(&[good, bad], &AuditOptions::default());
        assert_eq!(reports.len(), 2);
        assert!(reports[0].parse_error.is_some());
        assert!(reports[0].path.ends_with("bad.md"));
        assert_eq!(reports[1].status(), Status::Pass);
    }

    #[test]
    fn missing_file_is_critical() {
        let dir = tempdir().unwrap();
        let report = audit_file(&dir.path().join("agents/none.md"), &AuditOptions::default());
        assert_eq!(report.status(), Status::Critical);
        assert!(report.parse_error.unwrap().line.is_none());
    }
}
