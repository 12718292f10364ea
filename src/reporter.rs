//! Report rendering and exit-code selection.
//!
//! Everything here is pure formatting: callers decide where the text goes.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::compare::Comparison;
use crate::diagnostics::Diagnostic;
use crate::errors::{CompauditError, Result};
use crate::executor::MigrationOutcome;
use crate::migration::{ChangeMode, MigrationPlan};
use crate::models::{ComponentDocument, ComponentKind};
use crate::scorer::{Dimension, Recommendation, ScoreReport};
use crate::validator::ValidationResult;
use crate::version::{self, SchemaVersion};

/// Process exit status, ordered by badness.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    #[default]
    Pass,
    Warnings,
    Critical,
}

impl Status {
    /// `0` pass, `1` critical error present, `2` warnings only.
    #[must_use]
    pub fn exit_code(self) -> i32 {
        match self {
            Status::Pass => 0,
            Status::Critical => 1,
            Status::Warnings => 2,
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Status::Pass => "pass",
            Status::Warnings => "warnings",
            Status::Critical => "critical",
        }
    }

    #[must_use]
    pub fn of(result: &ValidationResult) -> Self {
        if !result.errors.is_empty() {
            Status::Critical
        } else if !result.warnings.is_empty() {
            Status::Warnings
        } else {
            Status::Pass
        }
    }
}

/// Where a file failed before validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParseFailure {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
    pub message: String,
}

/// Everything known about one processed file.
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub kind: ComponentKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<SchemaVersion>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<ScoreReport>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub recommendations: Vec<Recommendation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_error: Option<ParseFailure>,
}

impl FileReport {
    #[must_use]
    pub fn validated(path: &Path, doc: &ComponentDocument, validation: ValidationResult) -> Self {
        Self {
            path: path.to_path_buf(),
            kind: doc.kind,
            version: Some(version::classify(doc, &validation)),
            validation: Some(validation),
            score: None,
            recommendations: Vec::new(),
            parse_error: None,
        }
    }

    /// Report for a file that could not be read or parsed.
    #[must_use]
    pub fn failed(path: &Path, kind: ComponentKind, err: &CompauditError) -> Self {
        let failure = match err {
            CompauditError::Parse { line, message } => ParseFailure {
                line: Some(*line),
                message: message.clone(),
            },
            other => ParseFailure {
                line: None,
                message: other.to_string(),
            },
        };
        Self {
            path: path.to_path_buf(),
            kind,
            version: None,
            validation: None,
            score: None,
            recommendations: Vec::new(),
            parse_error: Some(failure),
        }
    }

    #[must_use]
    pub fn with_score(mut self, score: ScoreReport) -> Self {
        self.recommendations = score.recommendations();
        self.score = Some(score);
        self
    }

    #[must_use]
    pub fn status(&self) -> Status {
        match (&self.parse_error, &self.validation) {
            (Some(_), _) => Status::Critical,
            (None, Some(v)) => Status::of(v),
            (None, None) => Status::Pass,
        }
    }
}

/// Worst status across all reports.
#[must_use]
pub fn overall_status(reports: &[FileReport]) -> Status {
    reports
        .iter()
        .map(FileReport::status)
        .max()
        .unwrap_or(Status::Pass)
}

/// Counts by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub files: usize,
    pub passed: usize,
    pub critical: usize,
    pub warnings: usize,
    pub info: usize,
    pub status: Status,
}

#[must_use]
pub fn summarize(reports: &[FileReport]) -> Summary {
    let mut summary = Summary {
        files: reports.len(),
        status: overall_status(reports),
        ..Summary::default()
    };
    for report in reports {
        if report.parse_error.is_some() {
            summary.critical += 1;
            continue;
        }
        if let Some(v) = &report.validation {
            summary.critical += v.errors.len();
            summary.warnings += v.warnings.len();
            summary.info += v.notes.len();
            if v.passed() {
                summary.passed += 1;
            }
        }
    }
    summary
}

/// Audit-style JSON document.
#[derive(Debug, Serialize)]
struct JsonReport<'a> {
    summary: Summary,
    files: &'a [FileReport],
}

/// Pretty JSON with a summary and one entry per file.
pub fn render_json(reports: &[FileReport]) -> Result<String> {
    Ok(serde_json::to_string_pretty(&JsonReport {
        summary: summarize(reports),
        files: reports,
    })?)
}

/// Human-readable report: Summary, Critical Issues, Warnings, Notes,
/// Scores and Recommendations. Empty sections are left out.
#[must_use]
pub fn render_text(reports: &[FileReport]) -> String {
    let mut out = String::new();
    let summary = summarize(reports);

    out.push_str("Summary\n");
    for (label, n) in [
        ("files", summary.files),
        ("passed", summary.passed),
        ("critical", summary.critical),
        ("warnings", summary.warnings),
        ("info", summary.info),
    ] {
        let _ = writeln!(out, "  {label:<10}{n}");
    }

    let mut critical = String::new();
    let mut warnings = String::new();
    let mut notes = String::new();
    for report in reports {
        let path = report.path.display().to_string();
        if let Some(failure) = &report.parse_error {
            match failure.line {
                Some(line) => {
                    let _ = writeln!(critical, "  {path}:{line}: {}", failure.message);
                }
                None => {
                    let _ = writeln!(critical, "  {path}: {}", failure.message);
                }
            }
        }
        let Some(v) = &report.validation else {
            continue;
        };
        for d in &v.errors {
            push_diagnostic(&mut critical, &path, d);
        }
        for d in &v.warnings {
            push_diagnostic(&mut warnings, &path, d);
        }
        for d in &v.notes {
            push_diagnostic(&mut notes, &path, d);
        }
    }
    push_section(&mut out, "Critical Issues", &critical);
    push_section(&mut out, "Warnings", &warnings);
    push_section(&mut out, "Notes", &notes);

    let mut scores = String::new();
    for report in reports {
        if let Some(score) = &report.score {
            let dims = Dimension::ALL
                .iter()
                .map(|d| format!("{} {}", d.label().to_lowercase(), score.score(*d)))
                .collect::<Vec<_>>()
                .join(", ");
            let _ = writeln!(
                scores,
                "  {}  {}/{}  ({dims})",
                report.path.display(),
                score.total,
                score.max
            );
        }
    }
    push_section(&mut out, "Scores", &scores);

    let mut ranked: Vec<(&Path, &Recommendation)> = reports
        .iter()
        .flat_map(|r| r.recommendations.iter().map(move |rec| (r.path.as_path(), rec)))
        .collect();
    ranked.sort_by_key(|(_, rec)| rec.dimension_score);
    let mut recommendations = String::new();
    for (i, (path, rec)) in ranked.iter().enumerate() {
        let _ = writeln!(
            recommendations,
            "  {}. [{} {}/10] {}: {}",
            i + 1,
            rec.dimension,
            rec.dimension_score,
            path.display(),
            rec.message
        );
    }
    push_section(&mut out, "Recommendations", &recommendations);

    out
}

fn push_diagnostic(out: &mut String, path: &str, d: &Diagnostic) {
    let _ = writeln!(out, "  {path}: {d}");
    if let Some(suggestion) = &d.suggestion {
        let _ = writeln!(out, "      {suggestion}");
    }
}

fn push_section(out: &mut String, title: &str, body: &str) {
    if !body.is_empty() {
        let _ = write!(out, "\n{title}\n{body}");
    }
}

/// Text for a single score report.
#[must_use]
pub fn render_score_text(path: &Path, report: &ScoreReport, only: Option<Dimension>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{}", path.display());
    match only {
        Some(d) => {
            let _ = writeln!(out, "{d}: {}/10", report.score(d));
        }
        None => {
            let _ = writeln!(out, "Score: {}/{}", report.total, report.max);
        }
    }
    for dimension in Dimension::ALL.into_iter().filter(|d| only.is_none_or(|o| o == *d)) {
        let _ = writeln!(out, "\n{dimension} ({}/10):", report.score(dimension));
        let findings: Vec<_> = report
            .findings
            .iter()
            .filter(|f| f.dimension == dimension)
            .collect();
        if findings.is_empty() {
            out.push_str("  no findings\n");
        }
        for f in findings {
            let _ = writeln!(out, "  [-{}] {}", f.points, f.message);
        }
    }
    let recommendations: Vec<_> = report
        .recommendations()
        .into_iter()
        .filter(|r| only.is_none_or(|o| o == r.dimension))
        .collect();
    if !recommendations.is_empty() {
        out.push_str("\nRecommendations:\n");
        for (i, rec) in recommendations.iter().enumerate() {
            let _ = writeln!(out, "  {}. [{}] {}", i + 1, rec.dimension, rec.message);
        }
    }
    out
}

/// Text for a migration plan.
#[must_use]
pub fn render_plan_text(path: &Path, plan: &MigrationPlan) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ({}): {} -> {}",
        path.display(),
        plan.kind,
        plan.from_version,
        plan.to_version
    );
    if plan.from_version == SchemaVersion::Current {
        out.push_str("  already current; nothing to migrate\n");
        return out;
    }
    for change in &plan.changes {
        let tag = match change.mode {
            ChangeMode::Automatic => "auto",
            ChangeMode::NeedsConfirmation => "confirm",
            ChangeMode::ManualOnly => "manual",
        };
        let _ = writeln!(out, "  [{tag}] {}: {}", change.id, change.description);
    }
    out
}

/// Text for an executed migration.
#[must_use]
pub fn render_outcome_text(outcome: &MigrationOutcome) -> String {
    let mut out = String::new();
    if !outcome.written() {
        let _ = writeln!(out, "{}: no changes applied", outcome.path.display());
    } else {
        let _ = writeln!(
            out,
            "{}: applied {} change(s): {}",
            outcome.path.display(),
            outcome.applied.len(),
            outcome.applied.join(", ")
        );
    }
    if let Some(backup) = &outcome.backup {
        let _ = writeln!(out, "  backup: {}", backup.display());
    }
    if !outcome.unapproved.is_empty() {
        let _ = writeln!(
            out,
            "  awaiting approval: {} (use --approve ID or --yes)",
            outcome.unapproved.join(", ")
        );
    }
    if !outcome.manual.is_empty() {
        let _ = writeln!(out, "  manual follow-up: {}", outcome.manual.join(", "));
    }
    let _ = writeln!(
        out,
        "  version: {} -> {}",
        outcome.from_version, outcome.to_version
    );
    let _ = writeln!(
        out,
        "  errors: {} -> {}, warnings: {} -> {}",
        outcome.before.errors.len(),
        outcome.after.errors.len(),
        outcome.before.warnings.len(),
        outcome.after.warnings.len()
    );
    let _ = writeln!(
        out,
        "  score: {}/{} -> {}/{}",
        outcome.score_before.total,
        outcome.score_before.max,
        outcome.score_after.total,
        outcome.score_after.max
    );
    out
}

/// Width at which compared values are cut.
const COMPARE_VALUE_WIDTH: usize = 24;

/// Side-by-side text for a comparison. The diff is not included.
#[must_use]
pub fn render_comparison_text(c: &Comparison) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ({}) vs {} ({})",
        c.labels.left, c.kinds.left, c.labels.right, c.kinds.right
    );

    let mut header = String::new();
    for row in &c.attributes {
        let marker = if row.differs() { '~' } else { '=' };
        let _ = writeln!(
            header,
            "  {marker} {:<18}{:<28}{}",
            row.key,
            cut(row.left.as_deref()),
            cut(row.right.as_deref())
        );
    }
    push_section(&mut out, "Header", &header);

    if c.kinds.left.is_markdown() || c.kinds.right.is_markdown() {
        let mut outline = String::new();
        for (label, headings) in [
            (&c.labels.left, &c.headings.left),
            (&c.labels.right, &c.headings.right),
        ] {
            let _ = writeln!(outline, "  {label}");
            if headings.is_empty() {
                outline.push_str("    (no headings)\n");
            }
            for h in headings {
                let indent = "  ".repeat(h.level);
                let _ = writeln!(outline, "  {indent}- {}", h.text);
            }
        }
        push_section(&mut out, "Structure", &outline);

        let mut metrics = String::new();
        let rows = c.metrics.left.rows().into_iter().zip(c.metrics.right.rows());
        for ((name, left), (_, right)) in rows {
            let _ = writeln!(metrics, "  {name:<16}{left:<8}{right:<8}{}", delta(left, right));
        }
        push_section(&mut out, "Metrics", &metrics);
    }

    if let Some(hooks) = &c.hooks {
        let mut counts = String::new();
        let events: std::collections::BTreeSet<&String> =
            hooks.left.events.keys().chain(hooks.right.events.keys()).collect();
        for event in events {
            let left = hooks.left.events.get(event).copied().unwrap_or(0);
            let right = hooks.right.events.get(event).copied().unwrap_or(0);
            let _ = writeln!(counts, "  {event:<20}{left:<8}{right:<8}{}", delta(left, right));
        }
        for (name, left, right) in [
            ("actions", hooks.left.actions, hooks.right.actions),
            ("command", hooks.left.command, hooks.right.command),
            ("prompt", hooks.left.prompt, hooks.right.prompt),
        ] {
            let _ = writeln!(counts, "  {name:<20}{left:<8}{right:<8}{}", delta(left, right));
        }
        push_section(&mut out, "Hooks", &counts);
    }

    let mut status = String::new();
    for (label, s, score) in [
        (&c.labels.left, c.status.left, c.scores.left),
        (&c.labels.right, c.status.right, c.scores.right),
    ] {
        let _ = writeln!(status, "  {label}: {}, score {score}", s.label());
    }
    push_section(&mut out, "Status", &status);

    if c.identical() {
        out.push_str("\nidentical\n");
    }
    out
}

fn cut(value: Option<&str>) -> String {
    match value {
        None => "(not set)".to_string(),
        Some(v) if v.chars().count() > COMPARE_VALUE_WIDTH => {
            let head: String = v.chars().take(COMPARE_VALUE_WIDTH - 3).collect();
            format!("{head}...")
        }
        Some(v) => v.to_string(),
    }
}

fn delta(left: usize, right: usize) -> String {
    match right.cmp(&left) {
        std::cmp::Ordering::Greater => format!("+{}", right - left),
        std::cmp::Ordering::Less => format!("-{}", left - right),
        std::cmp::Ordering::Equal => "same".to_string(),
    }
}
