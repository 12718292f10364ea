use serde::Serialize;
use tracing::debug;

use crate::config::EngineConfig;
use crate::diagnostics::{
    Diagnostic, Severity, BODY_EMPTY, BODY_TOO_LONG, MISSING_REQUIRED, MODEL_SHORT_ALIAS,
    UNKNOWN_ATTRIBUTE, WRONG_SHAPE,
};
use crate::hooks;
use crate::models::{ComponentDocument, ComponentKind, Header};
use crate::schema::{self, Presence};

/// Outcome of validating one document.
///
/// Only `errors` block: warnings and notes never affect [`passed`].
///
/// [`passed`]: ValidationResult::passed
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationResult {
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Diagnostic>,
    pub notes: Vec<Diagnostic>,
}

impl ValidationResult {
    /// Partition diagnostics by severity, keeping their order.
    #[must_use]
    pub fn from_diagnostics(diags: impl IntoIterator<Item = Diagnostic>) -> Self {
        let mut result = Self::default();
        for d in diags {
            match d.severity {
                Severity::Error => result.errors.push(d),
                Severity::Warning => result.warnings.push(d),
                Severity::Info => result.notes.push(d),
            }
        }
        result
    }

    #[must_use]
    pub fn passed(&self) -> bool {
        self.errors.is_empty()
    }

    /// All diagnostics: errors, then warnings, then notes.
    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.errors
            .iter()
            .chain(&self.warnings)
            .chain(&self.notes)
    }

    /// Returns `true` when an error or warning mentions `attribute`.
    #[must_use]
    pub fn mentions(&self, attribute: &str) -> bool {
        self.errors
            .iter()
            .chain(&self.warnings)
            .any(|d| d.field.as_deref() == Some(attribute))
    }
}

/// Validate a document against the default engine options.
#[must_use]
pub fn validate(doc: &ComponentDocument) -> ValidationResult {
    validate_with(doc, &EngineConfig::default())
}

/// Validate a document.
///
/// Pure: the same document always yields the same result, and documents
/// may be validated from many threads at once.
#[must_use]
pub fn validate_with(doc: &ComponentDocument, config: &EngineConfig) -> ValidationResult {
    let diags = match doc.kind {
        ComponentKind::Hook => hooks::validate_hooks(&doc.body),
        kind => {
            let mut diags = validate_header(kind, &doc.header);
            suggest_configured_alias(&mut diags, &doc.header, config);
            diags.extend(validate_body(doc, config.max_body_lines));
            diags
        }
    };
    let result = ValidationResult::from_diagnostics(diags);
    debug!(
        kind = %doc.kind,
        errors = result.errors.len(),
        warnings = result.warnings.len(),
        "validated document"
    );
    result
}

/// Check a header against every rule registered for `kind`.
#[must_use]
pub fn validate_header(kind: ComponentKind, header: &Header) -> Vec<Diagnostic> {
    let mut diags = Vec::new();
    let rules = schema::rules_for(kind);

    for rule in &rules {
        let Some(value) = header.get(rule.attribute) else {
            if rule.required() {
                diags.push(
                    Diagnostic::error(
                        MISSING_REQUIRED,
                        format!("missing required attribute `{}`", rule.attribute),
                    )
                    .with_field(rule.attribute),
                );
            }
            continue;
        };

        if rule.presence == Presence::Forbidden {
            diags.extend((rule.check)(value));
            continue;
        }

        if !rule.allowed_shapes.contains(&value.shape()) {
            let expected = rule
                .allowed_shapes
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(" or ");
            diags.push(
                Diagnostic::error(
                    WRONG_SHAPE,
                    format!(
                        "`{}` must be a {expected}, found {}",
                        rule.attribute,
                        value.shape()
                    ),
                )
                .with_field(rule.attribute),
            );
            continue;
        }

        diags.extend((rule.check)(value));
    }

    for (key, _) in header.iter() {
        if !rules.iter().any(|r| r.attribute == key) {
            diags.push(
                Diagnostic::warning(UNKNOWN_ATTRIBUTE, format!("unknown attribute `{key}`"))
                    .with_field(key),
            );
        }
    }

    diags
}

/// Point short-alias errors at the alias the planner would write.
fn suggest_configured_alias(diags: &mut [Diagnostic], header: &Header, config: &EngineConfig) {
    let Some(model) = header.get("model").and_then(|v| v.as_scalar()) else {
        return;
    };
    let Some(alias) = config.version_alias(model.trim()) else {
        return;
    };
    for d in diags.iter_mut().filter(|d| d.code == MODEL_SHORT_ALIAS) {
        d.suggestion = Some(format!("Use: '{alias}'"));
    }
}

fn validate_body(doc: &ComponentDocument, max_lines: usize) -> Vec<Diagnostic> {
    let mut diags = Vec::new();
    let line_count = doc.body.lines().count();
    if line_count > max_lines {
        diags.push(
            Diagnostic::warning(
                BODY_TOO_LONG,
                format!("body exceeds {max_lines} lines ({line_count} lines)"),
            )
            .with_field("body"),
        );
    }
    if doc.kind == ComponentKind::Command && doc.body.trim().is_empty() {
        diags.push(
            Diagnostic::warning(BODY_EMPTY, "command body is empty").with_field("body"),
        );
    }
    diags
}
