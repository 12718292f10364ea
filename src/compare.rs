//! Side-by-side comparison of two components.
//!
//! A [`Comparison`] lines up the headers attribute by attribute, the
//! heading outline and body metrics of markdown kinds, per-event action
//! counts of hook configurations, the validation status and score of each
//! side, and a unified diff of the rendered text.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use similar::TextDiff;

use crate::config::EngineConfig;
use crate::errors::Result;
use crate::hooks;
use crate::models::{AttributeValue, ComponentDocument, ComponentKind};
use crate::parser::render_document;
use crate::reporter::Status;
use crate::scorer;
use crate::validator;

static OUTLINE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^(#{1,3})\s+(.+)$").expect("outline regex must compile"));

static LIST_ITEM_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*[-*]\s+").expect("list item regex must compile"));

/// The same measurement taken on both documents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pair<T> {
    pub left: T,
    pub right: T,
}

impl<T> Pair<T> {
    fn measure(
        left: &ComponentDocument,
        right: &ComponentDocument,
        f: impl Fn(&ComponentDocument) -> T,
    ) -> Self {
        Self {
            left: f(left),
            right: f(right),
        }
    }
}

/// One header attribute on each side. `None` means not set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttributeComparison {
    pub key: String,
    pub left: Option<String>,
    pub right: Option<String>,
}

impl AttributeComparison {
    #[must_use]
    pub fn differs(&self) -> bool {
        self.left != self.right
    }
}

/// A `#`, `##` or `###` heading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Heading {
    pub level: usize,
    pub text: String,
}

/// Size and shape of a markdown body.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BodyMetrics {
    pub words: usize,
    pub headings: usize,
    pub code_blocks: usize,
    pub list_items: usize,
}

impl BodyMetrics {
    /// Metrics in display order.
    #[must_use]
    pub fn rows(&self) -> [(&'static str, usize); 4] {
        [
            ("words", self.words),
            ("headings", self.headings),
            ("code blocks", self.code_blocks),
            ("list items", self.list_items),
        ]
    }
}

/// Action counts of a hook configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HookCounts {
    /// Actions per event.
    pub events: BTreeMap<String, usize>,
    pub actions: usize,
    pub command: usize,
    pub prompt: usize,
}

/// Result of comparing two documents.
#[derive(Debug, Clone, Serialize)]
pub struct Comparison {
    pub labels: Pair<String>,
    pub kinds: Pair<ComponentKind>,
    /// Left attributes in header order, then those only on the right.
    pub attributes: Vec<AttributeComparison>,
    pub headings: Pair<Vec<Heading>>,
    pub metrics: Pair<BodyMetrics>,
    /// Present when either side is a hook configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hooks: Option<Pair<HookCounts>>,
    pub status: Pair<Status>,
    pub scores: Pair<u32>,
    /// Unified diff of the rendered text; empty when identical.
    pub diff: String,
}

impl Comparison {
    pub fn differing_attributes(&self) -> impl Iterator<Item = &AttributeComparison> {
        self.attributes.iter().filter(|a| a.differs())
    }

    #[must_use]
    pub fn identical(&self) -> bool {
        self.diff.is_empty()
    }
}

/// Compare two documents.
///
/// Each side is labelled with its source path, or `left` / `right` when it
/// has none.
pub fn compare(
    left: &ComponentDocument,
    right: &ComponentDocument,
    config: &EngineConfig,
) -> Result<Comparison> {
    let labels = Pair {
        left: label(left, "left"),
        right: label(right, "right"),
    };
    let before = render_document(left)?;
    let after = render_document(right)?;
    let diff = if before == after {
        String::new()
    } else {
        TextDiff::from_lines(&before, &after)
            .unified_diff()
            .context_radius(3)
            .header(&labels.left, &labels.right)
            .to_string()
    };
    let hooks = (left.kind == ComponentKind::Hook || right.kind == ComponentKind::Hook)
        .then(|| Pair::measure(left, right, hook_counts));

    Ok(Comparison {
        kinds: Pair::measure(left, right, |d| d.kind),
        attributes: compare_attributes(left, right),
        headings: Pair::measure(left, right, outline),
        metrics: Pair::measure(left, right, body_metrics),
        hooks,
        status: Pair::measure(left, right, |d| {
            Status::of(&validator::validate_with(d, config))
        }),
        scores: Pair::measure(left, right, |d| scorer::score_with(d, config).total),
        labels,
        diff,
    })
}

fn label(doc: &ComponentDocument, fallback: &str) -> String {
    doc.source_path
        .as_deref()
        .map_or_else(|| fallback.to_string(), |p| p.display().to_string())
}

fn compare_attributes(
    left: &ComponentDocument,
    right: &ComponentDocument,
) -> Vec<AttributeComparison> {
    let mut rows: Vec<AttributeComparison> = left
        .header
        .iter()
        .map(|(key, value)| AttributeComparison {
            key: key.to_string(),
            left: Some(display_value(value)),
            right: right.attribute(key).map(display_value),
        })
        .collect();
    rows.extend(
        right
            .header
            .iter()
            .filter(|(key, _)| !left.header.contains(key))
            .map(|(key, value)| AttributeComparison {
                key: key.to_string(),
                left: None,
                right: Some(display_value(value)),
            }),
    );
    rows
}

fn display_value(value: &AttributeValue) -> String {
    match value {
        AttributeValue::Scalar(s) => s.trim().to_string(),
        AttributeValue::List(items) => format!("[{}]", items.join(", ")),
        AttributeValue::Unknown(raw) => serde_yaml_ng::to_string(raw)
            .map(|s| s.trim().to_string())
            .unwrap_or_else(|_| "(unrepresentable)".to_string()),
    }
}

fn outline(doc: &ComponentDocument) -> Vec<Heading> {
    if !doc.kind.is_markdown() {
        return Vec::new();
    }
    OUTLINE_RE
        .captures_iter(&doc.body)
        .map(|c| Heading {
            level: c[1].len(),
            text: c[2].trim().to_string(),
        })
        .collect()
}

fn body_metrics(doc: &ComponentDocument) -> BodyMetrics {
    if !doc.kind.is_markdown() {
        return BodyMetrics::default();
    }
    let fences = doc
        .body
        .lines()
        .filter(|l| l.trim_start().starts_with("```"))
        .count();
    BodyMetrics {
        words: doc.body.split_whitespace().count(),
        headings: OUTLINE_RE.find_iter(&doc.body).count(),
        code_blocks: fences / 2,
        list_items: LIST_ITEM_RE.find_iter(&doc.body).count(),
    }
}

fn hook_counts(doc: &ComponentDocument) -> HookCounts {
    let mut counts = HookCounts::default();
    if doc.kind != ComponentKind::Hook {
        return counts;
    }
    let Ok(config) = hooks::parse_config(&doc.body) else {
        return counts;
    };
    for (event, entries) in &config.events {
        let actions: usize = entries
            .iter()
            .map(|e| e.hooks.as_ref().map_or(0, Vec::len))
            .sum();
        *counts.events.entry(event.clone()).or_default() += actions;
    }
    for (_, _, action) in config.actions() {
        counts.actions += 1;
        match action.hook_type.as_deref() {
            Some("command") => counts.command += 1,
            Some("prompt") => counts.prompt += 1,
            _ => {}
        }
    }
    counts
}
