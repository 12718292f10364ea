//! Hook configuration (`hooks.json`) model and validation.

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::diagnostics::{
    Diagnostic, HOOK_LEGACY_LAYOUT, HOOK_MATCHER_INVALID, HOOK_MISSING_ACTIONS,
    HOOK_MISSING_MATCHER, HOOK_MISSING_PAYLOAD, HOOK_PROMPT_EVENT, HOOK_STRUCTURE, HOOK_TIMEOUT,
    HOOK_TYPE, HOOK_UNEXPECTED_MATCHER, HOOK_UNKNOWN_EVENT, HOOK_WILDCARD_MATCHER,
};

/// Events fired around a tool call; these take a matcher.
pub const TOOL_EVENTS: &[&str] = &["PreToolUse", "PostToolUse"];

/// Session lifecycle events; these take no matcher.
pub const LIFECYCLE_EVENTS: &[&str] = &[
    "UserPromptSubmit",
    "Stop",
    "SubagentStop",
    "SessionStart",
    "SessionEnd",
    "Notification",
    "PreCompact",
];

/// Valid hook types.
pub const VALID_HOOK_TYPES: &[&str] = &["command", "prompt"];

/// Events where prompt hooks are most useful.
const OPTIMAL_PROMPT_EVENTS: &[&str] = &["Stop", "SubagentStop", "UserPromptSubmit", "PreToolUse"];

/// Top-level keys that document a configuration rather than declare events.
const DOC_KEYS: &[&str] = &["_comment", "description"];

/// Recommended timeout range in seconds.
const TIMEOUT_RANGE: std::ops::RangeInclusive<f64> = 5.0..=600.0;

/// One alternative of a concrete matcher: a tool identifier, optionally
/// ending in a wildcard (`mcp__.*`).
static MATCHER_ALT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9_]+(?:\.\*|\*)?$").expect("matcher alternative regex must compile")
});

#[must_use]
pub fn is_known_event(event: &str) -> bool {
    TOOL_EVENTS.contains(&event) || LIFECYCLE_EVENTS.contains(&event)
}

#[must_use]
pub fn is_tool_event(event: &str) -> bool {
    TOOL_EVENTS.contains(&event)
}

#[must_use]
pub fn is_lifecycle_event(event: &str) -> bool {
    LIFECYCLE_EVENTS.contains(&event)
}

/// A single hook action within an event entry.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HookAction {
    /// Hook type: `command` or `prompt`.
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub hook_type: Option<String>,
    /// Shell command to execute (for `command` hooks).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Prompt text to inject (for `prompt` hooks).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    /// Timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<f64>,
}

impl HookAction {
    /// The action's payload: the command for command hooks, the prompt
    /// otherwise.
    #[must_use]
    pub fn payload(&self) -> Option<&str> {
        match self.hook_type.as_deref() {
            Some("prompt") => self.prompt.as_deref(),
            _ => self.command.as_deref().or(self.prompt.as_deref()),
        }
    }
}

/// An event entry: an optional matcher and its actions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HookEntry {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub matcher: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hooks: Option<Vec<HookAction>>,
}

/// Typed view of a hook configuration document.
#[derive(Debug, Clone, PartialEq)]
pub struct HookConfig {
    /// `true` when events sit under a top-level `hooks` object.
    pub wrapped: bool,
    /// Top-level `_comment` or `description` text.
    pub documentation: Option<String>,
    /// Events in file order.
    pub events: Vec<(String, Vec<HookEntry>)>,
}

impl HookConfig {
    /// Every `(event, entry, action)` triple in file order.
    pub fn actions(&self) -> impl Iterator<Item = (&str, &HookEntry, &HookAction)> {
        self.events.iter().flat_map(|(event, entries)| {
            entries.iter().flat_map(move |entry| {
                entry
                    .hooks
                    .iter()
                    .flatten()
                    .map(move |action| (event.as_str(), entry, action))
            })
        })
    }

    /// Every `(event, entry)` pair in file order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &HookEntry)> {
        self.events
            .iter()
            .flat_map(|(event, entries)| entries.iter().map(move |e| (event.as_str(), e)))
    }
}

/// Locate the event map inside a parsed configuration.
///
/// Returns the map and whether it was wrapped under `hooks`. Documentation
/// keys and `_`-prefixed keys of a legacy bare map are not events.
pub fn event_map(root: &Value) -> Result<(Map<String, Value>, bool), String> {
    let Value::Object(root) = root else {
        return Err("hook configuration must be a JSON object".into());
    };
    match root.get("hooks") {
        Some(Value::Object(events)) => Ok((events.clone(), true)),
        Some(_) => Err("`hooks` must be an object mapping events to entry arrays".into()),
        None => {
            let events = root
                .iter()
                .filter(|(k, _)| !DOC_KEYS.contains(&k.as_str()) && !k.starts_with('_'))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            Ok((events, false))
        }
    }
}

/// Build the typed view from configuration text.
///
/// The error string describes the first structural problem found.
pub fn parse_config(text: &str) -> Result<HookConfig, String> {
    let root: Value = serde_json::from_str(text).map_err(|e| format!("invalid JSON: {e}"))?;
    let (events, wrapped) = event_map(&root)?;
    let documentation = DOC_KEYS
        .iter()
        .find_map(|k| root.get(*k).and_then(Value::as_str))
        .map(str::to_string);

    let mut parsed = Vec::with_capacity(events.len());
    for (event, entries) in events {
        let entries: Vec<HookEntry> = serde_json::from_value(entries)
            .map_err(|e| format!("invalid entries for \"{event}\": {e}"))?;
        parsed.push((event, entries));
    }
    Ok(HookConfig {
        wrapped,
        documentation,
        events: parsed,
    })
}

/// Validate a hook configuration.
///
/// Never panics: structural problems are reported as `hook-structure`
/// diagnostics.
#[must_use]
pub fn validate_hooks(text: &str) -> Vec<Diagnostic> {
    let mut diags = Vec::new();

    let config = match parse_config(text) {
        Ok(c) => c,
        Err(message) => {
            diags.push(Diagnostic::error(HOOK_STRUCTURE, message));
            return diags;
        }
    };

    if !config.wrapped {
        diags.push(
            Diagnostic::warning(
                HOOK_LEGACY_LAYOUT,
                "events are not wrapped under a top-level `hooks` key",
            )
            .with_suggestion("Run `compaudit migrate --apply` to wrap the event map"),
        );
    }

    for (event, entries) in &config.events {
        if !is_known_event(event) {
            diags.push(
                Diagnostic::error(HOOK_UNKNOWN_EVENT, format!("unknown event name: \"{event}\""))
                    .with_field(event.clone())
                    .with_suggestion(format!(
                        "Valid events: {}, {}",
                        TOOL_EVENTS.join(", "),
                        LIFECYCLE_EVENTS.join(", ")
                    )),
            );
        }

        for entry in entries {
            check_entry_matcher(event, entry, &mut diags);

            let Some(actions) = &entry.hooks else {
                diags.push(Diagnostic::error(
                    HOOK_MISSING_ACTIONS,
                    format!("hook entry for \"{event}\" missing `hooks` array"),
                ));
                continue;
            };
            if actions.is_empty() {
                diags.push(Diagnostic::warning(
                    HOOK_MISSING_ACTIONS,
                    format!("hook entry for \"{event}\" has no actions"),
                ));
            }
            for action in actions {
                check_action(event, action, &mut diags);
            }
        }
    }

    diags
}

fn check_entry_matcher(event: &str, entry: &HookEntry, diags: &mut Vec<Diagnostic>) {
    if is_tool_event(event) {
        match entry.matcher.as_deref() {
            None => diags.push(
                Diagnostic::error(
                    HOOK_MISSING_MATCHER,
                    format!("\"{event}\" entry has no matcher"),
                )
                .with_field("matcher")
                .with_suggestion("Name the tools to intercept, e.g. \"Write|Edit\""),
            ),
            Some(m) => diags.extend(check_matcher(m)),
        }
    } else if is_lifecycle_event(event) {
        if let Some(m) = &entry.matcher {
            let message = if m.trim().is_empty() {
                format!("empty matcher on \"{event}\" has no effect")
            } else {
                format!("\"{event}\" does not use a matcher; \"{m}\" is ignored")
            };
            diags.push(
                Diagnostic::warning(HOOK_UNEXPECTED_MATCHER, message)
                    .with_field("matcher")
                    .with_suggestion("Remove the matcher"),
            );
        }
    }
}

/// Check a tool-event matcher.
///
/// A matcher must name concrete tools as a regex alternation of
/// identifiers. The catch-all wildcard is accepted with a warning.
#[must_use]
pub fn check_matcher(matcher: &str) -> Option<Diagnostic> {
    let m = matcher.trim();
    if m.is_empty() {
        return Some(
            Diagnostic::error(HOOK_MATCHER_INVALID, "empty matcher on tool event")
                .with_field("matcher"),
        );
    }
    if is_wildcard(m) {
        return Some(
            Diagnostic::warning(
                HOOK_WILDCARD_MATCHER,
                format!("matcher \"{m}\" intercepts every tool"),
            )
            .with_field("matcher")
            .with_suggestion("Name the tools to intercept, e.g. \"Write|Edit\""),
        );
    }
    if m.contains("\\|") {
        return Some(
            Diagnostic::warning(
                HOOK_MATCHER_INVALID,
                format!("matcher \"{m}\" escapes `|` and matches a literal pipe"),
            )
            .with_field("matcher")
            .with_suggestion("Use an unescaped `|` to separate tool names"),
        );
    }
    if let Err(e) = Regex::new(m) {
        return Some(
            Diagnostic::error(
                HOOK_MATCHER_INVALID,
                format!("matcher \"{m}\" is not a valid pattern: {e}"),
            )
            .with_field("matcher"),
        );
    }
    if !m.split('|').all(|alt| MATCHER_ALT_RE.is_match(alt.trim())) {
        return Some(
            Diagnostic::warning(
                HOOK_MATCHER_INVALID,
                format!("matcher \"{m}\" does not name concrete tools"),
            )
            .with_field("matcher")
            .with_suggestion("Use an alternation of tool names, e.g. \"Write|Edit|mcp__.*\""),
        );
    }
    None
}

/// Returns `true` for the catch-all matchers `*` and `.*`.
#[must_use]
pub fn is_wildcard(matcher: &str) -> bool {
    matches!(matcher.trim(), "*" | ".*")
}

fn check_action(event: &str, action: &HookAction, diags: &mut Vec<Diagnostic>) {
    let hook_type = match action.hook_type.as_deref() {
        Some(t) if VALID_HOOK_TYPES.contains(&t) => t,
        Some(t) => {
            diags.push(
                Diagnostic::error(HOOK_TYPE, format!("unknown hook type: \"{t}\""))
                    .with_field("type")
                    .with_suggestion("Valid types: command, prompt"),
            );
            return;
        }
        None => {
            diags.push(
                Diagnostic::error(HOOK_TYPE, format!("hook in \"{event}\" missing `type` field"))
                    .with_field("type"),
            );
            return;
        }
    };

    let payload = match hook_type {
        "command" => action.command.as_deref(),
        _ => action.prompt.as_deref(),
    };
    if payload.is_none_or(|p| p.trim().is_empty()) {
        diags.push(
            Diagnostic::error(
                HOOK_MISSING_PAYLOAD,
                format!("{hook_type} hook in \"{event}\" missing `{hook_type}` field"),
            )
            .with_field(hook_type),
        );
    }

    if let Some(timeout) = action.timeout {
        if !TIMEOUT_RANGE.contains(&timeout) {
            diags.push(
                Diagnostic::warning(
                    HOOK_TIMEOUT,
                    format!("timeout {timeout}s is outside recommended range (5-600s)"),
                )
                .with_field("timeout")
                .with_suggestion("Use a timeout between 5 and 600 seconds"),
            );
        }
    }

    if hook_type == "prompt" && !OPTIMAL_PROMPT_EVENTS.contains(&event) {
        diags.push(Diagnostic::info(
            HOOK_PROMPT_EVENT,
            format!(
                "prompt hook on \"{event}\"; prompt hooks work best on {}",
                OPTIMAL_PROMPT_EVENTS.join(", ")
            ),
        ));
    }
}
