//! Component document parsing and rendering.
//!
//! Markdown components carry a YAML header between `---` delimiter lines
//! followed by a free-form body. Hook configurations are whole-file JSON.

use std::path::Path;

use serde_yaml_ng::{Mapping, Value};
use tracing::debug;

use crate::errors::{CompauditError, Result};
use crate::models::{AttributeValue, ComponentDocument, ComponentKind, Header};

/// Maximum file size accepted by [`read_document`] (1 MiB).
pub const MAX_FILE_SIZE: u64 = 1024 * 1024;

const DELIMITER: &str = "---";

/// Parse component text into a document.
///
/// A text whose first line is not `---` has no header and is all body.
/// An opening delimiter without a closing one is a parse error pointing at
/// line 1. YAML errors point at the offending line of the file.
pub fn parse_document(text: &str, kind: ComponentKind) -> Result<ComponentDocument> {
    let text = normalize_newlines(text);
    if kind == ComponentKind::Hook {
        return parse_hook_document(&text);
    }

    let Some((header_text, body)) = split_header(&text)? else {
        return Ok(ComponentDocument::new(kind, None, text));
    };
    let header = parse_header(header_text)?;
    Ok(ComponentDocument::new(kind, Some(header), body))
}

/// Read and parse a component file.
///
/// When `kind` is `None` it is inferred from the path, falling back to
/// [`ComponentKind::Agent`].
pub fn read_document(path: &Path, kind: Option<ComponentKind>) -> Result<ComponentDocument> {
    let kind = kind
        .or_else(|| ComponentKind::infer(path))
        .unwrap_or(ComponentKind::Agent);
    let text = read_file_checked(path)?;
    debug!(path = %path.display(), %kind, "parsing component");
    Ok(parse_document(&text, kind)?.with_source_path(path))
}

/// Read a file, rejecting anything larger than [`MAX_FILE_SIZE`].
pub fn read_file_checked(path: &Path) -> Result<String> {
    let meta = std::fs::metadata(path)?;
    if meta.len() > MAX_FILE_SIZE {
        return Err(CompauditError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!(
                "file too large: {} bytes (limit {MAX_FILE_SIZE})",
                meta.len()
            ),
        )));
    }
    Ok(std::fs::read_to_string(path)?)
}

/// Serialize a document back to file text.
///
/// Attributes are written in header order. Documents without a header, and
/// hook configurations, render as their body alone.
pub fn render_document(doc: &ComponentDocument) -> Result<String> {
    if doc.kind == ComponentKind::Hook || !doc.has_header {
        return Ok(doc.body.clone());
    }
    let mut out = String::from("---\n");
    if !doc.header.is_empty() {
        let mut map = Mapping::new();
        for (key, value) in doc.header.iter() {
            map.insert(Value::String(key.to_string()), value.to_yaml());
        }
        out.push_str(&serde_yaml_ng::to_string(&map)?);
    }
    out.push_str("---\n");
    out.push_str(&doc.body);
    Ok(out)
}

fn normalize_newlines(text: &str) -> String {
    text.replace("\r\n", "\n")
}

/// Split `text` into `(header, body)`. Returns `None` when there is no
/// opening delimiter.
fn split_header(text: &str) -> Result<Option<(&str, String)>> {
    let Some(rest) = text
        .strip_prefix(DELIMITER)
        .and_then(|r| r.strip_prefix('\n').or(r.is_empty().then_some(r)))
    else {
        return Ok(None);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches('\n') == DELIMITER {
            let header = &rest[..offset];
            let body = rest[offset + line.len()..].to_string();
            return Ok(Some((header, body)));
        }
        offset += line.len();
    }
    Err(CompauditError::parse(
        1,
        "unterminated header: missing closing `---`",
    ))
}

fn parse_header(header_text: &str) -> Result<Header> {
    if header_text.trim().is_empty() {
        return Ok(Header::new());
    }
    let value: Value = serde_yaml_ng::from_str(header_text).map_err(|e| {
        // Header line 1 is file line 2.
        let line = e.location().map_or(2, |loc| loc.line() + 1);
        CompauditError::parse(line, format!("invalid YAML header: {e}"))
    })?;

    let mapping = match value {
        Value::Mapping(m) => m,
        Value::Null => return Ok(Header::new()),
        _ => return Err(CompauditError::parse(2, "header must be a YAML mapping")),
    };

    let mut header = Header::new();
    for (key, value) in mapping {
        let key = match key {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => return Err(CompauditError::parse(2, "header keys must be strings")),
        };
        header.insert(key, AttributeValue::from_yaml(value));
    }
    Ok(header)
}

fn parse_hook_document(text: &str) -> Result<ComponentDocument> {
    let value: serde_json::Value = serde_json::from_str(text)
        .map_err(|e| CompauditError::parse(e.line().max(1), format!("invalid JSON: {e}")))?;
    let wrapped = value
        .get("hooks")
        .is_some_and(serde_json::Value::is_object);
    let mut doc = ComponentDocument::new(ComponentKind::Hook, None, text);
    doc.has_header = wrapped;
    Ok(doc)
}
