//! Prompt layout and response parsing
//!
//! Records are listed by index in the user message. The model answers
//! with a JSON array whose element `i` belongs to record `i`:
//!
//! ```json
//! [{"work_description": "Installed heat pump", "service_keywords": ["heat pump"]}]
//! ```
//!
//! The array may sit inside a markdown code fence, be surrounded by
//! prose, or be wrapped in an object (JSON mode).

use serde::Deserialize;
use serde_json::Value;

use ledgersync_core::domain::{Enrichment, PendingInvoice};

pub const SYSTEM_PROMPT: &str = "You extract structured metadata from trade-services invoices. \
For each numbered invoice, write a one-sentence plain description of the work performed \
(work_description) and a short list of lowercase service keywords (service_keywords). \
Use only information present in the invoice text. If the text says nothing about the work, \
use an empty string and an empty list. Answer with a JSON array only, one object per invoice, \
in the same order as the input, each shaped as \
{\"work_description\": string, \"service_keywords\": [string]}.";

/// User message listing `records` by index
pub fn user_message(records: &[PendingInvoice]) -> String {
    let mut message = format!(
        "Extract metadata for these {} invoices. Reply with a JSON array of {} objects.\n",
        records.len(),
        records.len()
    );
    for (i, record) in records.iter().enumerate() {
        message.push_str(&format!("\n[{i}]"));
        if let Some(number) = record.invoice_number.as_deref() {
            message.push_str(&format!(" {number}"));
        }
        message.push('\n');
        let content = record.content();
        if content.is_empty() {
            message.push_str("(no line item text)\n");
        } else {
            for line in content.lines() {
                message.push_str(&format!("- {line}\n"));
            }
        }
    }
    message
}

const FENCE: &str = "```";

/// Keys a JSON-mode answer may wrap the array in, in order of preference
const ARRAY_KEYS: &[&str] = &["results", "invoices", "records", "items", "data"];

/// Cuts the JSON out of a model answer
///
/// Takes the body of the first markdown code fence wherever it appears,
/// then narrows to the outermost `[...]` or `{...}` span so prose around
/// the JSON is dropped.
pub fn extract_json(content: &str) -> &str {
    let body = fenced_body(content).unwrap_or(content);
    outermost_span(body).unwrap_or(body).trim()
}

fn fenced_body(content: &str) -> Option<&str> {
    let start = content.find(FENCE)? + FENCE.len();
    let rest = &content[start..];
    // Skip an info string such as "json", on its own line or inline
    let info_len = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-' || c == '_'))
        .unwrap_or(rest.len());
    let rest = match rest[info_len..].chars().next() {
        Some(c) if info_len > 0 && c.is_whitespace() => &rest[info_len..],
        _ => rest,
    };
    let end = rest.find(FENCE).unwrap_or(rest.len());
    Some(&rest[..end])
}

fn outermost_span(text: &str) -> Option<&str> {
    let open = text.find(|c| c == '[' || c == '{')?;
    let close = if text[open..].starts_with('[') { ']' } else { '}' };
    let end = text.rfind(close).filter(|&end| end > open)?;
    Some(&text[open..=end])
}

/// Picks the record array out of an object answer: a known key first,
/// otherwise the only array-valued field
fn array_field(mut map: serde_json::Map<String, Value>) -> Result<Vec<Value>, String> {
    for key in ARRAY_KEYS {
        if let Some(Value::Array(items)) = map.remove(*key) {
            return Ok(items);
        }
    }
    let mut arrays = map.into_iter().filter_map(|(_, v)| match v {
        Value::Array(items) => Some(items),
        _ => None,
    });
    match (arrays.next(), arrays.next()) {
        (Some(items), None) => Ok(items),
        (Some(_), Some(_)) => Err("object with several array fields".to_string()),
        (None, _) => Err("object without an array field".to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct RecordAnswer {
    #[serde(default)]
    work_description: Option<String>,
    #[serde(default)]
    service_keywords: Vec<String>,
}

/// Parses a model answer into one slot per expected record
///
/// Slot `i` is `None` when element `i` is missing or malformed; such
/// records stay pending. Elements beyond `expected` are ignored.
///
/// # Errors
/// Returns a message when the answer holds no JSON array at all.
pub fn parse_response(content: &str, expected: usize) -> Result<Vec<Option<Enrichment>>, String> {
    let value: Value =
        serde_json::from_str(extract_json(content)).map_err(|e| format!("invalid JSON: {e}"))?;

    let items = match value {
        Value::Array(items) => items,
        Value::Object(map) => array_field(map)?,
        other => return Err(format!("expected a JSON array, got {other}")),
    };

    let mut slots: Vec<Option<Enrichment>> = items
        .into_iter()
        .take(expected)
        .map(|item| {
            serde_json::from_value::<RecordAnswer>(item)
                .ok()
                .map(|a| Enrichment::new(a.work_description, a.service_keywords))
        })
        .collect();
    slots.resize(expected, None);
    Ok(slots)
}
