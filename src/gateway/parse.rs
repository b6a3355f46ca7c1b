//! Recovery of structured meeting minutes from free-form summarizer output.
//!
//! Chat models wrap their JSON in markdown fences, lead-in prose or trailing
//! remarks. [`extract_summary`] scans the whole response for the first JSON
//! object carrying a non-empty `summary` and never panics on malformed input.

use serde_json::{Map, Value};
use thiserror::Error;

use super::MeetingSummary;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SummaryParseError {
    #[error("summarizer response is empty")]
    Empty,

    #[error("no JSON object found in summarizer response ({length} chars)")]
    NoPayload { length: usize },

    #[error("summarizer response has no object with a non-empty \"summary\" field ({objects} object(s) inspected)")]
    MissingSummary { objects: usize },
}

pub fn extract_summary(raw: &str) -> Result<MeetingSummary, SummaryParseError> {
    if raw.trim().is_empty() {
        return Err(SummaryParseError::Empty);
    }

    let mut objects = 0;
    for (start, _) in raw.char_indices().filter(|(_, c)| *c == '{') {
        let mut stream = serde_json::Deserializer::from_str(&raw[start..]).into_iter::<Value>();
        if let Some(Ok(Value::Object(map))) = stream.next() {
            objects += 1;
            if let Some(summary) = summary_from_object(&map) {
                return Ok(summary);
            }
        }
    }

    if objects == 0 {
        Err(SummaryParseError::NoPayload { length: raw.len() })
    } else {
        Err(SummaryParseError::MissingSummary { objects })
    }
}

fn summary_from_object(map: &Map<String, Value>) -> Option<MeetingSummary> {
    let summary = map.get("summary")?.as_str()?.trim();
    if summary.is_empty() {
        return None;
    }

    let mut participants = Vec::new();
    for name in string_list(map.get("participants")) {
        if !participants.contains(&name) {
            participants.push(name);
        }
    }

    Some(MeetingSummary {
        summary: summary.to_string(),
        key_points: string_list(map.get("key_points")),
        action_items: string_list(map.get("action_items")),
        participants,
        meeting_duration: map.get("meeting_duration").and_then(scalar_text),
    })
}

/// Lists may hold plain strings or small objects (`{"task": .., "owner": ..}`);
/// a bare string stands for a one-item list.
fn string_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(item_text).collect(),
        Some(other) => item_text(other).into_iter().collect(),
        None => Vec::new(),
    }
}

fn item_text(value: &Value) -> Option<String> {
    match value {
        Value::Object(fields) => {
            let parts: Vec<String> = fields.values().filter_map(scalar_text).collect();
            if parts.is_empty() {
                None
            } else {
                Some(parts.join(" - "))
            }
        }
        other => scalar_text(other),
    }
}

fn scalar_text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    if text.is_empty() {
        None
    } else {
        Some(text)
    }
}
