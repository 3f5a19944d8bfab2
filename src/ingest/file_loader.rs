use crate::error::IngestError;
use crate::events::Event;
use log::{info, warn};
use serde_json::Value;
use std::path::Path;

/// Load a JSON array of events from disk
///
/// A missing file is not an error: the dashboard simply starts empty. Entries
/// that are not event objects, or that carry no `event_id`, are skipped with a
/// warning so one bad record does not hide the rest of the file.
///
/// # Errors
///
/// Returns `IngestError::IoError` if the file exists but cannot be read,
/// `IngestError::JsonError` if it is not valid JSON and
/// `IngestError::ParseError` if the document is not an array.
pub fn load_events_file(path: &Path) -> Result<Vec<Event>, IngestError> {
    if !path.exists() {
        warn!(
            "Events file {} not found, starting with no events",
            path.display()
        );
        return Ok(Vec::new());
    }

    let contents = std::fs::read_to_string(path)?;
    let events = parse_events_document(&contents)?;
    info!("Loaded {} events from {}", events.len(), path.display());
    Ok(events)
}

/// Parse the contents of an events file, see [`load_events_file`]
pub fn parse_events_document(contents: &str) -> Result<Vec<Event>, IngestError> {
    let document: Value = serde_json::from_str(contents)?;
    let entries = match document {
        Value::Array(entries) => entries,
        other => {
            return Err(IngestError::ParseError(format!(
                "expected a JSON array of events, found {}",
                json_kind(&other)
            )))
        }
    };

    let mut events = Vec::with_capacity(entries.len());
    for (index, entry) in entries.into_iter().enumerate() {
        match Event::from_value(entry) {
            Ok(event) if event.event_id.trim().is_empty() => {
                warn!("Skipping event #{}: missing event_id", index);
            }
            Ok(event) => events.push(event),
            Err(e) => warn!("Skipping malformed event #{}: {}", index, e),
        }
    }
    Ok(events)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
