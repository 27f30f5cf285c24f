//! JSON lines output formatter.

use crate::event::Event;
use crate::output::OutputFormatter;

/// Serializes each event as a single-line JSON object tagged with `kind`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonFormatter;

impl OutputFormatter for JsonFormatter {
    fn format(&self, event: &Event) -> String {
        serde_json::to_string(event).unwrap_or_else(|e| {
            serde_json::json!({
                "kind": "error",
                "unique_id": event.unique_id(),
                "message": e.to_string(),
            })
            .to_string()
        })
    }
}
