//! Mapping of OSF error documents onto [`OsfError`].

use crate::error::OsfError;
use serde_json::Value;

/// Build a [`OsfError::RemoteError`] from a non-2xx status and its body.
pub(crate) fn remote_error(status: u16, body: &str) -> OsfError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|doc| error_message(&doc))
        .unwrap_or_else(|| default_message(status));

    OsfError::RemoteError { status, message }
}

/// Extract a human-readable message from an error document.
///
/// The API answers with JSON:API `{"errors": [{"detail": ..}]}`, WaterButler
/// with `{"code": .., "message": ..}` and the accounts server with
/// `{"error": .., "error_description": ..}`.
pub fn error_message(doc: &Value) -> Option<String> {
    if let Some(errors) = doc.get("errors").and_then(|v| v.as_array()) {
        let details: Vec<&str> = errors
            .iter()
            .filter_map(|e| {
                e.get("detail")
                    .or_else(|| e.get("title"))
                    .and_then(|v| v.as_str())
            })
            .collect();
        if !details.is_empty() {
            return Some(details.join("; "));
        }
    }

    if let Some(message) = doc.get("message").and_then(|v| v.as_str()) {
        return Some(message.to_string());
    }

    doc.get("error_description")
        .or_else(|| doc.get("error"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

fn default_message(status: u16) -> String {
    reqwest::StatusCode::from_u16(status)
        .ok()
        .and_then(|s| s.canonical_reason())
        .unwrap_or("Unknown error")
        .to_string()
}
