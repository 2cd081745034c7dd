//! `POST /tasks/twilio/inbound` (§6.3).
//!
//! Accepts JSON or form-urlencoded bodies and recognizes `From`,
//! `ConversationSid`, `Author` case-insensitively. Routes to the flex sink
//! when a conversation sid is present, otherwise to the internal sink when a
//! `From` is present. Always answers `200 OK` with an empty TwiML response,
//! regardless of what the sink did internally (§7 "no error reaches the
//! provider's webhook").

use std::collections::HashMap;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::response::IntoResponse;

use crate::AppState;

const EMPTY_TWIML: &str = "<Response></Response>";

pub async fn inbound(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let fields = parse_fields(&headers, &body);
    let conversation_sid = fields.get("conversationsid").map(String::as_str);
    let author = fields.get("author").map(String::as_str);

    if let Some(conversation_sid) = conversation_sid {
        state.activity.mark_by_conversation_sid(conversation_sid, author).await;
    } else if let Some(from) = fields.get("from") {
        state.activity.mark_by_contact(from).await;
    }

    ([(header::CONTENT_TYPE, "text/xml")], EMPTY_TWIML)
}

/// Lowercases every recognized key so callers can send `From`, `from`, or
/// `FROM` interchangeably, matching the "case-insensitive first letter"
/// field recognition in §6.3.
fn parse_fields(headers: &HeaderMap, body: &Bytes) -> HashMap<String, String> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("application/json"));

    let mut fields = HashMap::new();
    if is_json {
        if let Ok(serde_json::Value::Object(obj)) = serde_json::from_slice(body) {
            for (key, value) in obj {
                if let Some(s) = value.as_str() {
                    fields.insert(key.to_ascii_lowercase(), s.to_string());
                }
            }
        }
    } else if let Ok(pairs) = serde_urlencoded::from_bytes::<Vec<(String, String)>>(body) {
        for (key, value) in pairs {
            fields.insert(key.to_ascii_lowercase(), value);
        }
    }
    fields
}
