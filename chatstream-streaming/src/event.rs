//! Event interpretation.
//!
//! Classifies one frame into a [`StreamEvent`]. This is a pure function of
//! the frame text and never fails: payloads that are not JSON degrade to
//! [`StreamEvent::RawFallback`], and JSON events with an unknown `type` are
//! ignored.

use serde::Deserialize;
use serde_json::Value;
use tracing::trace;

/// Field prefix of the payload line.
pub const DATA_PREFIX: &str = "data:";

/// Payload that ends the stream out-of-band.
pub const DONE_SENTINEL: &str = "[DONE]";

/// Message used when an error event carries none.
pub const DEFAULT_ERROR_MESSAGE: &str = "stream error";

/// A classified stream event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// An increment of assistant text.
    IncrementalText(String),
    /// The server finished the reply.
    Terminal,
    /// The server reported an error.
    Failure(String),
    /// A non-JSON payload, treated as literal text.
    RawFallback(String),
}

impl StreamEvent {
    /// Text to deliver to the caller, for the variants that carry a delta.
    #[must_use]
    pub fn delta_text(&self) -> Option<&str> {
        match self {
            StreamEvent::IncrementalText(text) | StreamEvent::RawFallback(text) => Some(text),
            StreamEvent::Terminal | StreamEvent::Failure(_) => None,
        }
    }

    /// Whether reading should stop after this event.
    #[must_use]
    pub fn ends_stream(&self) -> bool {
        matches!(self, StreamEvent::Terminal | StreamEvent::Failure(_))
    }
}

/// Closed set of structured events, keyed on `type`.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum WireEvent {
    #[serde(alias = "chunk")]
    Delta {
        #[serde(default, alias = "content", alias = "text")]
        value: Option<Value>,
    },
    Done,
    Error {
        #[serde(default, alias = "error")]
        message: Option<Value>,
    },
    #[serde(other)]
    Unknown,
}

/// Extract the payload of the first `data:` line in a frame.
///
/// The prefix and surrounding whitespace are stripped. Comment lines and
/// other fields (`event:`, `id:`, `retry:`) are skipped.
#[must_use]
pub fn extract_payload(frame: &str) -> Option<&str> {
    frame
        .lines()
        .find_map(|line| line.trim_start().strip_prefix(DATA_PREFIX))
        .map(str::trim)
}

/// Classify one frame.
///
/// Returns `None` for frames that carry no event: no `data:` line, an empty
/// payload, JSON that is not an object, or an unrecognized `type`.
#[must_use]
pub fn interpret(frame: &str) -> Option<StreamEvent> {
    let payload = extract_payload(frame)?;
    if payload.is_empty() {
        return None;
    }

    if payload == DONE_SENTINEL {
        return Some(StreamEvent::Terminal);
    }

    let value: Value = match serde_json::from_str(payload) {
        Ok(value) => value,
        Err(_) => return Some(StreamEvent::RawFallback(payload.to_owned())),
    };

    if !value.is_object() {
        trace!(payload, "Ignoring non-object JSON payload");
        return None;
    }

    match serde_json::from_value::<WireEvent>(value) {
        Ok(WireEvent::Delta { value }) => value_text(value).map(StreamEvent::IncrementalText),
        Ok(WireEvent::Done) => Some(StreamEvent::Terminal),
        Ok(WireEvent::Error { message }) => Some(StreamEvent::Failure(
            value_text(message)
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_owned()),
        )),
        Ok(WireEvent::Unknown) => {
            trace!(payload, "Ignoring event with unrecognized type");
            None
        }
        Err(error) => {
            trace!(payload, %error, "Ignoring malformed structured event");
            None
        }
    }
}

fn value_text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::Null => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_and_delta_discriminants() {
        assert_eq!(
            interpret(r#"data: {"type":"chunk","value":"Hel"}"#),
            Some(StreamEvent::IncrementalText("Hel".into()))
        );
        assert_eq!(
            interpret(r#"data:{"type":"delta","value":"lo"}"#),
            Some(StreamEvent::IncrementalText("lo".into()))
        );
        assert_eq!(
            interpret(r#"data: {"type":"delta","content":"x"}"#),
            Some(StreamEvent::IncrementalText("x".into()))
        );
    }

    #[test]
    fn test_delta_without_value_is_ignored() {
        assert_eq!(interpret(r#"data: {"type":"delta"}"#), None);
        assert_eq!(interpret(r#"data: {"type":"delta","value":null}"#), None);
    }

    #[test]
    fn test_non_string_delta_value_is_stringified() {
        assert_eq!(
            interpret(r#"data: {"type":"delta","value":42}"#),
            Some(StreamEvent::IncrementalText("42".into()))
        );
    }

    #[test]
    fn test_done_event_and_sentinel() {
        assert_eq!(interpret(r#"data: {"type":"done"}"#), Some(StreamEvent::Terminal));
        assert_eq!(
            interpret(r#"data: {"type":"done","usage":{"tokens":3}}"#),
            Some(StreamEvent::Terminal)
        );
        assert_eq!(interpret("data: [DONE]"), Some(StreamEvent::Terminal));
        assert!(StreamEvent::Terminal.ends_stream());
    }

    #[test]
    fn test_error_event() {
        assert_eq!(
            interpret(r#"data: {"type":"error","message":"quota exceeded"}"#),
            Some(StreamEvent::Failure("quota exceeded".into()))
        );
        assert_eq!(
            interpret(r#"data: {"type":"error","error":"boom"}"#),
            Some(StreamEvent::Failure("boom".into()))
        );
        assert_eq!(
            interpret(r#"data: {"type":"error"}"#),
            Some(StreamEvent::Failure(DEFAULT_ERROR_MESSAGE.into()))
        );
    }

    #[test]
    fn test_unknown_or_missing_type_is_ignored() {
        assert_eq!(interpret(r#"data: {"type":"ping"}"#), None);
        assert_eq!(interpret(r#"data: {"value":"orphan"}"#), None);
        assert_eq!(interpret("data: [1,2,3]"), None);
        assert_eq!(interpret("data: \"quoted\""), None);
    }

    #[test]
    fn test_raw_text_fallback() {
        let event = interpret("data: Hello there").unwrap();
        assert_eq!(event, StreamEvent::RawFallback("Hello there".into()));
        assert_eq!(event.delta_text(), Some("Hello there"));
    }

    #[test]
    fn test_payload_search_in_multiline_frame() {
        let frame = ": keep-alive\nevent: message\nid: 7\ndata: {\"type\":\"chunk\",\"value\":\"a\"}\ndata: ignored";
        assert_eq!(interpret(frame), Some(StreamEvent::IncrementalText("a".into())));
    }

    #[test]
    fn test_frames_without_payload() {
        assert_eq!(interpret(": comment only"), None);
        assert_eq!(interpret("event: ping"), None);
        assert_eq!(interpret("data:   "), None);
    }
}
