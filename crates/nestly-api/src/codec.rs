//! Protocol codec for the streaming API.
//!
//! Pure functions over decoded chunk text. A well-formed event is a
//! two-line block:
//!
//! ```text
//! event: put
//! data: {"path":"/","data":{...}}
//! ```
//!
//! Large `put` bodies arrive split across several network chunks. Only
//! the first carries the `event:` header; the rest are raw JSON fragments
//! that must be concatenated before they decode. Nothing in this module
//! fails for expected outcomes: an undecodable body is reported as
//! `parsed: None`, an incomplete buffer as `None`.

use serde_json::Value;

use crate::error::Error;

/// Literal that introduces an event header line.
pub const EVENT_MARKER: &str = "event: ";

const EVENT_FIELD: &str = "event:";
const DATA_PREFIX: &str = "data:";

/// The `data:` line of an event, before and after decoding.
#[derive(Debug, Clone, PartialEq)]
pub struct EventBody {
    /// The text after the `data:` prefix.
    pub raw: String,
    /// The decoded JSON, or `None` when `raw` is the first fragment of a chunked body.
    pub parsed: Option<Value>,
}

/// Split a frame into its non-blank lines.
pub fn split_lines(raw: &str) -> Vec<&str> {
    raw.lines().filter(|line| !line.trim().is_empty()).collect()
}

/// Split one network chunk into frames.
///
/// A chunk may carry several events back to back. A cut is made before
/// every `event:` header that follows a blank line; text before the first
/// header (the tail of a chunked body) stays in its own frame untouched.
pub fn split_frames(raw: &str) -> Vec<&str> {
    let mut cuts = vec![0];
    for (idx, _) in raw.match_indices(EVENT_FIELD) {
        let before = &raw[..idx];
        if idx > 0 && (before.ends_with("\n\n") || before.ends_with("\r\n\r\n")) {
            cuts.push(idx);
        }
    }
    cuts.push(raw.len());

    cuts.windows(2)
        .filter_map(|w| match *w {
            [start, end] if end > start => Some(&raw[start..end]),
            _ => None,
        })
        .collect()
}

/// `true` if the frame opens a new event rather than continuing a chunked body.
pub fn looks_like_new_event(raw: &str) -> bool {
    raw.lines().any(|line| line.starts_with(EVENT_MARKER))
}

/// `true` while a header frame still waits for the rest of its lines.
///
/// A frame ending in a blank line is complete. Otherwise the header line
/// must be newline-terminated and followed by more than a bare `data:`
/// prefix.
pub fn is_incomplete_header(frame: &str) -> bool {
    if frame.ends_with("\n\n") || frame.ends_with("\r\n\r\n") {
        return false;
    }
    match frame.split_once('\n') {
        None => true,
        Some((_, rest)) => DATA_PREFIX.starts_with(rest.trim()),
    }
}

/// Split off a trailing piece of the event marker (`"ev"`, `"event:"`) that
/// sits at a frame boundary: after a blank line, or at the very start of
/// `raw` when `at_boundary` is set.
///
/// Returns `(complete, marker_prefix)`; the prefix is empty when there is
/// nothing to hold back.
pub fn split_trailing_marker(raw: &str, at_boundary: bool) -> (&str, &str) {
    let start = match raw.rfind("\n\n") {
        Some(idx) => idx + 2,
        None if at_boundary => 0,
        None => return (raw, ""),
    };
    let tail = &raw[start..];
    if !tail.is_empty() && tail.len() < EVENT_MARKER.len() && EVENT_MARKER.starts_with(tail) {
        raw.split_at(start)
    } else {
        (raw, "")
    }
}

/// Extract the event type from the header line.
pub fn extract_event_type(lines: &[&str]) -> Result<String, Error> {
    let first = lines.first().copied().unwrap_or_default();
    first
        .split(':')
        .nth(1)
        .map(|kind| kind.trim().to_owned())
        .ok_or_else(|| Error::MalformedEvent {
            line: first.to_owned(),
        })
}

/// Extract and attempt to decode the `data:` line.
pub fn extract_event_body(lines: &[&str]) -> EventBody {
    let line = lines.get(1).copied().unwrap_or_default();
    // Only leading whitespace is dropped: the tail of a partial body may
    // end inside a JSON string.
    let raw = line
        .strip_prefix(DATA_PREFIX)
        .unwrap_or(line)
        .trim_start()
        .to_owned();
    let parsed = serde_json::from_str(&raw).ok();
    EventBody { raw, parsed }
}

/// Concatenate buffered fragments in order and try to decode them.
pub fn try_complete_chunk_buffer(fragments: &[String]) -> Option<Value> {
    if fragments.is_empty() {
        return None;
    }
    serde_json::from_str(&fragments.concat()).ok()
}

// ── ChunkBuffer ──────────────────────────────────────────────────────

/// Fragments of a `put` body that has not decoded yet.
///
/// Non-empty only between the first fragment of a chunked body and the
/// chunk that completes it.
#[derive(Debug, Default)]
pub struct ChunkBuffer {
    fragments: Vec<String>,
}

impl ChunkBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    /// Append a continuation fragment.
    pub fn push(&mut self, fragment: impl Into<String>) {
        self.fragments.push(fragment.into());
    }

    /// Replace the contents with the first fragment of a new series.
    ///
    /// Returns `true` if an incomplete series was discarded.
    pub fn restart_with(&mut self, fragment: impl Into<String>) -> bool {
        let discarded = !self.fragments.is_empty();
        self.fragments.clear();
        self.fragments.push(fragment.into());
        discarded
    }

    /// Decode the buffered series, if it is complete.
    pub fn try_complete(&self) -> Option<Value> {
        try_complete_chunk_buffer(&self.fragments)
    }

    pub fn clear(&mut self) {
        self.fragments.clear();
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn well_formed_event_round_trips_type_and_body() {
        let raw = "event: put\ndata: {\"path\":\"/\",\"data\":{\"devices\":{}}}\n\n";
        let lines = split_lines(raw);

        assert!(looks_like_new_event(raw));
        assert_eq!(extract_event_type(&lines).unwrap(), "put");

        let body = extract_event_body(&lines);
        assert_eq!(body.parsed, Some(json!({"path": "/", "data": {"devices": {}}})));
    }

    #[test]
    fn header_without_colon_is_malformed() {
        let lines = split_lines("garbage line\ndata: {}");
        match extract_event_type(&lines) {
            Err(Error::MalformedEvent { line }) => assert_eq!(line, "garbage line"),
            other => panic!("expected MalformedEvent, got {other:?}"),
        }
    }

    #[test]
    fn empty_frame_is_malformed() {
        assert!(matches!(
            extract_event_type(&[]),
            Err(Error::MalformedEvent { .. })
        ));
    }

    #[test]
    fn partial_body_reports_unparsed() {
        let lines = split_lines("event: put\ndata: {\"data\":{\"devices\":{\"therm");
        let body = extract_event_body(&lines);
        assert_eq!(body.raw, "{\"data\":{\"devices\":{\"therm");
        assert!(body.parsed.is_none());
    }

    #[test]
    fn keep_alive_body_is_null() {
        let lines = split_lines("event: keep-alive\ndata: null\n\n");
        assert_eq!(extract_event_type(&lines).unwrap(), "keep-alive");
        assert_eq!(extract_event_body(&lines).parsed, Some(Value::Null));
    }

    #[test]
    fn continuation_fragment_is_not_a_new_event() {
        assert!(!looks_like_new_event("ostats\":{\"A\":{\"name\":\"Hall\"}}}}\n\n"));
    }

    #[test]
    fn split_frames_separates_back_to_back_events() {
        let raw = "event: keep-alive\ndata: null\n\nevent: put\ndata: {}\n\n";
        let frames = split_frames(raw);
        assert_eq!(frames, vec!["event: keep-alive\ndata: null\n\n", "event: put\ndata: {}\n\n"]);
    }

    #[test]
    fn split_frames_keeps_body_tail_separate() {
        let raw = "\"x\":1}}\n\nevent: keep-alive\ndata: null\n\n";
        let frames = split_frames(raw);
        assert_eq!(frames, vec!["\"x\":1}}\n\n", "event: keep-alive\ndata: null\n\n"]);
    }

    #[test]
    fn split_frames_ignores_marker_inside_body() {
        let raw = "{\"note\":\"event: x\"}";
        assert_eq!(split_frames(raw), vec![raw]);
    }

    #[test]
    fn header_waits_for_its_data_line() {
        assert!(is_incomplete_header("event: pu"));
        assert!(is_incomplete_header("event: put\n"));
        assert!(is_incomplete_header("event: put\nda"));
        assert!(is_incomplete_header("event: put\ndata: "));
        assert!(!is_incomplete_header("event: put\ndata: {\"a\""));
        assert!(!is_incomplete_header("event: keep-alive\n\n"));
    }

    #[test]
    fn trailing_marker_piece_is_held_back() {
        let raw = "event: keep-alive\ndata: null\n\neve";
        assert_eq!(
            split_trailing_marker(raw, false),
            ("event: keep-alive\ndata: null\n\n", "eve")
        );
        assert_eq!(split_trailing_marker("event:", true), ("", "event:"));
    }

    #[test]
    fn body_text_is_not_mistaken_for_a_marker() {
        // Mid-body, with no blank line before it.
        assert_eq!(split_trailing_marker("ev", false), ("ev", ""));
        assert_eq!(split_trailing_marker("{\"a\":1}", true), ("{\"a\":1}", ""));
        assert_eq!(split_trailing_marker("x}\n\ndata", true), ("x}\n\ndata", ""));
    }

    #[test]
    fn chunk_buffer_completes_in_order() {
        let mut buffer = ChunkBuffer::new();
        assert!(!buffer.restart_with("{\"a\":"));
        assert!(buffer.try_complete().is_none());
        buffer.push("[1,2");
        assert!(buffer.try_complete().is_none());
        buffer.push("]}");
        assert_eq!(buffer.try_complete(), Some(json!({"a": [1, 2]})));
    }

    #[test]
    fn restart_reports_discarded_series() {
        let mut buffer = ChunkBuffer::new();
        buffer.restart_with("{\"stale\":");
        assert!(buffer.restart_with("{\"fresh\":"));
        assert_eq!(buffer.fragments(), ["{\"fresh\":".to_owned()]);
    }

    #[test]
    fn empty_buffer_never_completes() {
        assert!(try_complete_chunk_buffer(&[]).is_none());
    }
}
