//! Long-lived event stream.
//!
//! [`NestClient::start_stream`] opens `GET /` with `Accept: text/event-stream`
//! and feeds every body chunk through an [`EventAssembler`], which turns
//! raw bytes into [`StreamEvent`]s. Chunked `put` bodies are buffered until
//! they decode; everything else is emitted as soon as its header is read.

use std::sync::atomic::Ordering;

use futures_util::StreamExt;
use reqwest::Method;
use tracing::{debug, info, trace, warn};

use crate::client::{ApiRequest, ClientInner, NestClient};
use crate::codec::{
    ChunkBuffer, extract_event_body, extract_event_type, is_incomplete_header,
    looks_like_new_event, split_frames, split_lines, split_trailing_marker,
};
use crate::error::Error;
use crate::event::{EventKind, StreamEvent};

const EVENT_STREAM: &str = "text/event-stream";

// ── EventAssembler ───────────────────────────────────────────────────

/// Incremental decoder from body chunks to structured events.
///
/// Owns the chunk buffer for one stream, plus whatever a chunk boundary
/// cut short: the tail bytes of a UTF-8 sequence and the start of an
/// event header. Carries no connection state, so it can be driven
/// directly in tests.
#[derive(Debug, Default)]
pub struct EventAssembler {
    buffer: ChunkBuffer,
    /// Leading bytes of a UTF-8 sequence split across chunks.
    carry: Vec<u8>,
    /// Header text waiting for the rest of its lines.
    partial: String,
}

impl EventAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fragments currently waiting for the rest of a chunked `put` body.
    pub fn pending_fragments(&self) -> usize {
        self.buffer.len()
    }

    /// Decode one network chunk into zero or more events.
    pub fn ingest(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        let Some(decoded) = self.decode(chunk) else {
            return Vec::new();
        };

        let at_boundary = !self.partial.is_empty() || self.buffer.is_empty();
        let mut text = std::mem::take(&mut self.partial);
        text.push_str(&decoded);

        let (complete, marker) = split_trailing_marker(&text, at_boundary);
        let mut frames = split_frames(complete);
        let mut held = marker.to_owned();

        let unfinished = frames
            .last()
            .copied()
            .filter(|frame| looks_like_new_event(frame) && is_incomplete_header(frame));
        if let Some(frame) = unfinished {
            frames.pop();
            held = frame.to_owned();
        }

        let events = frames
            .into_iter()
            .filter_map(|frame| self.ingest_frame(frame))
            .collect();

        if !held.is_empty() {
            trace!(len = held.len(), "holding incomplete event header");
        }
        self.partial = held;
        events
    }

    /// Prepend bytes carried over from the previous chunk and decode.
    ///
    /// A chunk that merely ends inside a multi-byte character keeps the
    /// incomplete tail for the next call. A chunk with a genuinely invalid
    /// sequence is discarded.
    fn decode(&mut self, chunk: &[u8]) -> Option<String> {
        let mut bytes = std::mem::take(&mut self.carry);
        bytes.extend_from_slice(chunk);

        match String::from_utf8(bytes) {
            Ok(text) => Some(text),
            Err(e) if e.utf8_error().error_len().is_none() => {
                let valid = e.utf8_error().valid_up_to();
                let mut bytes = e.into_bytes();
                self.carry = bytes.split_off(valid);
                trace!(carried = self.carry.len(), "chunk ends inside a UTF-8 sequence");
                String::from_utf8(bytes).ok()
            }
            Err(e) => {
                warn!(error = %e.utf8_error(), len = chunk.len(), "discarding chunk that is not valid UTF-8");
                None
            }
        }
    }

    fn ingest_frame(&mut self, frame: &str) -> Option<StreamEvent> {
        if !looks_like_new_event(frame) {
            return self.continue_chunked(frame);
        }

        let lines = split_lines(frame);
        let kind = match extract_event_type(&lines) {
            Ok(kind) => EventKind::parse(&kind),
            Err(e) => {
                warn!(error = %e, "discarding malformed event");
                return None;
            }
        };

        if kind != EventKind::Put {
            return Some(kind.into());
        }

        let body = extract_event_body(&lines);
        if let Some(parsed) = body.parsed {
            return Some(StreamEvent::Put(parsed));
        }

        let stale = self.buffer.len();
        if self.buffer.restart_with(body.raw) {
            warn!(
                discarded_fragments = stale,
                "new chunked put began before the previous one completed; previous body lost"
            );
        }
        trace!("chunked put started");
        None
    }

    fn continue_chunked(&mut self, fragment: &str) -> Option<StreamEvent> {
        if self.buffer.is_empty() {
            if !fragment.trim().is_empty() {
                warn!(len = fragment.len(), "continuation fragment with no chunked put open, dropping");
            }
            return None;
        }

        self.buffer.push(fragment);
        let body = self.buffer.try_complete()?;
        debug!(fragments = self.buffer.len(), "chunked put reassembled");
        self.buffer.clear();
        Some(StreamEvent::Put(body))
    }
}

// ── Stream slot ──────────────────────────────────────────────────────

/// Marks the client as streaming; released on drop.
struct StreamSlot<'a> {
    inner: &'a ClientInner,
    id: u64,
}

impl Drop for StreamSlot<'_> {
    fn drop(&mut self) {
        self.inner.active_stream.store(0, Ordering::Release);
    }
}

// ── NestClient streaming ─────────────────────────────────────────────

impl NestClient {
    /// Open the event stream and deliver events to `on_event` until the
    /// server closes it.
    ///
    /// Rejects immediately with [`Error::StreamAlreadyActive`] if this
    /// client already has a stream running. Events are handed over in
    /// arrival order; an `auth_revoked` event clears the token and the
    /// redirect cache before the handler sees it. On clean termination
    /// the slot is released, [`StreamEvent::Closed`] is delivered, and the
    /// future resolves to `Ok(())`. Dropping the future closes the
    /// connection.
    pub async fn start_stream<F>(&self, mut on_event: F) -> Result<(), Error>
    where
        F: FnMut(StreamEvent) + Send,
    {
        let slot = self.claim_stream()?;
        info!(stream_id = slot.id, "opening event stream");

        let request = ApiRequest {
            method: Method::GET,
            segments: Vec::new(),
            accept: Some(EVENT_STREAM),
            body: None,
        };
        let resp = self.dispatch(&request).await?;
        info!(stream_id = slot.id, url = %resp.url(), "event stream connected");

        let mut body = std::pin::pin!(resp.bytes_stream());
        let mut assembler = EventAssembler::new();

        while let Some(chunk) = body.next().await {
            let chunk = chunk.inspect_err(|e| {
                warn!(stream_id = slot.id, error = %e, "event stream read failed");
            })?;
            for event in assembler.ingest(&chunk) {
                self.route(event, &mut on_event);
            }
        }

        info!(stream_id = slot.id, "event stream closed by server");
        drop(slot);
        on_event(StreamEvent::Closed);
        Ok(())
    }

    fn claim_stream(&self) -> Result<StreamSlot<'_>, Error> {
        let id = self.inner.next_stream_id.fetch_add(1, Ordering::Relaxed) + 1;
        match self
            .inner
            .active_stream
            .compare_exchange(0, id, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => Ok(StreamSlot {
                inner: &self.inner,
                id,
            }),
            Err(active) => Err(Error::StreamAlreadyActive { stream_id: active }),
        }
    }

    /// Per-kind preprocessing, then hand-off to the handler.
    fn route<F: FnMut(StreamEvent)>(&self, event: StreamEvent, on_event: &mut F) {
        match event {
            StreamEvent::AuthRevoked => {
                warn!("access token revoked by server");
                self.clear_token();
            }
            StreamEvent::KeepAlive => trace!("keep-alive"),
            StreamEvent::Put(_) => debug!("put event"),
            StreamEvent::Other { ref kind } => debug!(kind = %kind, "unrecognised event type"),
            StreamEvent::Closed => {}
        }
        on_event(event);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    fn put_body() -> String {
        json!({
            "path": "/",
            "data": {
                "devices": {
                    "thermostats": {
                        "peyiJNo0IldT2YlIVtYaGQ": {
                            "device_id": "peyiJNo0IldT2YlIVtYaGQ",
                            "name": "Hallway (Upstairs)",
                            "target_temperature_f": 72
                        }
                    }
                },
                "structures": {
                    "VqFabWH21nwVyd4RWgJgNb292wa7hG": { "name": "Home", "away": "home" }
                }
            }
        })
        .to_string()
    }

    #[test]
    fn whole_put_emits_immediately() {
        let mut asm = EventAssembler::new();
        let chunk = format!("event: put\ndata: {}\n\n", put_body());
        let events = asm.ingest(chunk.as_bytes());
        assert_eq!(events.len(), 1);
        match &events[0] {
            StreamEvent::Put(v) => assert_eq!(v["data"]["structures"]["VqFabWH21nwVyd4RWgJgNb292wa7hG"]["name"], "Home"),
            other => panic!("expected put, got {other:?}"),
        }
    }

    #[test]
    fn every_split_reassembles_exactly_once() {
        let body = put_body();
        let expected: serde_json::Value = serde_json::from_str(&body).unwrap();

        for pieces in [2usize, 3, 5, 9] {
            let step = body.len().div_ceil(pieces);
            let fragments: Vec<&str> = body
                .as_bytes()
                .chunks(step)
                .map(|c| std::str::from_utf8(c).unwrap())
                .collect();

            let mut asm = EventAssembler::new();
            let mut emitted = Vec::new();
            for (i, fragment) in fragments.iter().enumerate() {
                let chunk = if i == 0 {
                    format!("event: put\ndata: {fragment}")
                } else if i == fragments.len() - 1 {
                    format!("{fragment}\n\n")
                } else {
                    (*fragment).to_string()
                };
                let events = asm.ingest(chunk.as_bytes());
                if i + 1 < fragments.len() {
                    assert!(events.is_empty(), "fragment {i} of {pieces} emitted early");
                }
                emitted.extend(events);
            }

            assert_eq!(emitted, vec![StreamEvent::Put(expected.clone())]);
            assert_eq!(asm.pending_fragments(), 0);
        }
    }

    #[test]
    fn split_inside_string_preserves_whitespace() {
        let mut asm = EventAssembler::new();
        assert!(asm.ingest(b"event: put\ndata: {\"name\":\"Living ").is_empty());
        let events = asm.ingest(b"Room\"}\n\n");
        assert_eq!(events, vec![StreamEvent::Put(json!({"name": "Living Room"}))]);
    }

    #[test]
    fn new_chunked_series_discards_incomplete_one() {
        let mut asm = EventAssembler::new();
        assert!(asm.ingest(b"event: put\ndata: {\"stale\":").is_empty());
        assert!(asm.ingest(b"event: put\ndata: {\"fresh\":").is_empty());
        assert_eq!(asm.pending_fragments(), 1);
        let events = asm.ingest(b"true}\n\n");
        assert_eq!(events, vec![StreamEvent::Put(json!({"fresh": true}))]);
    }

    #[test]
    fn non_put_events_skip_body_processing() {
        let mut asm = EventAssembler::new();
        let events = asm.ingest(b"event: keep-alive\ndata: null\n\nevent: auth_revoked\ndata: \"c.abc\"\n\nevent: cancel\ndata: {\n\n");
        assert_eq!(
            events,
            vec![
                StreamEvent::KeepAlive,
                StreamEvent::AuthRevoked,
                StreamEvent::Other { kind: "cancel".into() },
            ]
        );
    }

    #[test]
    fn tail_and_next_event_in_one_chunk() {
        let mut asm = EventAssembler::new();
        assert!(asm.ingest(b"event: put\ndata: {\"a\":").is_empty());
        let events = asm.ingest(b"1}\n\nevent: keep-alive\ndata: null\n\n");
        assert_eq!(events, vec![StreamEvent::Put(json!({"a": 1})), StreamEvent::KeepAlive]);
    }

    #[test]
    fn invalid_utf8_is_discarded() {
        let mut asm = EventAssembler::new();
        assert!(asm.ingest(&[0xff, 0xfe, 0x00]).is_empty());
    }

    #[test]
    fn utf8_sequence_split_across_chunks_is_kept() {
        let mut asm = EventAssembler::new();
        assert!(asm.ingest(b"event: put\ndata: {\"name\":\"K\xc3").is_empty());
        let events = asm.ingest(b"\xbcche\"}\n\n");
        assert_eq!(events, vec![StreamEvent::Put(json!({"name": "Küche"}))]);
    }

    #[test]
    fn invalid_utf8_after_a_carried_tail_is_discarded() {
        let mut asm = EventAssembler::new();
        assert!(asm.ingest(b"event: put\ndata: {\"name\":\"K\xc3").is_empty());
        assert!(asm.ingest(b"\xffche\"}\n\n").is_empty());
        let events = asm.ingest(b"event: keep-alive\ndata: null\n\n");
        assert_eq!(events, vec![StreamEvent::KeepAlive]);
    }

    #[test]
    fn header_split_inside_event_type() {
        let mut asm = EventAssembler::new();
        assert!(asm.ingest(b"event: pu").is_empty());
        let events = asm.ingest(b"t\ndata: {\"a\":1}\n\n");
        assert_eq!(events, vec![StreamEvent::Put(json!({"a": 1}))]);
    }

    #[test]
    fn header_arrives_before_its_data_line() {
        let mut asm = EventAssembler::new();
        assert!(asm.ingest(b"event: put\n").is_empty());
        assert_eq!(asm.pending_fragments(), 0);
        let events = asm.ingest(b"data: {\"a\":1}\n\n");
        assert_eq!(events, vec![StreamEvent::Put(json!({"a": 1}))]);
    }

    #[test]
    fn marker_split_after_a_complete_event() {
        let mut asm = EventAssembler::new();
        let events = asm.ingest(b"event: keep-alive\ndata: null\n\neve");
        assert_eq!(events, vec![StreamEvent::KeepAlive]);
        let events = asm.ingest(b"nt: put\ndata: {\"a\":1}\n\n");
        assert_eq!(events, vec![StreamEvent::Put(json!({"a": 1}))]);
    }

    #[test]
    fn orphan_fragment_is_dropped() {
        let mut asm = EventAssembler::new();
        assert!(asm.ingest(b"{\"a\":1}").is_empty());
        assert_eq!(asm.pending_fragments(), 0);
    }

    #[test]
    fn malformed_header_is_discarded() {
        let mut asm = EventAssembler::new();
        let events = asm.ingest(b"event: put\ndata: {}\n\n");
        assert_eq!(events.len(), 1);
        // A frame whose first line has no colon.
        assert!(asm.ingest(b"bogus\nevent: put\n").is_empty());
    }
}
