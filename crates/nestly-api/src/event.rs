//! Event vocabulary of the Nest streaming API.

use std::fmt;

use serde::Serialize;

/// The `event:` type of a stream frame.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub enum EventKind {
    /// A snapshot of the data tree under `data.devices` / `data.structures`.
    Put,
    /// The server invalidated the access token.
    AuthRevoked,
    /// Liveness ping, no payload.
    KeepAlive,
    /// Any type outside the fixed vocabulary, kept verbatim.
    Other(String),
}

impl EventKind {
    pub fn parse(name: &str) -> Self {
        match name {
            "put" => Self::Put,
            "auth_revoked" => Self::AuthRevoked,
            "keep-alive" => Self::KeepAlive,
            other => Self::Other(other.to_owned()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Put => "put",
            Self::AuthRevoked => "auth_revoked",
            Self::KeepAlive => "keep-alive",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<EventKind> for String {
    fn from(kind: EventKind) -> Self {
        kind.as_str().to_owned()
    }
}

/// A structured event delivered to the stream handler.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    /// A fully reassembled `put` body (`{"path": ..., "data": {...}}`).
    Put(serde_json::Value),
    /// The token was revoked. By the time the handler sees this, the
    /// client has already cleared its token and redirect cache.
    AuthRevoked,
    KeepAlive,
    /// An event type outside the vocabulary; no body processing is done.
    Other { kind: String },
    /// The server ended the stream cleanly. Always the last event.
    Closed,
}

impl StreamEvent {
    /// The event kind, or `None` for the synthetic [`Closed`](Self::Closed) marker.
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            Self::Put(_) => Some(EventKind::Put),
            Self::AuthRevoked => Some(EventKind::AuthRevoked),
            Self::KeepAlive => Some(EventKind::KeepAlive),
            Self::Other { kind } => Some(EventKind::Other(kind.clone())),
            Self::Closed => None,
        }
    }
}

impl From<EventKind> for StreamEvent {
    /// Body-less event for a non-`put` kind.
    fn from(kind: EventKind) -> Self {
        match kind {
            EventKind::AuthRevoked => Self::AuthRevoked,
            EventKind::KeepAlive => Self::KeepAlive,
            EventKind::Put => Self::Put(serde_json::Value::Null),
            EventKind::Other(kind) => Self::Other { kind },
        }
    }
}
