use thiserror::Error;

/// Top-level error type for the `nestly-api` crate.
///
/// Covers every failure mode of the wire layer: credentials, the HTTP
/// status table shared by streaming and mutation requests, redirect
/// handling, transport failures, and the event codec.
/// `nestly-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Credentials ─────────────────────────────────────────────────
    /// The supplied access token cannot be used as a bearer credential.
    #[error("Invalid credential: {reason}")]
    InvalidCredential { reason: String },

    /// A request was attempted before any access token was set.
    #[error("No access token set -- call set_token() or authorize first")]
    NoTokenSet,

    // ── Stream lifecycle ────────────────────────────────────────────
    /// A stream is already running on this client; starting another is rejected.
    #[error("Stream {stream_id} is already active")]
    StreamAlreadyActive { stream_id: u64 },

    /// An event header line could not be split into `<field>: <type>`.
    #[error("Malformed event header: {line:?}")]
    MalformedEvent { line: String },

    // ── HTTP status table ───────────────────────────────────────────
    /// HTTP 429.
    #[error("Rate limited by the API (HTTP 429)")]
    RateLimited,

    /// HTTP 404.
    #[error("Path not found: {path}")]
    PathNotFound { path: String },

    /// HTTP 500.
    #[error("Upstream internal error (HTTP 500)")]
    UpstreamInternalError,

    /// HTTP 401. The stored token has been cleared.
    #[error("Authentication failed -- access token rejected (HTTP 401)")]
    AuthError,

    /// HTTP 403. Retrying the same request will not help.
    #[error("Forbidden (HTTP 403)")]
    Forbidden,

    /// HTTP 503.
    #[error("Service unavailable (HTTP 503)")]
    ServiceUnavailable,

    /// HTTP 400. `detail` is the decoded JSON body, `None` when the body was not JSON.
    #[error("Invalid request (HTTP 400): {body}")]
    InvalidRequest {
        detail: Option<serde_json::Value>,
        body: String,
    },

    /// Any other non-success status.
    #[error("Unexpected HTTP {status}: {body}")]
    UnexpectedStatus { status: u16, body: String },

    // ── Redirects ───────────────────────────────────────────────────
    /// A 307 arrived without a usable `Location` header.
    #[error("Invalid redirect: {message}")]
    InvalidRedirect { message: String },

    /// The redirect chain exceeded the configured bound.
    #[error("Too many redirects (limit {limit})")]
    TooManyRedirects { limit: usize },

    // ── Transport ───────────────────────────────────────────────────
    /// Connection-level failure with no HTTP status (refused, reset, DNS, ...).
    #[error("Transport failure: {0}")]
    TransportFailure(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or HTTP client construction failed.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if the server rejected the credential.
    pub fn is_auth_error(&self) -> bool {
        matches!(self, Self::AuthError | Self::NoTokenSet)
    }

    /// Returns `true` if this is a transient error worth retrying later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::TransportFailure(e) => e.is_timeout() || e.is_connect() || e.is_body(),
            Self::RateLimited | Self::ServiceUnavailable | Self::UpstreamInternalError => true,
            _ => false,
        }
    }

    /// The HTTP status that produced this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited => Some(429),
            Self::PathNotFound { .. } => Some(404),
            Self::UpstreamInternalError => Some(500),
            Self::AuthError => Some(401),
            Self::Forbidden => Some(403),
            Self::ServiceUnavailable => Some(503),
            Self::InvalidRequest { .. } => Some(400),
            Self::UnexpectedStatus { status, .. } => Some(*status),
            Self::TransportFailure(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
