// ── Core error types ──
//
// User-facing errors from nestly-core. HTTP status codes and wire-level
// parse failures are folded into domain variants by the
// `From<nestly_api::Error>` impl below.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach the Nest API at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Request to the Nest API timed out")]
    Timeout,

    #[error("An event stream is already running (stream {stream_id})")]
    StreamAlreadyActive { stream_id: u64 },

    // ── Authentication errors ────────────────────────────────────────
    #[error("No access token set")]
    NoToken,

    #[error("Invalid access token: {reason}")]
    InvalidCredential { reason: String },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("Path not found: {path}")]
    NotFound { path: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Request rejected by the Nest API: {message}")]
    Rejected { message: String },

    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── API errors (wrapped, not exposed raw) ────────────────────────
    #[error("API error: {message}")]
    Api {
        message: String,
        /// HTTP status code (if applicable).
        status: Option<u16>,
    },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether re-authenticating could resolve this error.
    pub fn is_auth_error(&self) -> bool {
        matches!(
            self,
            Self::NoToken | Self::InvalidCredential { .. } | Self::AuthenticationFailed { .. }
        )
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => *status,
            Self::AuthenticationFailed { .. } => Some(401),
            Self::Rejected { .. } => Some(403),
            Self::NotFound { .. } => Some(404),
            Self::ValidationFailed { .. } => Some(400),
            _ => None,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<nestly_api::Error> for CoreError {
    fn from(err: nestly_api::Error) -> Self {
        use nestly_api::Error as Api;

        match err {
            Api::InvalidCredential { reason } => CoreError::InvalidCredential { reason },
            Api::NoTokenSet => CoreError::NoToken,
            Api::StreamAlreadyActive { stream_id } => CoreError::StreamAlreadyActive { stream_id },
            Api::AuthError => CoreError::AuthenticationFailed {
                message: "access token rejected by the Nest API".into(),
            },
            Api::Forbidden => CoreError::Rejected {
                message: "forbidden; do not retry this request unchanged".into(),
            },
            Api::PathNotFound { path } => CoreError::NotFound { path },
            Api::InvalidRequest { detail, body } => CoreError::ValidationFailed {
                message: detail
                    .as_ref()
                    .and_then(|d| d.get("error"))
                    .and_then(serde_json::Value::as_str)
                    .map_or(body, str::to_owned),
            },
            Api::RateLimited => CoreError::Api {
                message: "rate limited; back off before retrying".into(),
                status: Some(429),
            },
            Api::UpstreamInternalError => CoreError::Api {
                message: "upstream internal error".into(),
                status: Some(500),
            },
            Api::ServiceUnavailable => CoreError::Api {
                message: "service unavailable".into(),
                status: Some(503),
            },
            Api::UnexpectedStatus { status, body } => CoreError::Api {
                message: format!("unexpected HTTP {status}: {body}"),
                status: Some(status),
            },
            Api::TransportFailure(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map_or_else(|| "<unknown>".into(), ToString::to_string),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            Api::InvalidRedirect { message } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("invalid redirect: {message}"),
            },
            Api::TooManyRedirects { limit } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("more than {limit} consecutive redirects"),
            },
            Api::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            Api::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            Api::MalformedEvent { line } => {
                CoreError::Internal(format!("malformed stream event: {line}"))
            }
            Api::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
