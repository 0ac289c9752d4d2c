//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use nestly_config::ConfigError;
use nestly_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const PERMISSION: i32 = 5;
    pub const RATE_LIMITED: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the Nest API")]
    #[diagnostic(
        code(nestly::connection_failed),
        help(
            "Check your network connection.\n\
             URL: {url}"
        )
    )]
    ConnectionFailed {
        url: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("The event stream closed before any data arrived")]
    #[diagnostic(
        code(nestly::stream_closed),
        help("Retry in a moment; the API may be shedding load.")
    )]
    StreamClosed,

    #[error("Request timed out")]
    #[diagnostic(
        code(nestly::timeout),
        help("Increase the connect timeout with --timeout.")
    )]
    Timeout,

    // ── Authentication ───────────────────────────────────────────────
    #[error("The access token was rejected")]
    #[diagnostic(
        code(nestly::auth_failed),
        help("The token may have been revoked. Run: nestly auth")
    )]
    AuthFailed,

    #[error("No access token configured")]
    #[diagnostic(
        code(nestly::no_token),
        help(
            "Authorize with: nestly auth\n\
             Or pass --token / set NESTLY_TOKEN.\n\
             Config file: {path}"
        )
    )]
    NoToken { path: String },

    #[error("Product credentials are incomplete: {missing} is not set")]
    #[diagnostic(
        code(nestly::no_product_credentials),
        help(
            "Add product_id and product_secret to {path}\n\
             or export NESTLY_PRODUCT_ID / NESTLY_PRODUCT_SECRET."
        )
    )]
    NoProductCredentials { missing: String, path: String },

    // ── Resources ────────────────────────────────────────────────────
    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(nestly::not_found),
        help("Run: nestly {list_command} to see what is available")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    // ── API ──────────────────────────────────────────────────────────
    #[error("Forbidden: {message}")]
    #[diagnostic(
        code(nestly::forbidden),
        help("The product lacks permission for this field, or the value is read-only.")
    )]
    Forbidden { message: String },

    #[error("Rate limited by the Nest API")]
    #[diagnostic(
        code(nestly::rate_limited),
        help("Wait before retrying; repeated writes are throttled per device.")
    )]
    RateLimited,

    #[error("API error ({code}): {message}")]
    #[diagnostic(code(nestly::api_error))]
    ApiError { code: String, message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(nestly::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(code(nestly::config))]
    Config(Box<figment::Error>),

    #[error("Keyring error: {message}")]
    #[diagnostic(
        code(nestly::keyring),
        help("Re-run without --keyring to store the token in the config file.")
    )]
    Keyring { message: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    #[diagnostic(code(nestly::json))]
    Json(#[from] serde_json::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::StreamClosed => exit_code::CONNECTION,
            Self::AuthFailed | Self::NoToken { .. } | Self::NoProductCredentials { .. } => {
                exit_code::AUTH
            }
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Forbidden { .. } => exit_code::PERMISSION,
            Self::RateLimited => exit_code::RATE_LIMITED,
            Self::Timeout => exit_code::TIMEOUT,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                url,
                source: reason.into(),
            },

            CoreError::Timeout => CliError::Timeout,

            CoreError::StreamAlreadyActive { stream_id } => CliError::ApiError {
                code: "stream_active".into(),
                message: format!("stream {stream_id} is already running"),
            },

            CoreError::NoToken => CliError::NoToken {
                path: nestly_config::config_path().display().to_string(),
            },

            CoreError::InvalidCredential { reason } => CliError::Validation {
                field: "token".into(),
                reason,
            },

            CoreError::AuthenticationFailed { message: _ } => CliError::AuthFailed,

            CoreError::DeviceNotFound { identifier } => CliError::NotFound {
                resource_type: "device".into(),
                identifier,
                list_command: "devices".into(),
            },

            CoreError::NotFound { path } => CliError::NotFound {
                resource_type: "path".into(),
                identifier: path,
                list_command: "devices".into(),
            },

            CoreError::Rejected { message } => CliError::Forbidden { message },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "value".into(),
                reason: message,
            },

            CoreError::Api {
                status: Some(429), ..
            } => CliError::RateLimited,

            CoreError::Api { message, status } => CliError::ApiError {
                code: status.map_or_else(|| "api".into(), |s| s.to_string()),
                message,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::ApiError {
                code: "internal".into(),
                message,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        let path = || nestly_config::config_path().display().to_string();
        match err {
            ConfigError::NoToken => CliError::NoToken { path: path() },
            ConfigError::NoProductCredentials { missing } => CliError::NoProductCredentials {
                missing: missing.into(),
                path: path(),
            },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::Keyring(message) => CliError::Keyring { message },
            ConfigError::Serialization(e) => CliError::Validation {
                field: "config".into(),
                reason: e.to_string(),
            },
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Io(e) => CliError::Io(e),
        }
    }
}
