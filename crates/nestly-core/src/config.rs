// ── Runtime connection configuration ──
//
// Describes *where* the SDK talks to and how the HTTP layer is tuned.
// Never touches disk: the CLI (or any embedder) builds a `NestConfig`
// and hands it to `Nest::new`.

use std::time::Duration;

use nestly_api::{DEFAULT_API_ROOT, DEFAULT_TOKEN_URL, TlsMode, TransportConfig};
use url::Url;

use crate::error::CoreError;

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(std::path::PathBuf),
    /// Skip verification. Only useful against a local test double.
    DangerAcceptInvalid,
}

impl From<&TlsVerification> for TlsMode {
    fn from(tls: &TlsVerification) -> Self {
        match tls {
            TlsVerification::SystemDefaults => TlsMode::System,
            TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
            TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
        }
    }
}

/// Configuration for one `Nest` context.
#[derive(Debug, Clone)]
pub struct NestConfig {
    /// Streaming API root (e.g., `https://developer-api.nest.com`).
    pub api_root: Url,
    /// OAuth token exchange endpoint.
    pub token_url: Url,
    /// Connect timeout for every request. Streams have no read timeout.
    pub timeout: Duration,
    pub tls: TlsVerification,
}

impl NestConfig {
    /// Production endpoints with default tuning.
    pub fn production() -> Result<Self, CoreError> {
        Ok(Self {
            api_root: parse_url(DEFAULT_API_ROOT)?,
            token_url: parse_url(DEFAULT_TOKEN_URL)?,
            timeout: Duration::from_secs(30),
            tls: TlsVerification::default(),
        })
    }

    /// Same tuning against a different API root and token endpoint.
    pub fn with_endpoints(mut self, api_root: Url, token_url: Url) -> Self {
        self.api_root = api_root;
        self.token_url = token_url;
        self
    }

    pub(crate) fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: TlsMode::from(&self.tls),
            connect_timeout: self.timeout,
        }
    }
}

fn parse_url(raw: &str) -> Result<Url, CoreError> {
    Url::parse(raw).map_err(|e| CoreError::Config {
        message: format!("invalid URL {raw}: {e}"),
    })
}
