//! Persisted configuration for nestly tools.
//!
//! One TOML file (platform config dir) layered with `NESTLY_*` environment
//! variables, credential resolution (env → keyring → plaintext), and
//! translation to `nestly_core::NestConfig`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use nestly_core::{NestConfig, TlsVerification};

/// Keyring service name for every secret nestly stores.
pub const KEYRING_SERVICE: &str = "nestly";

const KEYRING_TOKEN_USER: &str = "access-token";
const KEYRING_SECRET_USER: &str = "product-secret";
const TOKEN_ENV: &str = "NESTLY_TOKEN";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no access token configured (run `nestly auth` or set NESTLY_TOKEN)")]
    NoToken,

    #[error("no product credentials configured: {missing} is not set")]
    NoProductCredentials { missing: &'static str },

    #[error("keyring error: {0}")]
    Keyring(String),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl From<keyring::Error> for ConfigError {
    fn from(err: keyring::Error) -> Self {
        Self::Keyring(err.to_string())
    }
}

// ── TOML config ─────────────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    /// Access token (plaintext; prefer the keyring).
    pub token: Option<String>,

    /// Client identifier recorded by older setups. Used as the OAuth
    /// client id when `product_id` is absent.
    pub client_id: Option<String>,

    /// OAuth client id of the Nest product.
    pub product_id: Option<String>,

    /// OAuth client secret of the Nest product (plaintext; prefer the keyring).
    pub product_secret: Option<String>,

    /// Override the streaming API root.
    pub api_root: Option<String>,

    /// Override the token exchange endpoint.
    pub token_url: Option<String>,

    /// Connect timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Path to an extra CA certificate.
    pub ca_cert: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token: None,
            client_id: None,
            product_id: None,
            product_secret: None,
            api_root: None,
            token_url: None,
            timeout: default_timeout(),
            ca_cert: None,
        }
    }
}

fn default_timeout() -> u64 {
    30
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "nestly", "nestly").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("nestly");
    p
}

// ── Loading ─────────────────────────────────────────────────────────

/// Load the config from the canonical path, layered with `NESTLY_*` env.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the config from `path`. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("NESTLY_"));

    Ok(figment.extract()?)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Saving ──────────────────────────────────────────────────────────

/// Serialize config to TOML and write it to the canonical path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the access token: `NESTLY_TOKEN` → keyring → plaintext.
pub fn resolve_token(cfg: &Config) -> Result<SecretString, ConfigError> {
    let from_env = std::env::var(TOKEN_ENV).ok();
    let from_keyring = || keyring_get(KEYRING_TOKEN_USER);
    resolve_token_with(cfg, from_env, from_keyring)
}

fn resolve_token_with(
    cfg: &Config,
    from_env: Option<String>,
    from_keyring: impl FnOnce() -> Option<String>,
) -> Result<SecretString, ConfigError> {
    from_env
        .filter(|t| !t.trim().is_empty())
        .or_else(from_keyring)
        .or_else(|| cfg.token.clone())
        .map(SecretString::from)
        .ok_or(ConfigError::NoToken)
}

/// Persist an access token in the system keyring.
pub fn store_token_in_keyring(token: &SecretString) -> Result<(), ConfigError> {
    use secrecy::ExposeSecret;

    let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_TOKEN_USER)?;
    entry.set_password(token.expose_secret())?;
    Ok(())
}

/// OAuth client id and secret for the PIN exchange.
///
/// The secret comes from the keyring when present, else from the config.
pub fn resolve_product_credentials(cfg: &Config) -> Result<(String, SecretString), ConfigError> {
    resolve_product_credentials_with(cfg, || keyring_get(KEYRING_SECRET_USER))
}

fn resolve_product_credentials_with(
    cfg: &Config,
    from_keyring: impl FnOnce() -> Option<String>,
) -> Result<(String, SecretString), ConfigError> {
    let client_id = cfg
        .product_id
        .clone()
        .or_else(|| cfg.client_id.clone())
        .ok_or(ConfigError::NoProductCredentials {
            missing: "product_id",
        })?;
    let secret = from_keyring()
        .or_else(|| cfg.product_secret.clone())
        .ok_or(ConfigError::NoProductCredentials {
            missing: "product_secret",
        })?;
    Ok((client_id, SecretString::from(secret)))
}

fn keyring_get(user: &str) -> Option<String> {
    keyring::Entry::new(KEYRING_SERVICE, user)
        .and_then(|entry| entry.get_password())
        .ok()
}

// ── Translation ─────────────────────────────────────────────────────

/// Build the runtime `NestConfig`, applying endpoint overrides.
pub fn to_nest_config(cfg: &Config) -> Result<NestConfig, ConfigError> {
    let mut nest = NestConfig::production().map_err(|e| ConfigError::Validation {
        field: "api_root".into(),
        reason: e.to_string(),
    })?;

    if let Some(ref raw) = cfg.api_root {
        nest.api_root = parse_url("api_root", raw)?;
    }
    if let Some(ref raw) = cfg.token_url {
        nest.token_url = parse_url("token_url", raw)?;
    }
    nest.timeout = Duration::from_secs(cfg.timeout);
    if let Some(ref ca_path) = cfg.ca_cert {
        nest.tls = TlsVerification::CustomCa(ca_path.clone());
    }
    Ok(nest)
}

fn parse_url(field: &str, raw: &str) -> Result<url::Url, ConfigError> {
    raw.parse().map_err(|_| ConfigError::Validation {
        field: field.into(),
        reason: format!("invalid URL: {raw}"),
    })
}
