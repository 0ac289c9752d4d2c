// Nest API HTTP client
//
// Owns the access token, the cached redirect host, and the single-stream
// slot. Every request (stream, mutation) goes through `dispatch`, which
// applies the 307 redirect cache, the fall-back-to-root retry on network
// failure, and the HTTP status table. Streaming and auth live in
// `stream.rs` and `auth.rs` as further inherent impls.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use arc_swap::ArcSwapOption;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue, LOCATION};
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// Production REST streaming root.
pub const DEFAULT_API_ROOT: &str = "https://developer-api.nest.com";

/// OAuth token exchange endpoint.
pub const DEFAULT_TOKEN_URL: &str = "https://api.home.nest.com/oauth2/access_token";

/// Upper bound on consecutive 307 hops for one logical request.
pub const MAX_REDIRECTS: usize = 5;

/// Addresses one device for a mutation: `/devices/<device_type>/<device_id>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub device_type: String,
    pub device_id: String,
}

impl EntityRef {
    pub fn new(device_type: impl Into<String>, device_id: impl Into<String>) -> Self {
        Self {
            device_type: device_type.into(),
            device_id: device_id.into(),
        }
    }
}

/// One logical request, replayable across redirects.
pub(crate) struct ApiRequest<'a> {
    pub method: Method,
    pub segments: Vec<&'a str>,
    pub accept: Option<&'static str>,
    pub body: Option<String>,
}

/// Client for the Nest streaming API.
///
/// Cheaply cloneable; clones share the token, redirect cache, and stream
/// slot. At most one stream runs per client, while mutations may be
/// issued at any time.
#[derive(Clone)]
pub struct NestClient {
    pub(crate) inner: Arc<ClientInner>,
}

pub(crate) struct ClientInner {
    pub http: reqwest::Client,
    pub api_root: Url,
    pub token_url: Url,
    pub token: ArcSwapOption<SecretString>,
    /// Scheme + host of the most recent 307 target.
    pub redirect: ArcSwapOption<Url>,
    /// Id of the running stream, `0` when idle.
    pub active_stream: AtomicU64,
    pub next_stream_id: AtomicU64,
}

impl fmt::Debug for NestClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NestClient")
            .field("api_root", &self.inner.api_root.as_str())
            .field("has_token", &self.has_token())
            .field("redirect", &self.redirect_target().map(String::from))
            .field("active_stream", &self.active_stream())
            .finish_non_exhaustive()
    }
}

impl NestClient {
    /// Create a client for the given API root and token endpoint.
    ///
    /// The HTTP client is built from `transport` with redirect following
    /// disabled; redirects are handled by [`dispatch`](Self::dispatch).
    pub fn new(api_root: Url, token_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                api_root,
                token_url,
                token: ArcSwapOption::empty(),
                redirect: ArcSwapOption::empty(),
                active_stream: AtomicU64::new(0),
                next_stream_id: AtomicU64::new(0),
            }),
        })
    }

    /// Client against the production endpoints.
    pub fn production(transport: &TransportConfig) -> Result<Self, Error> {
        Self::new(
            Url::parse(DEFAULT_API_ROOT)?,
            Url::parse(DEFAULT_TOKEN_URL)?,
            transport,
        )
    }

    pub fn api_root(&self) -> &Url {
        &self.inner.api_root
    }

    pub fn token_url(&self) -> &Url {
        &self.inner.token_url
    }

    // ── Token management ─────────────────────────────────────────────

    /// Store the access token used for every subsequent request.
    ///
    /// Returns `&Self` so configuration calls can be chained.
    pub fn set_token(&self, token: impl Into<String>) -> Result<&Self, Error> {
        let token = token.into();
        validate_token(&token)?;
        self.inner
            .token
            .store(Some(Arc::new(SecretString::from(token))));
        debug!("access token set");
        Ok(self)
    }

    /// Forget the token and any cached redirect host. Idempotent.
    pub fn clear_token(&self) -> &Self {
        self.inner.token.store(None);
        self.inner.redirect.store(None);
        debug!("access token and redirect cache cleared");
        self
    }

    pub fn has_token(&self) -> bool {
        self.inner.token.load().is_some()
    }

    /// The current token, if one is set.
    pub fn token(&self) -> Option<SecretString> {
        self.inner.token.load_full().map(|t| (*t).clone())
    }

    // ── Redirect cache ───────────────────────────────────────────────

    /// The host requests are currently pinned to, if a 307 set one.
    pub fn redirect_target(&self) -> Option<Url> {
        self.inner.redirect.load_full().map(|u| (*u).clone())
    }

    pub fn reset_redirect(&self) -> &Self {
        self.inner.redirect.store(None);
        self
    }

    /// Base URL for the next request: the redirect target or the API root.
    fn base_url(&self) -> Url {
        self.inner
            .redirect
            .load_full()
            .map_or_else(|| self.inner.api_root.clone(), |u| (*u).clone())
    }

    // ── Stream slot ──────────────────────────────────────────────────

    pub fn is_streaming(&self) -> bool {
        self.active_stream().is_some()
    }

    /// Id of the running stream, if any.
    pub fn active_stream(&self) -> Option<u64> {
        match self.inner.active_stream.load(Ordering::Acquire) {
            0 => None,
            id => Some(id),
        }
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Write one field of one device.
    ///
    /// Issues `PUT /devices/<type>/<id>/<field>` with the JSON encoding of
    /// `value` as the body and resolves with the raw response text.
    pub async fn mutate(
        &self,
        target: &EntityRef,
        field: &str,
        value: &serde_json::Value,
    ) -> Result<String, Error> {
        let request = ApiRequest {
            method: Method::PUT,
            segments: vec![
                "devices",
                target.device_type.as_str(),
                target.device_id.as_str(),
                field,
            ],
            accept: None,
            body: Some(value.to_string()),
        };

        let resp = self.dispatch(&request).await?;
        let body = resp.text().await?;
        debug!(
            device_type = %target.device_type,
            device_id = %target.device_id,
            field,
            "mutation accepted"
        );
        Ok(body)
    }

    // ── Request dispatch ─────────────────────────────────────────────

    /// Send a request, following the redirect and error policy.
    ///
    /// - 307: cache the `Location` origin and replay against it.
    /// - Connection failure with a cached redirect: drop the cache and
    ///   replay once against the API root.
    /// - Any other non-2xx: classify via the status table.
    pub(crate) async fn dispatch(&self, request: &ApiRequest<'_>) -> Result<reqwest::Response, Error> {
        let mut redirects = 0usize;
        let mut fell_back = false;

        loop {
            let token = self.inner.token.load_full().ok_or(Error::NoTokenSet)?;
            let url = build_url(&self.base_url(), &request.segments)?;
            debug!(method = %request.method, %url, "sending request");

            let mut builder = self
                .inner
                .http
                .request(request.method.clone(), url.clone())
                .bearer_auth(token.expose_secret());
            if let Some(accept) = request.accept {
                builder = builder.header(ACCEPT, accept);
            }
            if let Some(ref body) = request.body {
                builder = builder
                    .header(CONTENT_TYPE, "application/json")
                    .body(body.clone());
            }

            let resp = match builder.send().await {
                Ok(resp) => resp,
                Err(e) => {
                    if !fell_back && self.inner.redirect.swap(None).is_some() {
                        warn!(error = %e, "redirected host unreachable, retrying against API root");
                        fell_back = true;
                        continue;
                    }
                    return Err(Error::TransportFailure(e));
                }
            };

            let status = resp.status();
            if status == StatusCode::TEMPORARY_REDIRECT {
                redirects += 1;
                if redirects > MAX_REDIRECTS {
                    return Err(Error::TooManyRedirects {
                        limit: MAX_REDIRECTS,
                    });
                }
                let target = redirect_origin(resp.headers(), &url)?;
                info!(target = %target, "API redirected, pinning host");
                self.inner.redirect.store(Some(Arc::new(target)));
                continue;
            }

            if status.is_success() {
                return Ok(resp);
            }

            return Err(self.reject(resp, &url).await);
        }
    }

    /// Turn a non-success response into an error, applying state side effects.
    async fn reject(&self, resp: reqwest::Response, url: &Url) -> Error {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        let err = classify_status(status, url.path(), body);

        if matches!(err, Error::AuthError) {
            warn!("access token rejected by API, clearing it");
            self.inner.token.store(None);
        }
        err
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn validate_token(token: &str) -> Result<(), Error> {
    if token.trim().is_empty() {
        return Err(Error::InvalidCredential {
            reason: "token is empty".into(),
        });
    }
    if HeaderValue::from_str(&format!("Bearer {token}")).is_err() {
        return Err(Error::InvalidCredential {
            reason: "token contains characters not allowed in an HTTP header".into(),
        });
    }
    Ok(())
}

/// Join path segments onto a base URL, percent-encoding each one.
fn build_url(base: &Url, segments: &[&str]) -> Result<Url, Error> {
    let mut url = base.clone();
    url.set_query(None);
    url.path_segments_mut()
        .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
        .clear()
        .extend(segments);
    Ok(url)
}

/// Scheme + host (+ port) of a 307 `Location`, resolved against the request URL.
pub(crate) fn redirect_origin(headers: &HeaderMap, request_url: &Url) -> Result<Url, Error> {
    let location = headers
        .get(LOCATION)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| Error::InvalidRedirect {
            message: "307 response without a Location header".into(),
        })?;

    let target = request_url.join(location)?;
    if target.host_str().is_none() {
        return Err(Error::InvalidRedirect {
            message: format!("Location has no host: {location}"),
        });
    }

    Ok(Url::parse(&target.origin().ascii_serialization())?)
}

/// Map a non-success status onto the error taxonomy.
pub(crate) fn classify_status(status: StatusCode, path: &str, body: String) -> Error {
    match status.as_u16() {
        400 => Error::InvalidRequest {
            detail: serde_json::from_str(&body).ok(),
            body,
        },
        401 => Error::AuthError,
        403 => Error::Forbidden,
        404 => Error::PathNotFound { path: path.into() },
        429 => Error::RateLimited,
        500 => Error::UpstreamInternalError,
        503 => Error::ServiceUnavailable,
        other => Error::UnexpectedStatus {
            status: other,
            body,
        },
    }
}
