// OAuth PIN exchange
//
// The PIN comes from the browser authorization flow, which lives outside
// this crate. Exchanging it yields a long-lived access token that is
// stored on the client as a side effect.

use std::fmt;
use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{debug, info};

use crate::client::{NestClient, classify_status};
use crate::error::Error;

/// Raw token endpoint response.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// A token obtained from the PIN exchange.
#[derive(Clone)]
pub struct AccessToken {
    pub token: SecretString,
    /// Lifetime reported by the token endpoint, if any.
    pub expires_in: Option<Duration>,
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken")
            .field("token", &"[REDACTED]")
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

impl NestClient {
    /// Exchange an authorization PIN for an access token.
    ///
    /// `POST`s the `authorization_code` grant as a form to the token URL.
    /// On success the token is stored on this client and returned.
    /// Failures are classified with the same status table as other
    /// requests, but without redirect handling or token side effects.
    pub async fn exchange_pin(
        &self,
        pin: &str,
        client_id: &str,
        client_secret: &SecretString,
    ) -> Result<AccessToken, Error> {
        let url = self.token_url().clone();
        debug!(%url, client_id, "exchanging authorization PIN");

        let form = [
            ("code", pin),
            ("client_id", client_id),
            ("client_secret", client_secret.expose_secret()),
            ("grant_type", "authorization_code"),
        ];

        let resp = self.inner.http.post(url.clone()).form(&form).send().await?;
        let status = resp.status();
        let body = resp.text().await?;

        if !status.is_success() {
            return Err(classify_status(status, url.path(), body));
        }

        let parsed: TokenResponse =
            serde_json::from_str(&body).map_err(|e| Error::Deserialization {
                message: format!("token response: {e}"),
                // The body may carry the token; keep it out of the error.
                body: String::new(),
            })?;

        self.set_token(parsed.access_token.clone())?;
        info!("authorization PIN exchanged for access token");

        Ok(AccessToken {
            token: SecretString::from(parsed.access_token),
            expires_in: parsed.expires_in.map(Duration::from_secs),
        })
    }
}
