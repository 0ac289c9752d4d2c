// ── Nest facade ──
//
// Explicit context object wiring the stream into the store. Construct one
// per token/stream/cache set and pass it where needed.

use std::sync::Arc;

use nestly_api::{AccessToken, EntityRef, NestClient, StreamEvent};
use secrecy::SecretString;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::NestConfig;
use crate::error::CoreError;
use crate::signal::{Signal, SignalKind, SubscriptionId};
use crate::store::DataStore;

/// The SDK entry point.
///
/// Cheaply cloneable; clones share the client (token, redirect cache,
/// stream slot) and the store.
#[derive(Debug, Clone)]
pub struct Nest {
    config: NestConfig,
    client: NestClient,
    store: Arc<DataStore>,
}

impl Nest {
    /// Build the HTTP client from `config`. Does not touch the network.
    pub fn new(config: NestConfig) -> Result<Self, CoreError> {
        let client = NestClient::new(
            config.api_root.clone(),
            config.token_url.clone(),
            &config.transport(),
        )?;
        Ok(Self {
            config,
            client,
            store: Arc::new(DataStore::new()),
        })
    }

    pub fn config(&self) -> &NestConfig {
        &self.config
    }

    pub fn client(&self) -> &NestClient {
        &self.client
    }

    pub fn store(&self) -> &Arc<DataStore> {
        &self.store
    }

    // ── Credentials ──────────────────────────────────────────────────

    pub fn set_token(&self, token: impl Into<String>) -> Result<&Self, CoreError> {
        self.client.set_token(token)?;
        Ok(self)
    }

    pub fn clear_token(&self) -> &Self {
        self.client.clear_token();
        self
    }

    pub fn has_token(&self) -> bool {
        self.client.has_token()
    }

    /// Exchange a PIN for an access token and start using it.
    pub async fn authorize(
        &self,
        pin: &str,
        client_id: &str,
        client_secret: &SecretString,
    ) -> Result<AccessToken, CoreError> {
        let token = self.client.exchange_pin(pin, client_id, client_secret).await?;
        info!("authorized with PIN");
        Ok(token)
    }

    // ── Streaming ────────────────────────────────────────────────────

    /// Run the event stream until the server closes it.
    ///
    /// `put` payloads are reconciled into the store; a clean close emits
    /// [`Signal::StreamClosed`]. Fails immediately if a stream is already
    /// running on this context.
    pub async fn start_stream(&self) -> Result<(), CoreError> {
        let store = Arc::clone(&self.store);
        self.client
            .start_stream(move |event| match event {
                StreamEvent::Put(payload) => {
                    store.reconcile(&payload);
                }
                StreamEvent::Closed => store.notify_stream_closed(),
                StreamEvent::AuthRevoked => warn!("token revoked; stream will be rejected on restart"),
                StreamEvent::KeepAlive => {}
                StreamEvent::Other { kind } => debug!(%kind, "ignoring event"),
            })
            .await?;
        Ok(())
    }

    pub fn is_streaming(&self) -> bool {
        self.client.is_streaming()
    }

    // ── Mutations ────────────────────────────────────────────────────

    pub async fn mutate(
        &self,
        target: &EntityRef,
        field: &str,
        value: &Value,
    ) -> Result<String, CoreError> {
        Ok(self.client.mutate(target, field, value).await?)
    }

    /// Write one field of a cached device, resolving its device type from
    /// the store.
    pub async fn set_device_field(
        &self,
        device_id: &str,
        field: &str,
        value: &Value,
    ) -> Result<String, CoreError> {
        let target = self
            .store
            .locate_device(device_id)
            .ok_or_else(|| CoreError::DeviceNotFound {
                identifier: device_id.into(),
            })?;
        self.mutate(&target, field, value).await
    }

    // ── Signals ──────────────────────────────────────────────────────

    pub fn subscribe<F>(&self, kind: SignalKind, callback: F) -> SubscriptionId
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        self.store.subscribe(kind, callback)
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.store.unsubscribe(id)
    }
}
