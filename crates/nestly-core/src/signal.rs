// ── Signal registry ──
//
// Ordered publish/subscribe for store signals. Delivery is synchronous,
// in registration order, on the thread that emits.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use strum::{AsRefStr, Display, EnumString};

use crate::model::Snapshot;

/// Names a signal family for subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString, AsRefStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SignalKind {
    Hydrated,
    Update,
    StreamClosed,
}

/// A signal as delivered to subscribers.
#[derive(Debug, Clone)]
pub enum Signal {
    /// First successful reconciliation since construction or reset.
    Hydrated(Arc<Snapshot>),
    /// Every later reconciliation.
    Update(Arc<Snapshot>),
    /// The event stream ended without error.
    StreamClosed,
}

impl Signal {
    pub fn kind(&self) -> SignalKind {
        match self {
            Self::Hydrated(_) => SignalKind::Hydrated,
            Self::Update(_) => SignalKind::Update,
            Self::StreamClosed => SignalKind::StreamClosed,
        }
    }

    pub fn snapshot(&self) -> Option<&Arc<Snapshot>> {
        match self {
            Self::Hydrated(snapshot) | Self::Update(snapshot) => Some(snapshot),
            Self::StreamClosed => None,
        }
    }
}

/// Opaque handle returned by `subscribe`, consumed by `unsubscribe`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

pub(crate) type Handler = Arc<dyn Fn(&Signal) + Send + Sync>;

struct Registration {
    id: SubscriptionId,
    kind: SignalKind,
    handler: Handler,
}

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    registrations: Vec<Registration>,
}

/// Callbacks keyed by signal kind, kept in registration order.
#[derive(Default)]
pub(crate) struct SignalRegistry {
    inner: Mutex<RegistryInner>,
}

impl SignalRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, RegistryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn register(&self, kind: SignalKind, handler: Handler) -> SubscriptionId {
        let mut inner = self.lock();
        inner.next_id += 1;
        let id = SubscriptionId(inner.next_id);
        inner.registrations.push(Registration { id, kind, handler });
        id
    }

    /// Returns `false` if the id was unknown or already removed.
    pub(crate) fn remove(&self, id: SubscriptionId) -> bool {
        let mut inner = self.lock();
        let before = inner.registrations.len();
        inner.registrations.retain(|r| r.id != id);
        inner.registrations.len() != before
    }

    /// Handlers for `kind`, cloned out so they run without the lock held.
    pub(crate) fn handlers(&self, kind: SignalKind) -> Vec<Handler> {
        self.lock()
            .registrations
            .iter()
            .filter(|r| r.kind == kind)
            .map(|r| Arc::clone(&r.handler))
            .collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.lock()
            .registrations
            .len()
    }
}

/// Run each handler in order.
pub(crate) fn deliver(handlers: &[Handler], signal: &Signal) {
    for handler in handlers {
        handler(signal);
    }
}
