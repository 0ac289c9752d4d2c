// ── Central device/structure store ──
//
// Caches live behind one RwLock. `reconcile` merges under the write lock,
// copies the result, releases the lock, then runs subscribers, so a
// callback may freely query the store or (un)subscribe.

use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use nestly_api::EntityRef;
use serde_json::Value;
use tokio::sync::watch;
use tracing::{debug, info};

use super::reconcile;
use crate::model::{DeviceCache, DeviceRecord, NameLookup, Snapshot, StructureCache, StructureRecord};
use crate::signal::{Handler, Signal, SignalKind, SignalRegistry, SubscriptionId, deliver};

#[derive(Default)]
struct Caches {
    devices: DeviceCache,
    structures: StructureCache,
    hydrated: bool,
}

impl Caches {
    fn snapshot(&self) -> Snapshot {
        Snapshot {
            devices: self.devices.clone(),
            structures: self.structures.clone(),
        }
    }
}

/// Local mirror of upstream devices and structures.
///
/// Thread-safe. Every query returns owned copies; nothing handed out can
/// reach back into the cache.
pub struct DataStore {
    state: RwLock<Caches>,
    signals: SignalRegistry,
    /// Latest snapshot, `None` until hydrated.
    latest: watch::Sender<Option<Arc<Snapshot>>>,
}

impl Default for DataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DataStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataStore")
            .field("hydrated", &self.is_hydrated())
            .field("devices", &self.device_count())
            .field("structures", &self.structure_count())
            .finish_non_exhaustive()
    }
}

impl DataStore {
    pub fn new() -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            state: RwLock::new(Caches::default()),
            signals: SignalRegistry::new(),
            latest,
        }
    }

    // A poisoned lock is recovered: the next `put` reconciles the caches
    // back to the upstream state.
    fn read(&self) -> RwLockReadGuard<'_, Caches> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Caches> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Reconciliation ───────────────────────────────────────────────

    /// Merge one `put` payload and notify subscribers.
    ///
    /// The first call since construction (or [`reset`](Self::reset))
    /// emits [`Signal::Hydrated`]; every later call emits
    /// [`Signal::Update`]. Returns the kind emitted.
    pub fn reconcile(&self, payload: &Value) -> SignalKind {
        let (signal, handlers) = {
            let mut state = self.write();
            let caches = &mut *state;
            reconcile::apply(&mut caches.devices, &mut caches.structures, payload);

            let first = !state.hydrated;
            state.hydrated = true;

            let snapshot = Arc::new(state.snapshot());
            self.latest.send_replace(Some(Arc::clone(&snapshot)));

            let signal = if first {
                Signal::Hydrated(snapshot)
            } else {
                Signal::Update(snapshot)
            };
            // Collected under the state lock so a concurrent Hydrated
            // subscriber is either in this list or replayed, never both.
            let handlers = self.signals.handlers(signal.kind());
            (signal, handlers)
        };

        let kind = signal.kind();
        if kind == SignalKind::Hydrated {
            info!(
                devices = self.device_count(),
                structures = self.structure_count(),
                "cache hydrated"
            );
        }
        debug!(signal = %kind, subscribers = handlers.len(), "emitting");
        deliver(&handlers, &signal);
        kind
    }

    /// Tell subscribers the event stream ended.
    pub fn notify_stream_closed(&self) {
        let handlers = self.signals.handlers(SignalKind::StreamClosed);
        debug!(subscribers = handlers.len(), "emitting stream_closed");
        deliver(&handlers, &Signal::StreamClosed);
    }

    /// Drop both caches and the hydrated flag. The next reconcile emits
    /// `Hydrated` again. Subscriptions are kept.
    pub fn reset(&self) {
        *self.write() = Caches::default();
        self.latest.send_replace(None);
        debug!("store reset");
    }

    // ── Subscriptions ────────────────────────────────────────────────

    /// Register `callback` for `kind`.
    ///
    /// Subscribing to [`SignalKind::Hydrated`] once the store is already
    /// hydrated invokes the callback immediately, before this returns,
    /// with the current snapshot.
    pub fn subscribe<F>(&self, kind: SignalKind, callback: F) -> SubscriptionId
    where
        F: Fn(&Signal) + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(callback);
        let (id, replay) = {
            let state = self.read();
            let id = self.signals.register(kind, Arc::clone(&handler));
            let replay = (kind == SignalKind::Hydrated && state.hydrated)
                .then(|| Signal::Hydrated(Arc::new(state.snapshot())));
            (id, replay)
        };

        if let Some(signal) = replay {
            debug!(?id, "replaying hydrated to late subscriber");
            handler(&signal);
        }
        id
    }

    /// Returns `false` if `id` was not registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.signals.remove(id)
    }

    pub fn subscriber_count(&self) -> usize {
        self.signals.len()
    }

    /// Watch the latest snapshot. Holds `None` until hydrated and after
    /// a reset.
    pub fn watch(&self) -> watch::Receiver<Option<Arc<Snapshot>>> {
        self.latest.subscribe()
    }

    // ── Queries ──────────────────────────────────────────────────────

    pub fn is_hydrated(&self) -> bool {
        self.read().hydrated
    }

    pub fn snapshot(&self) -> Snapshot {
        self.read().snapshot()
    }

    pub fn all_devices(&self) -> DeviceCache {
        self.read().devices.clone()
    }

    pub fn all_structures(&self) -> StructureCache {
        self.read().structures.clone()
    }

    /// Scan every bucket for `device_id`.
    pub fn device_by_id(&self, device_id: &str) -> Option<DeviceRecord> {
        let state = self.read();
        state
            .devices
            .values()
            .find_map(|bucket| bucket.get(device_id))
            .cloned()
    }

    /// Every device whose `name` equals `name`, in bucket then id order.
    pub fn devices_by_name(&self, name: &str) -> Vec<DeviceRecord> {
        let state = self.read();
        state
            .devices
            .values()
            .flat_map(|bucket| bucket.values())
            .filter(|record| record.name() == Some(name))
            .cloned()
            .collect()
    }

    /// Name lookup in the none / one / many shape.
    pub fn device_by_name(&self, name: &str) -> NameLookup {
        NameLookup::from(self.devices_by_name(name))
    }

    /// Mutation address of a cached device.
    pub fn locate_device(&self, device_id: &str) -> Option<EntityRef> {
        let state = self.read();
        state
            .devices
            .iter()
            .find(|(_, bucket)| bucket.contains_key(device_id))
            .map(|(device_type, _)| EntityRef::new(device_type.as_str(), device_id))
    }

    pub fn structure_by_id(&self, structure_id: &str) -> Option<StructureRecord> {
        self.read()
            .structures
            .get(structure_id)
            .cloned()
    }

    pub fn device_count(&self) -> usize {
        self.read()
            .devices
            .values()
            .map(std::collections::BTreeMap::len)
            .sum()
    }

    pub fn structure_count(&self) -> usize {
        self.read().structures.len()
    }
}
