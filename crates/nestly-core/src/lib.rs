//! Local mirror of Nest devices and structures on top of `nestly-api`.
//!
//! - **[`Nest`]**: explicit context object. Owns a [`NestClient`](nestly_api::NestClient)
//!   and a [`DataStore`]; [`start_stream()`](Nest::start_stream) feeds every
//!   `put` event into the store.
//!
//! - **[`DataStore`]**: two-level device cache (device type → id → record)
//!   plus a structure cache. Each reconciliation leaves exactly the upstream
//!   ids in place, overlays device fields, and replaces structures whole.
//!
//! - **Signals** ([`Signal`], [`SignalKind`]): `hydrated` once per store
//!   lifetime, `update` on every later reconciliation, `stream_closed` on a
//!   clean stream end. Delivered synchronously in registration order.

pub mod config;
pub mod error;
pub mod model;
pub mod nest;
pub mod signal;
pub mod store;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{NestConfig, TlsVerification};
pub use error::CoreError;
pub use nest::Nest;
pub use signal::{Signal, SignalKind, SubscriptionId};
pub use store::DataStore;

pub use model::{
    DEVICE_TYPE_FIELD, DeviceCache, DeviceRecord, Fields, NameLookup, Snapshot, StructureCache,
    StructureRecord,
};

pub use nestly_api::{AccessToken, EntityRef};
