// ── Device/structure store ──
//
// Two-level cache kept in sync with upstream `put` snapshots, with
// hydrated/update signalling to subscribers.

mod data_store;
mod reconcile;

pub use data_store::DataStore;
