// ── Domain model ──
//
// Records are field maps exactly as the API sends them; the SDK does not
// impose a schema on device or structure fields beyond the device-type tag.

pub mod device;
pub mod snapshot;
pub mod structure;

pub use device::{DEVICE_TYPE_FIELD, DeviceRecord, NameLookup};
pub use snapshot::{DeviceCache, Snapshot, StructureCache};
pub use structure::StructureRecord;

/// Raw field map of one record.
pub type Fields = serde_json::Map<String, serde_json::Value>;
