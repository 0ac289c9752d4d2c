use std::collections::BTreeMap;

use serde::Serialize;

use super::{DeviceRecord, StructureRecord};

/// device type → (device id → record). A bucket exists iff it holds at
/// least one device.
pub type DeviceCache = BTreeMap<String, BTreeMap<String, DeviceRecord>>;

/// structure id → record.
pub type StructureCache = BTreeMap<String, StructureRecord>;

/// Owned copy of both caches at one instant.
///
/// Snapshots never alias the store's internal state.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub devices: DeviceCache,
    pub structures: StructureCache,
}

impl Snapshot {
    pub fn device_count(&self) -> usize {
        self.devices.values().map(BTreeMap::len).sum()
    }

    pub fn structure_count(&self) -> usize {
        self.structures.len()
    }

    /// Every cached device as `(device_type, device_id, record)`, in bucket
    /// then id order.
    pub fn iter_devices(&self) -> impl Iterator<Item = (&str, &str, &DeviceRecord)> {
        self.devices.iter().flat_map(|(device_type, bucket)| {
            bucket
                .iter()
                .map(move |(id, record)| (device_type.as_str(), id.as_str(), record))
        })
    }

    pub fn device_by_id(&self, device_id: &str) -> Option<&DeviceRecord> {
        self.devices.values().find_map(|bucket| bucket.get(device_id))
    }

    pub fn devices_by_name(&self, name: &str) -> Vec<&DeviceRecord> {
        self.iter_devices()
            .filter(|(_, _, record)| record.name() == Some(name))
            .map(|(_, _, record)| record)
            .collect()
    }
}
