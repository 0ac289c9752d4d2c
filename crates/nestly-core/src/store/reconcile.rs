// ── Snapshot reconciliation ──
//
// Pure merge of one upstream `put` payload into the local caches. After a
// merge the cache holds exactly the ids present upstream; fields of
// surviving devices are overlaid, structures are replaced wholesale.

use serde_json::Value;
use tracing::{debug, warn};

use crate::model::{DeviceCache, DeviceRecord, StructureCache, StructureRecord};

const DEVICES_PATH: &str = "/data/devices";
const STRUCTURES_PATH: &str = "/data/structures";

/// Which containers a payload carried.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub(super) struct Applied {
    pub devices: bool,
    pub structures: bool,
}

pub(super) fn apply(devices: &mut DeviceCache, structures: &mut StructureCache, payload: &Value) -> Applied {
    let applied = Applied {
        devices: merge_devices(devices, payload),
        structures: merge_structures(structures, payload),
    };
    debug!(
        devices = applied.devices,
        structures = applied.structures,
        "payload reconciled"
    );
    applied
}

/// Merge `data.devices`. Returns `false` when the payload has no device
/// container, in which case the cache is untouched.
pub(super) fn merge_devices(cache: &mut DeviceCache, payload: &Value) -> bool {
    let Some(container) = payload.pointer(DEVICES_PATH) else {
        return false;
    };
    let Some(container) = container.as_object() else {
        warn!("devices container is not an object, ignoring it");
        return false;
    };

    if container.is_empty() {
        cache.clear();
        return true;
    }

    // Buckets absent upstream (or malformed) go first.
    cache.retain(|device_type, _| container.get(device_type).is_some_and(Value::is_object));

    for (device_type, bucket) in container {
        let Some(bucket) = bucket.as_object() else {
            warn!(%device_type, "device bucket is not an object, dropping it");
            continue;
        };

        let local = cache.entry(device_type.clone()).or_default();
        local.retain(|device_id, _| bucket.get(device_id).is_some_and(Value::is_object));

        for (device_id, fields) in bucket {
            let Some(fields) = fields.as_object() else {
                warn!(%device_type, %device_id, "device entry is not an object, ignoring it");
                continue;
            };
            match local.get_mut(device_id) {
                Some(record) => record.merge_from(fields, device_type),
                None => {
                    local.insert(device_id.clone(), DeviceRecord::new(device_type, fields.clone()));
                }
            }
        }
    }

    cache.retain(|_, bucket| !bucket.is_empty());
    true
}

/// Merge `data.structures`. Same presence rule as devices, one level deep.
pub(super) fn merge_structures(cache: &mut StructureCache, payload: &Value) -> bool {
    let Some(container) = payload.pointer(STRUCTURES_PATH) else {
        return false;
    };
    let Some(container) = container.as_object() else {
        warn!("structures container is not an object, ignoring it");
        return false;
    };

    cache.retain(|structure_id, _| container.get(structure_id).is_some_and(Value::is_object));

    for (structure_id, fields) in container {
        let Some(fields) = fields.as_object() else {
            warn!(%structure_id, "structure entry is not an object, ignoring it");
            continue;
        };
        cache.insert(structure_id.clone(), StructureRecord::new(fields.clone()));
    }
    true
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::model::DEVICE_TYPE_FIELD;

    fn put(data: Value) -> Value {
        json!({ "path": "/", "data": data })
    }

    fn seeded() -> DeviceCache {
        let mut cache = DeviceCache::new();
        merge_devices(
            &mut cache,
            &put(json!({
                "devices": {
                    "thermostats": {
                        "A": { "name": "Hallway", "target_temperature_f": 70, "locale": "en-US" },
                        "B": { "name": "Den", "target_temperature_f": 68 }
                    },
                    "smoke_co_alarms": {
                        "S": { "name": "Kitchen", "battery_health": "ok" }
                    }
                }
            })),
        );
        cache
    }

    #[test]
    fn insert_into_empty_cache_stamps_type() {
        let mut cache = DeviceCache::new();
        let applied = merge_devices(
            &mut cache,
            &put(json!({ "devices": { "thermostats": { "A": { "name": "Hallway" } } } })),
        );

        assert!(applied);
        let record = &cache["thermostats"]["A"];
        assert_eq!(record.get(DEVICE_TYPE_FIELD), Some(&json!("thermostats")));
        assert_eq!(record.name(), Some("Hallway"));
    }

    #[test]
    fn empty_bucket_removes_it() {
        let mut cache = seeded();
        merge_devices(
            &mut cache,
            &put(json!({
                "devices": {
                    "thermostats": {},
                    "smoke_co_alarms": { "S": { "name": "Kitchen" } }
                }
            })),
        );

        assert!(!cache.contains_key("thermostats"));
        assert!(cache.contains_key("smoke_co_alarms"));
    }

    #[test]
    fn empty_container_clears_everything() {
        let mut cache = seeded();
        assert!(merge_devices(&mut cache, &put(json!({ "devices": {} }))));
        assert!(cache.is_empty());
    }

    #[test]
    fn missing_container_leaves_cache_alone() {
        let mut cache = seeded();
        let before = cache.clone();

        assert!(!merge_devices(&mut cache, &put(json!({ "structures": {} }))));
        assert!(!merge_devices(&mut cache, &json!({ "path": "/" })));
        assert_eq!(cache, before);
    }

    #[test]
    fn merge_overlays_fields_and_drops_vanished_ids() {
        let mut cache = seeded();
        merge_devices(
            &mut cache,
            &put(json!({
                "devices": {
                    "thermostats": { "A": { "target_temperature_f": 72 } },
                    "smoke_co_alarms": { "S": { "battery_health": "replace" } }
                }
            })),
        );

        let hallway = &cache["thermostats"]["A"];
        assert_eq!(hallway.get("target_temperature_f"), Some(&json!(72)));
        assert_eq!(hallway.get("locale"), Some(&json!("en-US")));
        assert_eq!(hallway.name(), Some("Hallway"));
        assert!(!cache["thermostats"].contains_key("B"));
        assert_eq!(
            cache["smoke_co_alarms"]["S"].get("battery_health"),
            Some(&json!("replace"))
        );
    }

    #[test]
    fn bucket_absent_upstream_is_removed() {
        let mut cache = seeded();
        merge_devices(
            &mut cache,
            &put(json!({ "devices": { "thermostats": { "A": {}, "B": {} } } })),
        );

        assert_eq!(cache.keys().collect::<Vec<_>>(), vec!["thermostats"]);
        assert_eq!(cache["thermostats"].len(), 2);
    }

    #[test]
    fn new_bucket_is_created() {
        let mut cache = seeded();
        merge_devices(
            &mut cache,
            &put(json!({
                "devices": {
                    "thermostats": { "A": {} },
                    "cameras": { "C": { "name": "Porch", "is_streaming": true } }
                }
            })),
        );

        assert_eq!(cache["cameras"]["C"].device_type(), Some("cameras"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn malformed_entries_are_treated_as_absent() {
        let mut cache = seeded();
        merge_devices(
            &mut cache,
            &put(json!({
                "devices": {
                    "thermostats": { "A": "not-an-object", "B": { "name": "Den" } },
                    "smoke_co_alarms": 42
                }
            })),
        );

        assert_eq!(cache.keys().collect::<Vec<_>>(), vec!["thermostats"]);
        assert!(!cache["thermostats"].contains_key("A"));
        assert!(cache["thermostats"].contains_key("B"));
    }

    #[test]
    fn bucket_of_only_malformed_entries_is_pruned() {
        let mut cache = seeded();
        merge_devices(
            &mut cache,
            &put(json!({ "devices": { "thermostats": { "A": null } } })),
        );
        assert!(cache.is_empty());
    }

    #[test]
    fn structures_are_replaced_wholesale() {
        let mut cache = StructureCache::new();
        merge_structures(
            &mut cache,
            &put(json!({
                "structures": {
                    "home": { "name": "Home", "away": "home", "postal_code": "94304" },
                    "cabin": { "name": "Cabin", "away": "away" }
                }
            })),
        );
        merge_structures(
            &mut cache,
            &put(json!({ "structures": { "home": { "name": "Home", "away": "away" } } })),
        );

        assert_eq!(cache.len(), 1);
        let home = &cache["home"];
        assert_eq!(home.away(), Some("away"));
        assert_eq!(home.get("postal_code"), None);
    }

    #[test]
    fn apply_reports_containers() {
        let mut devices = DeviceCache::new();
        let mut structures = StructureCache::new();

        let applied = apply(
            &mut devices,
            &mut structures,
            &put(json!({ "structures": { "home": { "name": "Home" } } })),
        );
        assert_eq!(
            applied,
            Applied {
                devices: false,
                structures: true
            }
        );
        assert!(devices.is_empty());
        assert_eq!(structures.len(), 1);
    }
}
