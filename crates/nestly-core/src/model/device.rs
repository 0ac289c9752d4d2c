use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Fields;

/// Field stamped onto every cached device naming its device-type bucket.
pub const DEVICE_TYPE_FIELD: &str = "_deviceType";

/// One device as last reported upstream, tagged with its bucket.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceRecord(Fields);

impl DeviceRecord {
    /// Build a record from upstream fields and stamp the device-type tag.
    pub fn new(device_type: &str, fields: Fields) -> Self {
        let mut record = Self(fields);
        record.stamp(device_type);
        record
    }

    pub fn device_type(&self) -> Option<&str> {
        self.0.get(DEVICE_TYPE_FIELD).and_then(Value::as_str)
    }

    /// Upstream `device_id` field, when present.
    pub fn device_id(&self) -> Option<&str> {
        self.0.get("device_id").and_then(Value::as_str)
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Fields {
        &self.0
    }

    /// Overlay upstream fields: upstream wins per field, fields it omits
    /// are kept.
    pub(crate) fn merge_from(&mut self, upstream: &Fields, device_type: &str) {
        for (field, value) in upstream {
            self.0.insert(field.clone(), value.clone());
        }
        self.stamp(device_type);
    }

    fn stamp(&mut self, device_type: &str) {
        self.0.insert(
            DEVICE_TYPE_FIELD.to_owned(),
            Value::String(device_type.to_owned()),
        );
    }
}

// ── Name lookup ──────────────────────────────────────────────────────

/// Three-way result of a lookup by display name.
#[derive(Debug, Clone, PartialEq)]
pub enum NameLookup {
    None,
    One(DeviceRecord),
    /// Several devices share the name, in cache order.
    Many(Vec<DeviceRecord>),
}

impl NameLookup {
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    pub fn into_vec(self) -> Vec<DeviceRecord> {
        match self {
            Self::None => Vec::new(),
            Self::One(record) => vec![record],
            Self::Many(records) => records,
        }
    }
}

impl From<Vec<DeviceRecord>> for NameLookup {
    fn from(mut matches: Vec<DeviceRecord>) -> Self {
        match matches.len() {
            0 => Self::None,
            1 => matches.pop().map_or(Self::None, Self::One),
            _ => Self::Many(matches),
        }
    }
}
