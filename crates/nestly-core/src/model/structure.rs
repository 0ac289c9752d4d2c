use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Fields;

/// One structure (home) as last reported upstream. Replaced wholesale on
/// every reconciliation that mentions it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StructureRecord(Fields);

impl StructureRecord {
    pub fn new(fields: Fields) -> Self {
        Self(fields)
    }

    pub fn name(&self) -> Option<&str> {
        self.0.get("name").and_then(Value::as_str)
    }

    /// `home` / `away` / `auto-away`, as reported.
    pub fn away(&self) -> Option<&str> {
        self.0.get("away").and_then(Value::as_str)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.0.get(field)
    }

    pub fn fields(&self) -> &Fields {
        &self.0
    }
}
