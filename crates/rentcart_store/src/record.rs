//! The persisted envelope and its version handling.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Envelope version written by this build.
pub const FORMAT_VERSION: &str = "1.0";

/// Durable envelope around one selection payload.
///
/// ```json
/// { "formatVersion": "1.0", "savedAt": "...", "configSnapshot": {...},
///   "payload": { "items": {...}, "savedAt": "..." } }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageRecord {
    pub format_version: String,
    pub saved_at: DateTime<Utc>,
    #[serde(default)]
    pub config_snapshot: Value,
    pub payload: Value,
}

impl StorageRecord {
    pub fn new(config_snapshot: Value, payload: Value, saved_at: DateTime<Utc>) -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            saved_at,
            config_snapshot,
            payload,
        }
    }

    pub fn is_current(&self) -> bool {
        self.format_version == FORMAT_VERSION
    }

    /// Parse and shape-check a stored envelope.
    ///
    /// Returns `None` when `formatVersion` or `savedAt` is missing or
    /// malformed, or when `payload` is not an object.
    pub fn from_json(raw: &str) -> Option<Self> {
        let record: StorageRecord = serde_json::from_str(raw).ok()?;
        if record.format_version.trim().is_empty() || !record.payload.is_object() {
            return None;
        }
        Some(record)
    }

    /// Bring a record written by another format version up to
    /// [`FORMAT_VERSION`].
    ///
    /// Object payloads keep every sub-field as is. `items` must be an object
    /// when present and defaults to empty when absent. Anything else cannot be
    /// upgraded and yields `None`, meaning the record should be wiped.
    pub fn migrate(mut self) -> Option<Self> {
        if self.is_current() {
            return Some(self);
        }

        let payload = match self.payload {
            Value::Object(map) => map,
            _ => return None,
        };
        let payload = migrate_payload(payload)?;

        self.payload = Value::Object(payload);
        self.format_version = FORMAT_VERSION.to_string();
        Some(self)
    }
}

fn migrate_payload(mut payload: Map<String, Value>) -> Option<Map<String, Value>> {
    match payload.get("items") {
        None | Some(Value::Null) => {
            payload.insert("items".to_string(), Value::Object(Map::new()));
        }
        Some(Value::Object(_)) => {}
        Some(_) => return None,
    }
    Some(payload)
}

/// Read only the top-level `savedAt` of a stored record, for eviction order.
pub(crate) fn saved_at_of(raw: &str) -> Option<DateTime<Utc>> {
    #[derive(Deserialize)]
    #[serde(rename_all = "camelCase")]
    struct Stamp {
        saved_at: DateTime<Utc>,
    }
    serde_json::from_str::<Stamp>(raw).ok().map(|s| s.saved_at)
}
