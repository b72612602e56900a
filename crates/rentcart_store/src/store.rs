use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use chrono::{DateTime, Utc};
use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;
use rentcart_ids::ProjectId;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::backend::KvBackend;
use crate::error::{BackendError, StorageError};
use crate::record::{saved_at_of, StorageRecord};

const COMPRESSED_MARKER: &str = "deflate:";
const GLOBAL_SCOPE: &str = "global";

/// Where a selection lives: a single project or the global workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum StorageScope {
    #[default]
    Global,
    Project(ProjectId),
}

impl StorageScope {
    pub fn from_project(project: Option<ProjectId>) -> Self {
        project.map(Self::Project).unwrap_or(Self::Global)
    }

    /// Derive the scope from a navigation path such as
    /// `/projects/42/equipment`. Paths without a project segment map to the
    /// global scope.
    pub fn from_route(route: &str) -> Self {
        let mut segments = route.split(['/', '?', '#']).filter(|s| !s.is_empty());
        while let Some(segment) = segments.next() {
            if segment == "projects" || segment == "project" {
                if let Some(id) = segments.next().and_then(|s| ProjectId::parse(s).ok()) {
                    return Self::Project(id);
                }
            }
        }
        Self::Global
    }

    pub fn project(&self) -> Option<&ProjectId> {
        match self {
            Self::Global => None,
            Self::Project(id) => Some(id),
        }
    }
}

impl fmt::Display for StorageScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Global => write!(f, "{}", GLOBAL_SCOPE),
            Self::Project(id) => write!(f, "{}", id),
        }
    }
}

/// Store-wide settings shared by every selection type.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Key prefix that marks records owned by this subsystem.
    pub prefix: String,
    /// Ceiling for a single record and for aggregate usage reporting.
    pub max_size_bytes: usize,
    /// Deflate records that would otherwise exceed the ceiling.
    pub compress: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            prefix: "rentcart".to_string(),
            max_size_bytes: 5 * 1024 * 1024,
            compress: false,
        }
    }
}

/// Snapshot used by diagnostics (`rentcart info`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageInfo {
    pub available: bool,
    pub key: String,
    pub record_bytes: usize,
    pub total_bytes: usize,
    pub record_count: usize,
    pub max_bytes: usize,
    pub usage_percent: f64,
}

/// Save/load/clear of the record for one (selection type, scope) key.
#[derive(Clone)]
pub struct PersistentStore {
    backend: Arc<dyn KvBackend>,
    config: StoreConfig,
    key: String,
}

impl fmt::Debug for PersistentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistentStore")
            .field("key", &self.key)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl PersistentStore {
    pub fn new(
        backend: Arc<dyn KvBackend>,
        config: StoreConfig,
        selection_type: &str,
        scope: &StorageScope,
    ) -> Self {
        let key = format!("{}_{}_{}", config.prefix, selection_type, scope);
        Self {
            backend,
            config,
            key,
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn is_available(&self) -> bool {
        self.backend.is_available()
    }

    /// Write the envelope for `payload`. Returns the number of bytes stored.
    ///
    /// On a quota failure the oldest records under the same prefix are
    /// evicted, but the write is not repeated here; see
    /// [`StorageError::is_retryable`].
    pub fn save(&self, config_snapshot: Value, payload: Value) -> Result<usize, StorageError> {
        if !self.backend.is_available() {
            return Err(StorageError::Unavailable);
        }

        let record = StorageRecord::new(config_snapshot, payload, Utc::now());
        let encoded = self.encode(&record)?;

        match self.backend.set(&self.key, &encoded) {
            Ok(()) => {
                debug!(key = %self.key, bytes = encoded.len(), "Saved selection record");
                Ok(encoded.len())
            }
            Err(BackendError::QuotaExceeded) => {
                let evicted = self.evict_oldest(encoded.len());
                warn!(key = %self.key, evicted, "Storage quota exceeded while saving selection");
                Err(StorageError::QuotaExceeded { evicted })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Load and validate the stored record.
    ///
    /// Missing records, an unavailable backend, and undecodable records all
    /// yield `None`; invalid records are deleted. Records from another
    /// format version are migrated and written back.
    pub fn load(&self) -> Option<StorageRecord> {
        if !self.backend.is_available() {
            return None;
        }

        let raw = match self.backend.get(&self.key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return None,
            Err(err) => {
                warn!(key = %self.key, error = %err, "Failed to read selection record");
                return None;
            }
        };

        let record = match decode(&raw).ok().and_then(|json| StorageRecord::from_json(&json)) {
            Some(record) => record,
            None => {
                warn!(key = %self.key, "Discarding malformed selection record");
                self.clear_quietly();
                return None;
            }
        };

        if record.is_current() {
            return Some(record);
        }

        let from_version = record.format_version.clone();
        match record.migrate() {
            Some(migrated) => {
                info!(key = %self.key, from = %from_version, "Migrated selection record");
                if let Err(err) = self.rewrite(&migrated) {
                    warn!(key = %self.key, error = %err, "Failed to rewrite migrated record");
                }
                Some(migrated)
            }
            None => {
                warn!(key = %self.key, from = %from_version, "Selection record cannot be migrated, wiping");
                self.clear_quietly();
                None
            }
        }
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.backend.remove(&self.key)?;
        debug!(key = %self.key, "Cleared selection record");
        Ok(())
    }

    pub fn storage_info(&self) -> StorageInfo {
        let available = self.backend.is_available();
        let mut info = StorageInfo {
            available,
            key: self.key.clone(),
            record_bytes: 0,
            total_bytes: 0,
            record_count: 0,
            max_bytes: self.config.max_size_bytes,
            usage_percent: 0.0,
        };
        if !available {
            return info;
        }

        for key in self.owned_keys() {
            let Ok(Some(raw)) = self.backend.get(&key) else {
                continue;
            };
            let size = key.len() + raw.len();
            if key == self.key {
                info.record_bytes = raw.len();
            }
            info.total_bytes += size;
            info.record_count += 1;
        }
        if info.max_bytes > 0 {
            info.usage_percent =
                ((info.total_bytes as f64 / info.max_bytes as f64) * 10_000.0).round() / 100.0;
        }
        info
    }

    fn encode(&self, record: &StorageRecord) -> Result<String, StorageError> {
        let serialized = serde_json::to_string(record)?;
        let limit = self.config.max_size_bytes;
        if serialized.len() <= limit {
            return Ok(serialized);
        }
        if !self.config.compress {
            return Err(StorageError::TooLarge {
                size: serialized.len(),
                limit,
            });
        }

        let compressed = compress(&serialized)?;
        if compressed.len() > limit {
            return Err(StorageError::TooLarge {
                size: compressed.len(),
                limit,
            });
        }
        debug!(
            key = %self.key,
            raw = serialized.len(),
            compressed = compressed.len(),
            "Compressed selection record"
        );
        Ok(compressed)
    }

    fn rewrite(&self, record: &StorageRecord) -> Result<(), StorageError> {
        let encoded = self.encode(record)?;
        self.backend.set(&self.key, &encoded)?;
        Ok(())
    }

    fn clear_quietly(&self) {
        if let Err(err) = self.clear() {
            warn!(key = %self.key, error = %err, "Failed to clear selection record");
        }
    }

    fn probe_key(&self) -> String {
        format!("{}__probe", self.config.prefix)
    }

    fn owned_keys(&self) -> Vec<String> {
        let prefix = format!("{}_", self.config.prefix);
        let probe = self.probe_key();
        match self.backend.keys() {
            Ok(keys) => keys
                .into_iter()
                .filter(|k| k.starts_with(&prefix) && *k != probe)
                .collect(),
            Err(err) => {
                warn!(error = %err, "Failed to enumerate selection records");
                Vec::new()
            }
        }
    }

    /// Delete the oldest records under our prefix, never our own, until a
    /// probe write fits. The save replaces our current record, so the probe
    /// only needs the growth over it. Returns how many were deleted.
    fn evict_oldest(&self, required_bytes: usize) -> usize {
        let current_bytes = match self.backend.get(&self.key) {
            Ok(Some(raw)) => raw.len(),
            _ => 0,
        };
        let probe_bytes = required_bytes.saturating_sub(current_bytes);
        let mut candidates: Vec<(DateTime<Utc>, String)> = self
            .owned_keys()
            .into_iter()
            .filter(|k| *k != self.key)
            .map(|key| {
                // Unreadable records sort first.
                let saved_at = self
                    .backend
                    .get(&key)
                    .ok()
                    .flatten()
                    .and_then(|raw| decode(&raw).ok())
                    .and_then(|json| saved_at_of(&json))
                    .unwrap_or(DateTime::<Utc>::MIN_UTC);
                (saved_at, key)
            })
            .collect();
        candidates.sort();

        let probe_key = self.probe_key();
        let probe_value = "x".repeat(probe_bytes);
        let mut evicted = 0;
        for (saved_at, key) in candidates {
            if let Err(err) = self.backend.remove(&key) {
                warn!(key = %key, error = %err, "Failed to evict selection record");
                continue;
            }
            evicted += 1;
            info!(key = %key, saved_at = %saved_at, "Evicted selection record");

            if self.backend.set(&probe_key, &probe_value).is_ok() {
                let _ = self.backend.remove(&probe_key);
                break;
            }
        }
        evicted
    }
}

fn compress(serialized: &str) -> Result<String, StorageError> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(serialized.as_bytes())
        .map_err(|e| StorageError::Compression(e.to_string()))?;
    let bytes = encoder
        .finish()
        .map_err(|e| StorageError::Compression(e.to_string()))?;
    Ok(format!("{}{}", COMPRESSED_MARKER, BASE64.encode(bytes)))
}

fn decode(raw: &str) -> Result<String, StorageError> {
    let Some(body) = raw.strip_prefix(COMPRESSED_MARKER) else {
        return Ok(raw.to_string());
    };
    let bytes = BASE64
        .decode(body)
        .map_err(|e| StorageError::Compression(e.to_string()))?;
    let mut json = String::new();
    DeflateDecoder::new(bytes.as_slice())
        .read_to_string(&mut json)
        .map_err(|e| StorageError::Compression(e.to_string()))?;
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use serde_json::json;

    fn store_on(
        backend: Arc<MemoryBackend>,
        config: StoreConfig,
        scope: &StorageScope,
    ) -> PersistentStore {
        PersistentStore::new(backend, config, "booking", scope)
    }

    #[test]
    fn test_key_format() {
        let backend = Arc::new(MemoryBackend::new());
        let global = store_on(backend.clone(), StoreConfig::default(), &StorageScope::Global);
        assert_eq!(global.key(), "rentcart_booking_global");

        let scope = StorageScope::Project(ProjectId::parse("17").unwrap());
        let project = store_on(backend, StoreConfig::default(), &scope);
        assert_eq!(project.key(), "rentcart_booking_17");
    }

    #[test]
    fn test_scope_from_route() {
        assert_eq!(
            StorageScope::from_route("/projects/42/equipment?tab=cart"),
            StorageScope::Project(ProjectId::parse("42").unwrap())
        );
        assert_eq!(StorageScope::from_route("/equipment/search"), StorageScope::Global);
        assert_eq!(StorageScope::from_route("/projects/"), StorageScope::Global);
    }

    #[test]
    fn test_compression_roundtrip_when_over_ceiling() {
        let backend = Arc::new(MemoryBackend::new());
        let config = StoreConfig {
            max_size_bytes: 400,
            compress: true,
            ..StoreConfig::default()
        };
        let store = store_on(backend.clone(), config, &StorageScope::Global);
        let payload = json!({"items": {}, "padding": "a".repeat(1000)});

        store.save(Value::Null, payload.clone()).unwrap();
        let raw = backend.get(store.key()).unwrap().unwrap();
        assert!(raw.starts_with(COMPRESSED_MARKER));

        let record = store.load().unwrap();
        assert_eq!(record.payload, payload);
    }

    #[test]
    fn test_too_large_without_compression() {
        let backend = Arc::new(MemoryBackend::new());
        let config = StoreConfig {
            max_size_bytes: 64,
            ..StoreConfig::default()
        };
        let store = store_on(backend, config, &StorageScope::Global);
        let err = store
            .save(Value::Null, json!({"items": {}, "padding": "a".repeat(100)}))
            .unwrap_err();
        assert!(matches!(err, StorageError::TooLarge { limit: 64, .. }));
    }

    #[test]
    fn test_unavailable_backend_degrades() {
        let backend = Arc::new(MemoryBackend::new());
        let store = store_on(backend.clone(), StoreConfig::default(), &StorageScope::Global);
        backend.set_available(false);

        assert!(matches!(
            store.save(Value::Null, json!({"items": {}})),
            Err(StorageError::Unavailable)
        ));
        assert!(store.load().is_none());
        assert!(!store.storage_info().available);
    }

    #[test]
    fn test_storage_info_aggregates_prefix_only() {
        let backend = Arc::new(MemoryBackend::new());
        backend.set("unrelated", "ignored").unwrap();
        let a = store_on(backend.clone(), StoreConfig::default(), &StorageScope::Global);
        let b = store_on(
            backend.clone(),
            StoreConfig::default(),
            &StorageScope::Project(ProjectId::parse("9").unwrap()),
        );
        a.save(Value::Null, json!({"items": {}})).unwrap();
        b.save(Value::Null, json!({"items": {}})).unwrap();

        let info = a.storage_info();
        assert!(info.available);
        assert_eq!(info.record_count, 2);
        assert!(info.record_bytes > 0);
        assert!(info.total_bytes > info.record_bytes);
        assert!(info.usage_percent > 0.0);
    }
}
