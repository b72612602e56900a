use std::sync::Arc;

use rentcart_ids::ProjectId;
use rentcart_store::{
    DirBackend, KvBackend, MemoryBackend, PersistentStore, StorageError, StorageScope,
    StoreConfig, FORMAT_VERSION,
};
use serde_json::{json, Value};
use tempfile::TempDir;

fn project(id: &str) -> StorageScope {
    StorageScope::Project(ProjectId::parse(id).unwrap())
}

fn raw_record(saved_at: &str, pad: usize) -> String {
    json!({
        "formatVersion": "1.0",
        "savedAt": saved_at,
        "configSnapshot": {},
        "payload": {"items": {}, "pad": "x".repeat(pad)}
    })
    .to_string()
}

#[test]
fn test_saved_payload_loads_back_equal() {
    let backend = Arc::new(MemoryBackend::new());
    let store = PersistentStore::new(backend, StoreConfig::default(), "booking", &project("42"));

    let payload = json!({
        "items": {
            "CAM_SN-1": {"equipmentId": "CAM", "serialNumber": "SN-1", "isUniqueUnit": true, "quantity": 1},
            "CABLE": {"equipmentId": "CABLE", "quantity": 12, "dailyRate": 2.5}
        },
        "savedAt": "2024-05-01T09:00:00Z"
    });
    let snapshot = json!({"selectionType": "booking", "maxItems": 100});
    store.save(snapshot.clone(), payload.clone()).unwrap();

    let record = store.load().unwrap();
    assert_eq!(record.format_version, FORMAT_VERSION);
    assert_eq!(record.payload, payload);
    assert_eq!(record.config_snapshot, snapshot);
}

#[test]
fn test_scopes_do_not_share_records() {
    let backend = Arc::new(MemoryBackend::new());
    let a = PersistentStore::new(backend.clone(), StoreConfig::default(), "booking", &project("1"));
    let b = PersistentStore::new(backend.clone(), StoreConfig::default(), "booking", &project("2"));
    let global =
        PersistentStore::new(backend, StoreConfig::default(), "booking", &StorageScope::Global);

    a.save(json!({}), json!({"items": {"A": {"equipmentId": "A"}}})).unwrap();
    assert!(b.load().is_none());
    assert!(global.load().is_none());
    assert!(a.load().is_some());

    let info = global.storage_info();
    assert_eq!(info.record_count, 1);
    assert_eq!(info.record_bytes, 0);
}

#[test]
fn test_quota_evicts_oldest_foreign_record() {
    let key_a = "rentcart_booking_old";
    let key_b = "rentcart_booking_newer";
    let raw_a = raw_record("2024-01-01T00:00:00Z", 1000);
    let raw_b = raw_record("2024-02-01T00:00:00Z", 1000);
    let quota = key_a.len() + raw_a.len() + key_b.len() + raw_b.len() + 300;

    let backend = Arc::new(MemoryBackend::with_quota(quota));
    backend.set(key_a, &raw_a).unwrap();
    backend.set(key_b, &raw_b).unwrap();
    let store = PersistentStore::new(
        backend.clone(),
        StoreConfig::default(),
        "booking",
        &StorageScope::Global,
    );

    let payload = json!({"items": {}, "pad": "y".repeat(1000)});
    let err = store.save(json!({}), payload.clone()).unwrap_err();
    assert!(matches!(err, StorageError::QuotaExceeded { evicted: 1 }));
    assert!(err.is_retryable());

    assert!(backend.get(key_a).unwrap().is_none());
    assert!(backend.get(key_b).unwrap().is_some());
    assert!(backend.get("rentcart__probe").unwrap().is_none());

    store.save(json!({}), payload.clone()).unwrap();
    assert_eq!(store.load().unwrap().payload, payload);
}

#[test]
fn test_growing_own_record_evicts_only_what_it_needs() {
    let own_key = "rentcart_booking_global";
    let key_a = "rentcart_booking_old";
    let key_b = "rentcart_booking_newer";
    let own = raw_record("2024-03-01T00:00:00Z", 1000);
    let raw_a = raw_record("2024-01-01T00:00:00Z", 400);
    let raw_b = raw_record("2024-02-01T00:00:00Z", 400);
    let quota =
        own_key.len() + own.len() + key_a.len() + raw_a.len() + key_b.len() + raw_b.len() + 50;

    let backend = Arc::new(MemoryBackend::with_quota(quota));
    backend.set(own_key, &own).unwrap();
    backend.set(key_a, &raw_a).unwrap();
    backend.set(key_b, &raw_b).unwrap();
    let store = PersistentStore::new(
        backend.clone(),
        StoreConfig::default(),
        "booking",
        &StorageScope::Global,
    );

    // About 100 bytes more than the stored record.
    let payload = json!({"items": {}, "pad": "y".repeat(1100)});
    let err = store.save(json!({}), payload.clone()).unwrap_err();
    assert!(matches!(err, StorageError::QuotaExceeded { evicted: 1 }));

    assert!(backend.get(key_a).unwrap().is_none());
    assert!(backend.get(key_b).unwrap().is_some());
    assert!(backend.get("rentcart__probe").unwrap().is_none());

    store.save(json!({}), payload.clone()).unwrap();
    assert_eq!(store.load().unwrap().payload, payload);
    assert!(backend.get(key_b).unwrap().is_some());
}

#[test]
fn test_quota_with_nothing_to_evict_is_not_retryable() {
    let backend = Arc::new(MemoryBackend::with_quota(64));
    let store =
        PersistentStore::new(backend, StoreConfig::default(), "booking", &StorageScope::Global);

    let err = store
        .save(json!({}), json!({"items": {}, "pad": "z".repeat(200)}))
        .unwrap_err();
    assert!(matches!(err, StorageError::QuotaExceeded { evicted: 0 }));
    assert!(!err.is_retryable());
}

#[test]
fn test_legacy_record_is_migrated_and_rewritten() {
    let backend = Arc::new(MemoryBackend::new());
    let key = "rentcart_scan_global";
    backend
        .set(
            key,
            &json!({
                "formatVersion": "0.9",
                "savedAt": "2023-11-20T08:00:00Z",
                "payload": {"savedAt": "2023-11-20T08:00:00Z", "note": "kept"}
            })
            .to_string(),
        )
        .unwrap();

    let store =
        PersistentStore::new(backend.clone(), StoreConfig::default(), "scan", &StorageScope::Global);
    let record = store.load().unwrap();
    assert_eq!(record.format_version, FORMAT_VERSION);
    assert_eq!(record.payload["items"], json!({}));
    assert_eq!(record.payload["note"], "kept");

    let rewritten: Value = serde_json::from_str(&backend.get(key).unwrap().unwrap()).unwrap();
    assert_eq!(rewritten["formatVersion"], FORMAT_VERSION);
}

#[test]
fn test_unmigratable_and_malformed_records_are_wiped() {
    let backend = Arc::new(MemoryBackend::new());
    let store = PersistentStore::new(
        backend.clone(),
        StoreConfig::default(),
        "booking",
        &StorageScope::Global,
    );
    let key = store.key().to_string();

    backend
        .set(
            &key,
            &json!({"formatVersion": "0.5", "savedAt": "2023-01-01T00:00:00Z", "payload": {"items": [1, 2]}})
                .to_string(),
        )
        .unwrap();
    assert!(store.load().is_none());
    assert!(backend.get(&key).unwrap().is_none());

    backend.set(&key, "{not json").unwrap();
    assert!(store.load().is_none());
    assert!(backend.get(&key).unwrap().is_none());
}

#[test]
fn test_dir_backend_survives_new_store_instances() {
    let temp = TempDir::new().unwrap();
    let scope = project("proj/7");

    let first = PersistentStore::new(
        Arc::new(DirBackend::new(temp.path())),
        StoreConfig::default(),
        "booking",
        &scope,
    );
    first
        .save(json!({}), json!({"items": {"LENS": {"equipmentId": "LENS", "quantity": 3}}}))
        .unwrap();

    let second = PersistentStore::new(
        Arc::new(DirBackend::new(temp.path())),
        StoreConfig::default(),
        "booking",
        &scope,
    );
    let record = second.load().unwrap();
    assert_eq!(record.payload["items"]["LENS"]["quantity"], 3);

    second.clear().unwrap();
    let backend = DirBackend::new(temp.path());
    assert!(backend.keys().unwrap().is_empty());
}

#[test]
fn test_compressed_records_round_trip_through_disk() {
    let temp = TempDir::new().unwrap();
    let backend = Arc::new(DirBackend::new(temp.path()));
    let config = StoreConfig {
        max_size_bytes: 2048,
        compress: true,
        ..StoreConfig::default()
    };
    let store = PersistentStore::new(backend.clone(), config, "booking", &StorageScope::Global);

    let payload = json!({"items": {}, "notes": "repeat ".repeat(1000)});
    let written = store.save(json!({}), payload.clone()).unwrap();
    assert!(written <= 2048);

    let raw = backend.get(store.key()).unwrap().unwrap();
    assert!(raw.starts_with("deflate:"));
    assert_eq!(store.load().unwrap().payload, payload);
}
