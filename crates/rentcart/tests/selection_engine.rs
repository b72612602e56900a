use std::sync::{Arc, Mutex};

use rentcart::{
    EventKind, ItemCandidate, ItemKey, SelectionConfig, SelectionEngine, SelectionError,
    SelectionEvent,
};
use rentcart_ids::ProjectId;
use rentcart_store::{KvBackend, MemoryBackend, PersistentStore, StorageScope, StoreConfig};
use rust_decimal::Decimal;

fn scoped_engine(backend: &Arc<MemoryBackend>, scope: &StorageScope) -> SelectionEngine {
    let config = SelectionConfig::booking_cart();
    let store = PersistentStore::new(
        backend.clone(),
        StoreConfig::default(),
        config.selection_type(),
        scope,
    );
    SelectionEngine::with_store(config, store)
}

fn project(id: &str) -> StorageScope {
    StorageScope::Project(ProjectId::parse(id).unwrap())
}

fn fungible(id: &str) -> ItemKey {
    ItemKey::fungible(id.parse().unwrap())
}

#[test]
fn test_fungible_picks_accumulate_across_sources() {
    let mut engine = SelectionEngine::new(SelectionConfig::ephemeral());
    // Search result, catalog row and a quantity stepper all add the same id.
    engine.add_item(ItemCandidate::new("XLR-10", "XLR cable 10m")).unwrap();
    engine
        .add_item(ItemCandidate::new("XLR-10", "XLR cable 10m").quantity(5))
        .unwrap();
    engine
        .add_item(ItemCandidate::new("XLR-10", "XLR cable 10m").quantity(2))
        .unwrap();

    assert_eq!(engine.item_count(), 1);
    assert_eq!(engine.item(&fungible("XLR-10")).unwrap().quantity, 8);
}

#[test]
fn test_scanned_units_are_distinct_entries() {
    let mut engine = SelectionEngine::new(SelectionConfig::scan_session());
    for serial in ["A1", "A2", "A3"] {
        engine
            .add_item(ItemCandidate::unit("ALEXA", "Alexa Mini LF", serial))
            .unwrap();
    }
    engine
        .add_item(ItemCandidate::unit("ALEXA", "Alexa Mini LF", "A2"))
        .unwrap();

    assert_eq!(engine.item_count(), 3);
    assert!(engine.items().iter().all(|item| item.quantity == 1));
}

#[test]
fn test_capacity_rejection_emits_error() {
    let config = SelectionConfig::builder("tiny")
        .max_items(2)
        .persistence(false)
        .build()
        .unwrap();
    let mut engine = SelectionEngine::new(config);
    let errors = Arc::new(Mutex::new(Vec::new()));
    let sink = errors.clone();
    engine.on(EventKind::Error, move |event| sink.lock().unwrap().push(event.clone()));

    engine.add_item(ItemCandidate::new("A", "Tripod")).unwrap();
    engine.add_item(ItemCandidate::new("B", "Dolly")).unwrap();
    let err = engine.add_item(ItemCandidate::new("C", "Slider")).unwrap_err();

    assert!(matches!(err, SelectionError::Capacity { max_items: 2 }));
    assert_eq!(engine.item_count(), 2);
    assert_eq!(errors.lock().unwrap().len(), 1);
}

#[test]
fn test_update_to_zero_matches_remove() {
    let mut removed = SelectionEngine::new(SelectionConfig::ephemeral());
    let mut zeroed = SelectionEngine::new(SelectionConfig::ephemeral());
    for engine in [&mut removed, &mut zeroed] {
        engine.add_item(ItemCandidate::new("A", "Tripod").quantity(3)).unwrap();
        engine.add_item(ItemCandidate::new("B", "Dolly")).unwrap();
    }

    removed.remove_item(&fungible("A")).unwrap();
    zeroed.update_quantity(&fungible("A"), 0).unwrap();

    assert_eq!(removed.item_count(), zeroed.item_count());
    assert_eq!(removed.total_quantity(), zeroed.total_quantity());
    assert!(zeroed.item(&fungible("A")).is_none());

    // Neither path reports anything for an entry that is not there.
    let removed_events = record_all(&mut removed);
    let zeroed_events = record_all(&mut zeroed);
    assert!(removed.remove_item(&fungible("NOPE")).is_none());
    assert!(matches!(
        zeroed.update_quantity(&fungible("NOPE"), 0),
        Err(SelectionError::NotFound(_))
    ));
    assert!(removed_events.lock().unwrap().is_empty());
    assert!(zeroed_events.lock().unwrap().is_empty());
    assert_eq!(removed.item_count(), zeroed.item_count());
}

fn record_all(engine: &mut SelectionEngine) -> Arc<Mutex<Vec<SelectionEvent>>> {
    let events = Arc::new(Mutex::new(Vec::new()));
    let sink = events.clone();
    engine.on_any(move |event| sink.lock().unwrap().push(event.clone()));
    events
}

#[test]
fn test_selection_survives_restart() {
    let backend = Arc::new(MemoryBackend::new());
    {
        let mut engine = scoped_engine(&backend, &project("42"));
        engine
            .add_item(
                ItemCandidate::new("SKY-S60", "Skypanel S60")
                    .quantity(4)
                    .daily_rate(Decimal::new(12550, 2)),
            )
            .unwrap();
        engine
            .add_item(ItemCandidate::unit("ALEXA", "Alexa Mini LF", "A1"))
            .unwrap();
    }

    let restored = scoped_engine(&backend, &project("42"));
    assert_eq!(restored.item_count(), 2);
    let panel = restored.item(&fungible("SKY-S60")).unwrap();
    assert_eq!(panel.quantity, 4);
    assert_eq!(panel.daily_rate, Decimal::new(12550, 2));

    let other_project = scoped_engine(&backend, &project("43"));
    assert!(other_project.is_empty());
    let global = scoped_engine(&backend, &StorageScope::Global);
    assert!(global.is_empty());
}

#[test]
fn test_clear_removes_stored_record() {
    let backend = Arc::new(MemoryBackend::new());
    let mut engine = scoped_engine(&backend, &StorageScope::Global);
    engine.add_item(ItemCandidate::new("A", "Tripod")).unwrap();
    assert_eq!(backend.keys().unwrap().len(), 1);

    assert_eq!(engine.clear(), 1);
    assert!(backend.keys().unwrap().is_empty());
    assert!(scoped_engine(&backend, &StorageScope::Global).is_empty());
}

#[test]
fn test_hydration_truncates_to_capacity() {
    let backend = Arc::new(MemoryBackend::new());
    {
        let mut engine = scoped_engine(&backend, &StorageScope::Global);
        for id in ["A", "B", "C", "D"] {
            engine.add_item(ItemCandidate::new(id, id)).unwrap();
        }
    }

    let small = SelectionConfig::builder("booking").max_items(2).build().unwrap();
    let store = PersistentStore::new(
        backend.clone(),
        StoreConfig::default(),
        small.selection_type(),
        &StorageScope::Global,
    );
    let engine = SelectionEngine::with_store(small, store);
    assert_eq!(engine.item_count(), 2);
}

#[test]
fn test_panicking_subscriber_does_not_break_mutation() {
    let mut engine = SelectionEngine::new(SelectionConfig::ephemeral());
    let seen = Arc::new(Mutex::new(0));
    let counter = seen.clone();

    engine.on_any(|_| panic!("subscriber bug"));
    engine.on(EventKind::ItemAdded, move |_| *counter.lock().unwrap() += 1);

    engine.add_item(ItemCandidate::new("A", "Tripod")).unwrap();
    engine.add_item(ItemCandidate::new("B", "Dolly")).unwrap();

    assert_eq!(engine.item_count(), 2);
    assert_eq!(*seen.lock().unwrap(), 2);
}

#[test]
fn test_unsubscribed_callback_stops_receiving() {
    let mut engine = SelectionEngine::new(SelectionConfig::ephemeral());
    let events = Arc::new(Mutex::new(Vec::<SelectionEvent>::new()));
    let sink = events.clone();
    let id = engine.on_any(move |event| sink.lock().unwrap().push(event.clone()));

    engine.add_item(ItemCandidate::new("A", "Tripod")).unwrap();
    assert!(engine.off(id));
    engine.add_item(ItemCandidate::new("B", "Dolly")).unwrap();

    assert_eq!(events.lock().unwrap().len(), 1);
    assert!(!engine.off(id));
}
