use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rentcart_store::{PersistentStore, StorageError, StorageInfo};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use super::config::SelectionConfig;
use super::events::{EventBus, EventKind, Operation, SelectionEvent, SubscriptionId};
use super::item::{ItemCandidate, ItemKey, SelectionItem};
use crate::error::SelectionError;

/// Result of a successful [`SelectionEngine::add_item`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddOutcome {
    Inserted(ItemKey),
    /// Quantity was added to an existing fungible entry.
    Merged {
        key: ItemKey,
        previous_quantity: u32,
        quantity: u32,
    },
    /// The same serialized unit was already selected.
    AlreadySelected(ItemKey),
}

impl AddOutcome {
    pub fn key(&self) -> &ItemKey {
        match self {
            Self::Inserted(key) | Self::AlreadySelected(key) => key,
            Self::Merged { key, .. } => key,
        }
    }
}

/// Result of a successful [`SelectionEngine::update_quantity`].
#[derive(Debug, Clone, PartialEq)]
pub enum QuantityChange {
    Updated { previous: u32, current: u32 },
    Removed(SelectionItem),
}

/// Totals for display next to the selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionSummary {
    pub entries: usize,
    pub units: u64,
    pub daily_total: Decimal,
    pub replacement_total: Decimal,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PersistedSelection<'a> {
    items: BTreeMap<String, &'a SelectionItem>,
    saved_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct StoredSelection {
    #[serde(default)]
    items: serde_json::Map<String, Value>,
}

/// Accumulates equipment picks independently of navigation.
///
/// All mutation goes through the methods below; each one emits its events
/// synchronously and, when auto-persist is on, saves before returning.
pub struct SelectionEngine {
    config: SelectionConfig,
    items: HashMap<ItemKey, SelectionItem>,
    store: Option<PersistentStore>,
    events: EventBus,
}

impl std::fmt::Debug for SelectionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionEngine")
            .field("config", &self.config)
            .field("items", &self.items.len())
            .field("store", &self.store)
            .field("subscribers", &self.events.len())
            .finish()
    }
}

impl SelectionEngine {
    /// An engine that never touches storage.
    pub fn new(config: SelectionConfig) -> Self {
        Self {
            config,
            items: HashMap::new(),
            store: None,
            events: EventBus::default(),
        }
    }

    /// An engine backed by `store`, hydrated from it when persistence is
    /// enabled in `config`.
    pub fn with_store(config: SelectionConfig, store: PersistentStore) -> Self {
        let mut engine = Self::new(config);
        if engine.config.persistence() {
            engine.hydrate(&store);
            engine.store = Some(store);
        }
        engine
    }

    pub fn config(&self) -> &SelectionConfig {
        &self.config
    }

    // ------------------------------------------------------------------
    // Mutations
    // ------------------------------------------------------------------

    pub fn add_item(&mut self, candidate: ItemCandidate) -> Result<AddOutcome, SelectionError> {
        let item = match candidate.validate(Utc::now()) {
            Ok(item) => item,
            Err(err) => return Err(self.fail(Operation::AddItem, err)),
        };
        let key = item.key();

        let outcome = if let Some(existing) = self.items.get_mut(&key) {
            if existing.is_unique_unit {
                debug!(key = %key, "Unit already selected");
                return Ok(AddOutcome::AlreadySelected(key));
            }
            let previous_quantity = existing.quantity;
            existing.quantity = existing.quantity.saturating_add(item.quantity);
            let quantity = existing.quantity;
            let snapshot = existing.clone();
            debug!(key = %key, previous_quantity, quantity, "Merged selection entry");
            self.events.emit(&SelectionEvent::ItemUpdated {
                key: key.clone(),
                previous_quantity,
                item: snapshot,
            });
            AddOutcome::Merged {
                key,
                previous_quantity,
                quantity,
            }
        } else {
            if self.items.len() >= self.config.max_items() {
                let err = SelectionError::Capacity {
                    max_items: self.config.max_items(),
                };
                return Err(self.fail(Operation::AddItem, err));
            }
            debug!(key = %key, quantity = item.quantity, "Added selection entry");
            self.items.insert(key.clone(), item.clone());
            self.events.emit(&SelectionEvent::ItemAdded {
                key: key.clone(),
                item,
            });
            AddOutcome::Inserted(key)
        };

        self.auto_persist();
        Ok(outcome)
    }

    /// Remove an entry. Returns `None`, without emitting, when absent.
    pub fn remove_item(&mut self, key: &ItemKey) -> Option<SelectionItem> {
        let item = self.items.remove(key)?;
        debug!(key = %key, "Removed selection entry");
        self.events.emit(&SelectionEvent::ItemRemoved {
            key: key.clone(),
            item: item.clone(),
        });
        self.auto_persist();
        Some(item)
    }

    /// Set an entry's quantity. Zero or below removes the entry, exactly like
    /// [`remove_item`](Self::remove_item): an absent key is `NotFound` with
    /// no event.
    pub fn update_quantity(
        &mut self,
        key: &ItemKey,
        quantity: i64,
    ) -> Result<QuantityChange, SelectionError> {
        if quantity <= 0 {
            return self
                .remove_item(key)
                .map(QuantityChange::Removed)
                .ok_or_else(|| SelectionError::NotFound(key.to_string()));
        }

        let Some(existing) = self.items.get(key) else {
            return Err(self.fail(
                Operation::UpdateQuantity,
                SelectionError::NotFound(key.to_string()),
            ));
        };
        if existing.is_unique_unit && quantity != 1 {
            let err = SelectionError::validation(format!(
                "{} is a serialized unit; quantity is always 1",
                key
            ));
            return Err(self.fail(Operation::UpdateQuantity, err));
        }
        let current = u32::try_from(quantity).map_err(|_| {
            self.fail(
                Operation::UpdateQuantity,
                SelectionError::validation(format!("quantity {} is too large", quantity)),
            )
        })?;

        let Some(existing) = self.items.get_mut(key) else {
            return Err(SelectionError::NotFound(key.to_string()));
        };
        let previous = existing.quantity;
        existing.quantity = current;
        let snapshot = existing.clone();
        debug!(key = %key, previous, current, "Updated selection quantity");
        self.events.emit(&SelectionEvent::ItemUpdated {
            key: key.clone(),
            previous_quantity: previous,
            item: snapshot,
        });
        self.auto_persist();
        Ok(QuantityChange::Updated { previous, current })
    }

    /// Empty the selection and its stored record. Returns the prior count.
    pub fn clear(&mut self) -> usize {
        let previous_count = self.items.len();
        self.items.clear();
        debug!(previous_count, "Cleared selection");
        self.events.emit(&SelectionEvent::Cleared { previous_count });

        if let Some(store) = &self.store {
            if let Err(err) = store.clear() {
                warn!(key = store.key(), error = %err, "Failed to clear stored selection");
                self.events.emit(&SelectionEvent::Error {
                    operation: Operation::Clear,
                    message: err.to_string(),
                });
            }
        }
        previous_count
    }

    /// Save the current selection now, regardless of the auto-persist flag.
    pub fn persist(&self) -> Result<(), SelectionError> {
        let Some(store) = &self.store else {
            return Ok(());
        };
        let mut items = BTreeMap::new();
        for item in self.items.values() {
            let mut label = item.key().to_string();
            // Distinct keys can share a label ("A_B" vs "A" + serial "B").
            let mut n = 1;
            while items.contains_key(&label) {
                n += 1;
                label = format!("{}#{}", item.key(), n);
            }
            items.insert(label, item);
        }
        let payload = PersistedSelection {
            items,
            saved_at: Utc::now(),
        };
        let payload = serde_json::to_value(&payload).map_err(StorageError::from)?;
        let snapshot = serde_json::to_value(&self.config).map_err(StorageError::from)?;
        store.save(snapshot, payload)?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Entries in the order they were first added.
    pub fn items(&self) -> Vec<&SelectionItem> {
        let mut items: Vec<&SelectionItem> = self.items.values().collect();
        items.sort_by(|a, b| a.added_at.cmp(&b.added_at).then_with(|| a.key().cmp(&b.key())));
        items
    }

    pub fn item(&self, key: &ItemKey) -> Option<&SelectionItem> {
        self.items.get(key)
    }

    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Sum of quantities across entries.
    pub fn total_quantity(&self) -> u64 {
        self.items.values().map(|i| u64::from(i.quantity)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn summary(&self) -> SelectionSummary {
        SelectionSummary {
            entries: self.items.len(),
            units: self.total_quantity(),
            daily_total: self.items.values().map(SelectionItem::daily_total).sum(),
            replacement_total: self.items.values().map(SelectionItem::replacement_total).sum(),
        }
    }

    pub fn storage_info(&self) -> Option<StorageInfo> {
        self.store.as_ref().map(PersistentStore::storage_info)
    }

    // ------------------------------------------------------------------
    // Subscriptions
    // ------------------------------------------------------------------

    pub fn on(
        &mut self,
        kind: EventKind,
        callback: impl Fn(&SelectionEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.events.subscribe(Some(kind), callback)
    }

    /// Subscribe to every event kind.
    pub fn on_any(
        &mut self,
        callback: impl Fn(&SelectionEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.events.subscribe(None, callback)
    }

    pub fn off(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    pub(crate) fn notify(&self, event: SelectionEvent) {
        self.events.emit(&event);
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn fail(&self, operation: Operation, err: SelectionError) -> SelectionError {
        debug!(%operation, error = %err, "Selection operation rejected");
        self.events.emit(&SelectionEvent::Error {
            operation,
            message: err.to_string(),
        });
        err
    }

    /// Failures degrade to running without durability; one retry follows a
    /// quota eviction.
    fn auto_persist(&self) {
        if !self.config.auto_persist() {
            return;
        }
        let mut result = self.persist();
        if matches!(&result, Err(SelectionError::Storage(e)) if e.is_retryable()) {
            debug!("Retrying save after quota eviction");
            result = self.persist();
        }
        if let Err(err) = result {
            warn!(error = %err, "Selection not persisted");
            self.events.emit(&SelectionEvent::Error {
                operation: Operation::Persist,
                message: err.to_string(),
            });
        }
    }

    fn hydrate(&mut self, store: &PersistentStore) {
        let Some(record) = store.load() else {
            return;
        };
        let stored: StoredSelection = match serde_json::from_value(record.payload) {
            Ok(stored) => stored,
            Err(err) => {
                warn!(key = store.key(), error = %err, "Stored selection payload unreadable");
                return;
            }
        };

        let mut restored: Vec<SelectionItem> = Vec::with_capacity(stored.items.len());
        for (label, value) in stored.items {
            match serde_json::from_value::<SelectionItem>(value) {
                Ok(item) if item.equipment_id.is_blank() => {
                    warn!(entry = %label, "Dropping stored entry without equipment id");
                }
                Ok(mut item) => {
                    if item.quantity == 0 {
                        warn!(entry = %label, "Dropping stored entry with zero quantity");
                        continue;
                    }
                    if item.is_unique_unit {
                        item.quantity = 1;
                    }
                    restored.push(item);
                }
                Err(err) => {
                    warn!(entry = %label, error = %err, "Dropping undecodable stored entry");
                }
            }
        }
        restored.sort_by(|a, b| a.added_at.cmp(&b.added_at));

        for item in restored {
            let key = item.key();
            if let Some(existing) = self.items.get_mut(&key) {
                if !existing.is_unique_unit {
                    existing.quantity = existing.quantity.saturating_add(item.quantity);
                }
                continue;
            }
            if self.items.len() >= self.config.max_items() {
                warn!(
                    entry = %key,
                    max_items = self.config.max_items(),
                    "Stored selection over capacity, dropping entry"
                );
                continue;
            }
            self.items.insert(key, item);
        }
        info!(
            key = store.key(),
            entries = self.items.len(),
            "Restored selection from storage"
        );
    }
}
