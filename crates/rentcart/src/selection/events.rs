//! Typed notifications emitted by the selection engine.

use std::fmt;
use std::panic::{self, AssertUnwindSafe};

use tracing::error;

use super::item::{ItemKey, SelectionItem};

/// Engine operation named in [`SelectionEvent::Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    AddItem,
    UpdateQuantity,
    Clear,
    Persist,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AddItem => "add_item",
            Self::UpdateQuantity => "update_quantity",
            Self::Clear => "clear",
            Self::Persist => "persist",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectionEvent {
    ItemAdded {
        key: ItemKey,
        item: SelectionItem,
    },
    ItemUpdated {
        key: ItemKey,
        previous_quantity: u32,
        item: SelectionItem,
    },
    ItemRemoved {
        key: ItemKey,
        item: SelectionItem,
    },
    Cleared {
        previous_count: usize,
    },
    Error {
        operation: Operation,
        message: String,
    },
    /// A booking run finished and the selection was cleared.
    ActionCompleted {
        created: u32,
        failed: u32,
    },
    /// A booking run failed; the selection is unchanged.
    ActionFailed {
        message: String,
    },
}

impl SelectionEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            Self::ItemAdded { .. } => EventKind::ItemAdded,
            Self::ItemUpdated { .. } => EventKind::ItemUpdated,
            Self::ItemRemoved { .. } => EventKind::ItemRemoved,
            Self::Cleared { .. } => EventKind::Cleared,
            Self::Error { .. } => EventKind::Error,
            Self::ActionCompleted { .. } => EventKind::ActionCompleted,
            Self::ActionFailed { .. } => EventKind::ActionFailed,
        }
    }
}

/// Discriminant used to subscribe to one kind of event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ItemAdded,
    ItemUpdated,
    ItemRemoved,
    Cleared,
    Error,
    ActionCompleted,
    ActionFailed,
}

/// Handle returned by `on`, used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

type Callback = Box<dyn Fn(&SelectionEvent) + Send + Sync>;

struct Subscriber {
    id: SubscriptionId,
    kind: Option<EventKind>,
    callback: Callback,
}

/// Synchronous observer list. Subscribers run in registration order; a
/// panicking subscriber is logged and skipped.
#[derive(Default)]
pub(crate) struct EventBus {
    next_id: u64,
    subscribers: Vec<Subscriber>,
}

impl EventBus {
    pub(crate) fn subscribe(
        &mut self,
        kind: Option<EventKind>,
        callback: impl Fn(&SelectionEvent) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.subscribers.push(Subscriber {
            id,
            kind,
            callback: Box::new(callback),
        });
        id
    }

    pub(crate) fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    pub(crate) fn emit(&self, event: &SelectionEvent) {
        let kind = event.kind();
        for subscriber in &self.subscribers {
            if subscriber.kind.is_some_and(|k| k != kind) {
                continue;
            }
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| (subscriber.callback)(event)));
            if let Err(payload) = outcome {
                error!(
                    event = ?kind,
                    subscription = subscriber.id.0,
                    panic = %panic_message(payload.as_ref()),
                    "Selection event subscriber panicked"
                );
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.subscribers.len()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
