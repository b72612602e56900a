//! Client-side equipment selection ("cart").

mod config;
mod engine;
mod events;
mod item;

pub use config::{SelectionConfig, SelectionConfigBuilder};
pub use engine::{AddOutcome, QuantityChange, SelectionEngine, SelectionSummary};
pub use events::{EventKind, Operation, SelectionEvent, SubscriptionId};
pub use item::{ItemCandidate, ItemKey, SelectionItem};
