//! Rentcart selection persistence.
//!
//! One [`StorageRecord`] is kept per (selection type, scope) pair in a
//! [`KvBackend`]. The store tolerates an unavailable or quota-limited backend:
//! callers get a [`StorageError`] they can log and carry on without
//! durability.

pub mod backend;
pub mod error;
pub mod record;
pub mod store;

pub use backend::{DirBackend, KvBackend, MemoryBackend};
pub use error::{BackendError, StorageError};
pub use record::{StorageRecord, FORMAT_VERSION};
pub use store::{PersistentStore, StorageInfo, StorageScope, StoreConfig};
