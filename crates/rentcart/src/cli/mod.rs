//! CLI module for rentcart
//!
//! Each invocation opens the selection for one scope from disk, applies a
//! single command and lets auto-persist write the result back.

pub mod booking;
pub mod output;
pub mod selection;

use std::sync::Arc;

use anyhow::{anyhow, Result};
use rentcart::{
    EventKind, Operation, RentcartConfig, SelectionConfig, SelectionEngine, SelectionEvent,
};
use rentcart_ids::ProjectId;
use rentcart_store::{DirBackend, PersistentStore, StorageScope};

/// The engine for the requested scope, plus what the commands need to
/// describe it.
pub struct Session {
    pub engine: SelectionEngine,
    pub scope: StorageScope,
}

impl Session {
    pub fn open(config: &RentcartConfig, preset: &str, project: Option<ProjectId>) -> Result<Self> {
        let selection = SelectionConfig::preset(preset)
            .ok_or_else(|| anyhow!("Unknown preset '{}' (expected booking, scan or quick)", preset))?;
        let scope = StorageScope::from_project(project);

        let backend = DirBackend::new(config.storage_dir());
        let store = PersistentStore::new(
            Arc::new(backend),
            config.store_config(),
            selection.selection_type(),
            &scope,
        );
        let mut engine = SelectionEngine::with_store(selection, store);
        // Rejected commands surface as errors; storage failures only arrive here.
        engine.on(EventKind::Error, |event| {
            if let SelectionEvent::Error { operation, message } = event {
                if matches!(operation, Operation::Persist | Operation::Clear) {
                    eprintln!("warning: {} failed: {}", operation, message);
                }
            }
        });

        Ok(Self { engine, scope })
    }
}
