//! Selection configuration and its named presets.

use serde::{Deserialize, Serialize};

use crate::error::SelectionError;

/// Immutable settings captured when an engine is built.
///
/// Construct through [`SelectionConfig::builder`] or one of the presets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionConfig {
    selection_type: String,
    max_items: usize,
    persistence: bool,
    auto_persist: bool,
}

impl SelectionConfig {
    pub fn builder(selection_type: impl Into<String>) -> SelectionConfigBuilder {
        SelectionConfigBuilder {
            selection_type: selection_type.into(),
            max_items: 100,
            persistence: true,
            auto_persist: true,
        }
    }

    /// Equipment gathered for a booking, kept across restarts.
    pub fn booking_cart() -> Self {
        Self {
            selection_type: "booking".to_string(),
            max_items: 100,
            persistence: true,
            auto_persist: true,
        }
    }

    /// Units collected while scanning barcodes at the warehouse desk.
    pub fn scan_session() -> Self {
        Self {
            selection_type: "scan".to_string(),
            max_items: 500,
            persistence: true,
            auto_persist: true,
        }
    }

    /// Short-lived picks that never touch storage.
    pub fn ephemeral() -> Self {
        Self {
            selection_type: "quick".to_string(),
            max_items: 50,
            persistence: false,
            auto_persist: false,
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "booking" => Some(Self::booking_cart()),
            "scan" => Some(Self::scan_session()),
            "quick" | "ephemeral" => Some(Self::ephemeral()),
            _ => None,
        }
    }

    pub fn selection_type(&self) -> &str {
        &self.selection_type
    }

    pub fn max_items(&self) -> usize {
        self.max_items
    }

    pub fn persistence(&self) -> bool {
        self.persistence
    }

    /// Save after every successful mutation. Implies `persistence`.
    pub fn auto_persist(&self) -> bool {
        self.persistence && self.auto_persist
    }
}

#[derive(Debug, Clone)]
pub struct SelectionConfigBuilder {
    selection_type: String,
    max_items: usize,
    persistence: bool,
    auto_persist: bool,
}

impl SelectionConfigBuilder {
    pub fn max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    pub fn persistence(mut self, enabled: bool) -> Self {
        self.persistence = enabled;
        self
    }

    pub fn auto_persist(mut self, enabled: bool) -> Self {
        self.auto_persist = enabled;
        self
    }

    pub fn build(self) -> Result<SelectionConfig, SelectionError> {
        // The tag is part of the storage key, so it stays within [a-z0-9-].
        let tag = self.selection_type.trim();
        if tag.is_empty() {
            return Err(SelectionError::InvalidConfig(
                "selection type must not be empty".to_string(),
            ));
        }
        if !tag
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
        {
            return Err(SelectionError::InvalidConfig(format!(
                "selection type '{}' may only contain a-z, 0-9 and '-'",
                tag
            )));
        }
        if self.max_items == 0 {
            return Err(SelectionError::InvalidConfig(
                "max_items must be at least 1".to_string(),
            ));
        }

        Ok(SelectionConfig {
            selection_type: tag.to_string(),
            max_items: self.max_items,
            persistence: self.persistence,
            auto_persist: self.auto_persist,
        })
    }
}
