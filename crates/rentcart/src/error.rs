//! Error types for the selection engine and booking submission.

use std::time::Duration;

use rentcart_store::StorageError;
use thiserror::Error;

use crate::booking::UnavailableItem;

/// Failures of selection mutations.
#[derive(Error, Debug)]
pub enum SelectionError {
    /// Candidate item is missing its identity or display name.
    #[error("Invalid item: {0}")]
    Validation(String),

    /// Adding a new entry would exceed the configured entry count.
    #[error("Selection is full ({max_items} entries)")]
    Capacity { max_items: usize },

    #[error("No selection entry for {0}")]
    NotFound(String),

    #[error("Invalid selection configuration: {0}")]
    InvalidConfig(String),

    #[error("Persistence failed: {0}")]
    Storage(#[from] StorageError),
}

impl SelectionError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }
}

/// Transport or protocol failure talking to the rental backend.
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid backend URL: {0}")]
    Url(String),
}

/// Why a booking run did not complete.
#[derive(Error, Debug)]
pub enum BookingError {
    #[error("Selection is empty")]
    EmptySelection,

    /// Client or booking period missing from the request.
    #[error("Invalid booking request: {0}")]
    ActionValidation(String),

    /// Some entries cannot be booked for the requested period.
    #[error("{} item(s) unavailable for the requested period", items.len())]
    AvailabilityConflict { items: Vec<UnavailableItem> },

    #[error("Availability check failed for {equipment_id}: {source}")]
    Availability {
        equipment_id: String,
        #[source]
        source: ApiError,
    },

    #[error("Booking submission failed: {0}")]
    Submission(#[from] ApiError),

    /// Backend answered but refused the batch.
    #[error("Booking rejected: {0}")]
    Rejected(String),

    #[error("{stage} timed out after {after:?}")]
    Timeout { stage: &'static str, after: Duration },
}

impl BookingError {
    /// Entries reported unavailable; empty for every other failure.
    pub fn unavailable_items(&self) -> &[UnavailableItem] {
        match self {
            Self::AvailabilityConflict { items } => items,
            _ => &[],
        }
    }
}

/// Configuration file errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}
