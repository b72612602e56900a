//! Rentcart - equipment selection and batch booking.
//!
//! Equipment picked from search, catalog rows, or barcode scans accumulates
//! in a [`SelectionEngine`]; a [`BookingSubmitter`] turns the selection into
//! one batch of rental bookings.

pub mod booking;
pub mod config;
pub mod error;
pub mod selection;

pub use booking::{
    BookingBackend, BookingReport, BookingRequest, BookingSubmitter, HttpBookingBackend, Quote,
    QuoteLine, SubmissionPhase, SubmitterConfig, UnavailableItem,
};
pub use config::RentcartConfig;
pub use error::{ApiError, BookingError, ConfigError, SelectionError};
pub use selection::{
    AddOutcome, EventKind, ItemCandidate, ItemKey, Operation, QuantityChange, SelectionConfig,
    SelectionEngine, SelectionEvent, SelectionItem, SelectionSummary, SubscriptionId,
};
