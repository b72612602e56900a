//! Converting a selection into rental bookings.

mod backend;
mod http;
mod pricing;
mod submitter;

pub use backend::{
    AvailabilityQuery, AvailabilityResponse, BatchBookingRequest, BatchBookingResponse,
    BookingBackend, BookingEntry,
};
pub use http::HttpBookingBackend;
pub use pricing::{line_total, rental_duration, Quote, QuoteLine};
pub use submitter::{
    preview, BookingReport, BookingRequest, BookingSubmitter, SubmissionPhase, SubmitterConfig,
    UnavailableItem,
};
