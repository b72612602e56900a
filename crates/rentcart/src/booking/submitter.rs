//! Turns a selection into one batch of bookings.
//!
//! A run moves through `Idle -> Validating -> CheckingAvailability (when
//! requested) -> Submitting` and ends in `Completed` or `Failed`. There is no
//! cancellation; each backend call is bounded by its own timeout instead.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use rentcart_ids::{ClientId, ProjectId, RunId};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::backend::{AvailabilityQuery, BatchBookingRequest, BookingBackend, BookingEntry};
use super::pricing::{Quote, QuoteLine};
use crate::error::{ApiError, BookingError};
use crate::selection::{ItemKey, SelectionEngine, SelectionEvent};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum SubmissionPhase {
    Idle,
    Validating,
    CheckingAvailability,
    Submitting,
    Completed,
    Failed,
}

/// What the user is committing to. Required fields are optional here so a
/// half-filled form can be reported as [`BookingError::ActionValidation`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookingRequest {
    pub client_id: Option<ClientId>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub project_id: Option<ProjectId>,
    pub check_availability: bool,
}

impl BookingRequest {
    pub fn new(client_id: ClientId, start_date: DateTime<Utc>, end_date: DateTime<Utc>) -> Self {
        Self {
            client_id: Some(client_id),
            start_date: Some(start_date),
            end_date: Some(end_date),
            ..Self::default()
        }
    }

    pub fn project(mut self, project_id: ProjectId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    pub fn check_availability(mut self, enabled: bool) -> Self {
        self.check_availability = enabled;
        self
    }

    fn period(&self) -> Result<(DateTime<Utc>, DateTime<Utc>), BookingError> {
        let start = self
            .start_date
            .ok_or_else(|| BookingError::ActionValidation("start date is required".to_string()))?;
        let end = self
            .end_date
            .ok_or_else(|| BookingError::ActionValidation("end date is required".to_string()))?;
        Ok((start, end))
    }
}

/// A selection entry that cannot be booked as requested.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnavailableItem {
    #[serde(skip)]
    pub key: ItemKey,
    pub equipment_id: String,
    pub name: String,
    pub requested: u32,
    pub available: u32,
}

/// Outcome of a completed run.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingReport {
    pub run_id: RunId,
    pub created_count: u32,
    pub failed_count: u32,
    pub created_bookings: Vec<Value>,
    pub failed_bookings: Vec<Value>,
    pub message: Option<String>,
    pub quote: Quote,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmitterConfig {
    pub availability_timeout: Duration,
    pub submission_timeout: Duration,
}

impl Default for SubmitterConfig {
    fn default() -> Self {
        Self {
            availability_timeout: Duration::from_secs(10),
            submission_timeout: Duration::from_secs(30),
        }
    }
}

pub struct BookingSubmitter<B> {
    backend: B,
    config: SubmitterConfig,
    phase: SubmissionPhase,
}

impl<B: BookingBackend> BookingSubmitter<B> {
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, SubmitterConfig::default())
    }

    pub fn with_config(backend: B, config: SubmitterConfig) -> Self {
        Self {
            backend,
            config,
            phase: SubmissionPhase::Idle,
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Phase reached by the most recent run.
    pub fn phase(&self) -> SubmissionPhase {
        self.phase
    }

    /// Price the selection for the request's period without contacting the
    /// backend.
    pub fn preview(
        &self,
        engine: &SelectionEngine,
        request: &BookingRequest,
    ) -> Result<Quote, BookingError> {
        preview(engine, request)
    }

    /// Validate, optionally check availability, and submit the selection as
    /// one batch. The selection is cleared only when the backend accepts it.
    ///
    /// Emits exactly one `ActionCompleted` or `ActionFailed` on `engine`.
    pub async fn submit(
        &mut self,
        engine: &mut SelectionEngine,
        request: &BookingRequest,
    ) -> Result<BookingReport, BookingError> {
        let run_id = RunId::new();
        self.phase = SubmissionPhase::Idle;
        info!(run_id = %run_id, entries = engine.item_count(), "Starting booking run");

        let result = self.run(engine, request, &run_id).await;
        match &result {
            Ok(report) => {
                self.transition(&run_id, SubmissionPhase::Completed);
                engine.notify(SelectionEvent::ActionCompleted {
                    created: report.created_count,
                    failed: report.failed_count,
                });
            }
            Err(err) => {
                self.transition(&run_id, SubmissionPhase::Failed);
                warn!(run_id = %run_id, error = %err, "Booking run failed");
                engine.notify(SelectionEvent::ActionFailed {
                    message: err.to_string(),
                });
            }
        }
        result
    }

    async fn run(
        &mut self,
        engine: &mut SelectionEngine,
        request: &BookingRequest,
        run_id: &RunId,
    ) -> Result<BookingReport, BookingError> {
        if engine.is_empty() {
            return Err(BookingError::EmptySelection);
        }

        self.transition(run_id, SubmissionPhase::Validating);
        let client_id = request
            .client_id
            .clone()
            .ok_or_else(|| BookingError::ActionValidation("client is required".to_string()))?;
        let (start, end) = request.period()?;
        let quote = price_selection(engine, start, end);

        if request.check_availability {
            self.transition(run_id, SubmissionPhase::CheckingAvailability);
            let unavailable = self.find_unavailable(&quote).await?;
            if !unavailable.is_empty() {
                return Err(BookingError::AvailabilityConflict { items: unavailable });
            }
        }

        self.transition(run_id, SubmissionPhase::Submitting);
        let batch = BatchBookingRequest {
            entries: quote
                .lines
                .iter()
                .map(|line| BookingEntry {
                    client_id: client_id.clone(),
                    equipment_id: line.key.equipment_id().clone(),
                    start_date: line.start_date,
                    end_date: line.end_date,
                    quantity: line.quantity,
                    total_amount: line.total_amount,
                })
                .collect(),
            project_id: request.project_id.clone(),
        };
        let response = with_deadline(
            "Booking submission",
            self.config.submission_timeout,
            self.backend.submit_batch(&batch),
        )
        .await??;

        if !response.success {
            let message = response
                .message
                .unwrap_or_else(|| "backend did not accept the batch".to_string());
            return Err(BookingError::Rejected(message));
        }

        info!(
            run_id = %run_id,
            created = response.created_count,
            failed = response.failed_count,
            total = %quote.total_amount,
            "Booking batch accepted"
        );
        engine.clear();

        Ok(BookingReport {
            run_id: run_id.clone(),
            created_count: response.created_count,
            failed_count: response.failed_count,
            created_bookings: response.created_bookings,
            failed_bookings: response.failed_bookings,
            message: response.message,
            quote,
        })
    }

    /// Every line is checked; conflicts are collected rather than stopping
    /// at the first one. A transport failure aborts the run.
    async fn find_unavailable(&self, quote: &Quote) -> Result<Vec<UnavailableItem>, BookingError> {
        let mut unavailable = Vec::new();
        for line in &quote.lines {
            let query = AvailabilityQuery {
                equipment_id: line.key.equipment_id().clone(),
                start_date: line.start_date,
                end_date: line.end_date,
            };
            let availability = with_deadline(
                "Availability check",
                self.config.availability_timeout,
                self.backend.check_availability(&query),
            )
            .await?
            .map_err(|source| BookingError::Availability {
                equipment_id: line.equipment_id.clone(),
                source,
            })?;

            if !availability.is_available || line.quantity > availability.available_quantity {
                debug!(
                    key = %line.key,
                    requested = line.quantity,
                    available = availability.available_quantity,
                    "Entry unavailable"
                );
                unavailable.push(UnavailableItem {
                    key: line.key.clone(),
                    equipment_id: line.equipment_id.clone(),
                    name: line.name.clone(),
                    requested: line.quantity,
                    available: availability.available_quantity,
                });
            }
        }
        Ok(unavailable)
    }

    fn transition(&mut self, run_id: &RunId, next: SubmissionPhase) {
        debug!(run_id = %run_id, from = ?self.phase, to = ?next, "Booking phase");
        self.phase = next;
    }
}

/// Price `engine`'s selection for the request's period. Needs no client.
pub fn preview(engine: &SelectionEngine, request: &BookingRequest) -> Result<Quote, BookingError> {
    if engine.is_empty() {
        return Err(BookingError::EmptySelection);
    }
    let (start, end) = request.period()?;
    Ok(price_selection(engine, start, end))
}

fn price_selection(engine: &SelectionEngine, start: DateTime<Utc>, end: DateTime<Utc>) -> Quote {
    Quote::new(
        engine
            .items()
            .into_iter()
            .map(|item| QuoteLine::for_item(item, start, end))
            .collect(),
    )
}

async fn with_deadline<T>(
    stage: &'static str,
    after: Duration,
    call: impl Future<Output = Result<T, ApiError>>,
) -> Result<Result<T, ApiError>, BookingError> {
    tokio::time::timeout(after, call)
        .await
        .map_err(|_| BookingError::Timeout { stage, after })
}
