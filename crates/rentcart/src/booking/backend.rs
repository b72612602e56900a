//! The two rental backend calls the submitter depends on.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rentcart_ids::{ClientId, EquipmentId, ProjectId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ApiError;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityQuery {
    pub equipment_id: EquipmentId,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailabilityResponse {
    pub is_available: bool,
    #[serde(default)]
    pub available_quantity: u32,
}

/// One booking to create.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingEntry {
    pub client_id: ClientId,
    pub equipment_id: EquipmentId,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub quantity: u32,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchBookingRequest {
    pub entries: Vec<BookingEntry>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<ProjectId>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchBookingResponse {
    pub success: bool,
    #[serde(default)]
    pub created_count: u32,
    #[serde(default)]
    pub failed_count: u32,
    #[serde(default)]
    pub created_bookings: Vec<Value>,
    #[serde(default)]
    pub failed_bookings: Vec<Value>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Availability lookup and batch booking creation.
#[async_trait]
pub trait BookingBackend: Send + Sync {
    async fn check_availability(
        &self,
        query: &AvailabilityQuery,
    ) -> Result<AvailabilityResponse, ApiError>;

    async fn submit_batch(
        &self,
        request: &BatchBookingRequest,
    ) -> Result<BatchBookingResponse, ApiError>;
}

#[async_trait]
impl<T: BookingBackend + ?Sized> BookingBackend for std::sync::Arc<T> {
    async fn check_availability(
        &self,
        query: &AvailabilityQuery,
    ) -> Result<AvailabilityResponse, ApiError> {
        (**self).check_availability(query).await
    }

    async fn submit_batch(
        &self,
        request: &BatchBookingRequest,
    ) -> Result<BatchBookingResponse, ApiError> {
        (**self).submit_batch(request).await
    }
}
