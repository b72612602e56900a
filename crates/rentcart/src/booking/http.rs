//! REST implementation of [`BookingBackend`].

use std::time::Duration;

use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Url;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::backend::{
    AvailabilityQuery, AvailabilityResponse, BatchBookingRequest, BatchBookingResponse,
    BookingBackend,
};
use crate::error::ApiError;

const AVAILABILITY_PATH: &str = "api/bookings/check-availability";
const BATCH_PATH: &str = "api/bookings/batch";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Talks to the rental REST API.
///
/// Per-call deadlines are applied by the submitter, not the client.
#[derive(Debug, Clone)]
pub struct HttpBookingBackend {
    base_url: Url,
    http_client: reqwest::Client,
}

impl HttpBookingBackend {
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let mut base_url =
            Url::parse(base_url).map_err(|e| ApiError::Url(format!("{}: {}", base_url, e)))?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        let http_client = reqwest::Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .user_agent(concat!("rentcart/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            base_url,
            http_client,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base_url
            .join(path)
            .map_err(|e| ApiError::Url(format!("{}: {}", path, e)))
    }
}

async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T, ApiError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ApiError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json().await?)
}

#[async_trait]
impl BookingBackend for HttpBookingBackend {
    async fn check_availability(
        &self,
        query: &AvailabilityQuery,
    ) -> Result<AvailabilityResponse, ApiError> {
        let url = self.endpoint(AVAILABILITY_PATH)?;
        let start = query.start_date.to_rfc3339_opts(SecondsFormat::Secs, true);
        let end = query.end_date.to_rfc3339_opts(SecondsFormat::Secs, true);
        debug!(equipment_id = %query.equipment_id, %start, %end, "Checking availability");

        let response = self
            .http_client
            .get(url)
            .query(&[
                ("equipmentId", query.equipment_id.as_str()),
                ("startDate", start.as_str()),
                ("endDate", end.as_str()),
            ])
            .send()
            .await?;
        read_json(response).await
    }

    async fn submit_batch(
        &self,
        request: &BatchBookingRequest,
    ) -> Result<BatchBookingResponse, ApiError> {
        let url = self.endpoint(BATCH_PATH)?;
        debug!(entries = request.entries.len(), "Submitting booking batch");

        let response = self.http_client.post(url).json(request).send().await?;
        read_json(response).await
    }
}
