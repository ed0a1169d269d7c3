//! §6.1 client side: the worker's HTTP calls to the manager.

use crate::error::ApiError;
use crate::model::{QueueItem, Report};

const AUTH_HEADER: &str = "X-Heroshi-Auth";

pub struct ManagerClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl ManagerClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// `POST /crawl-queue` with form body `limit=N` (§6.1).
    pub async fn get_crawl_queue(&self, limit: usize) -> Result<Vec<QueueItem>, ApiError> {
        let response = self
            .http
            .post(format!("{}/crawl-queue", self.base_url))
            .header(AUTH_HEADER, &self.api_key)
            .form(&[("limit", limit.to_string())])
            .send()
            .await
            .map_err(|e| ApiError::new(0, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(ApiError::new(status, response.status().to_string()));
        }
        response
            .json::<Vec<QueueItem>>()
            .await
            .map_err(|e| ApiError::new(0, e.to_string()))
    }

    /// `PUT /report` with a JSON report body (§6.1).
    pub async fn report_result(&self, report: &Report) -> Result<(), ApiError> {
        let response = self
            .http
            .put(format!("{}/report", self.base_url))
            .header(AUTH_HEADER, &self.api_key)
            .json(report)
            .send()
            .await
            .map_err(|e| ApiError::new(0, e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            return Err(ApiError::new(status, response.status().to_string()));
        }
        Ok(())
    }
}
