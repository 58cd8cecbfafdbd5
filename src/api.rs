//! REST client for the workshop backend.
//!
//! DESIGN
//! ======
//! Three read-only calls: the box list and the active-order list seed the
//! board, and the order detail call backs the drill-down. The board only sees
//! them through [`BootstrapSource`] and [`OrderDetailsSource`], so tests and
//! embedders can supply data without HTTP.
//!
//! The backend answers an empty list with `null` on some deployments; both
//! list calls treat that as `[]`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::{BoxRecord, OrderDetails, OrderEvent, RecordId};

pub const DEFAULT_API_URL: &str = "http://localhost:8080/api";
const REQUEST_TIMEOUT_SECS: u64 = 30;
const CONNECT_TIMEOUT_SECS: u64 = 10;

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("invalid api url: {0}")]
    InvalidUrl(String),
    #[error("http client build failed: {0}")]
    HttpClientBuild(String),
    #[error("request failed: {0}")]
    Request(String),
    #[error("backend returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("unexpected response body: {0}")]
    Decode(String),
}

impl ApiError {
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidUrl(_) => "E_API_INVALID_URL",
            Self::HttpClientBuild(_) => "E_API_CLIENT_BUILD",
            Self::Request(_) => "E_API_REQUEST",
            Self::Status { .. } => "E_API_STATUS",
            Self::Decode(_) => "E_API_DECODE",
        }
    }
}

// =============================================================================
// SOURCES
// =============================================================================

/// Where the board's initial lists come from.
#[async_trait]
pub trait BootstrapSource: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the list could not be fetched or decoded.
    async fn list_boxes(&self) -> Result<Vec<BoxRecord>, ApiError>;

    /// Orders currently occupying a box.
    ///
    /// # Errors
    ///
    /// Returns an error if the list could not be fetched or decoded.
    async fn list_active_orders(&self) -> Result<Vec<OrderEvent>, ApiError>;
}

/// Lookup of a full order record.
#[async_trait]
pub trait OrderDetailsSource: Send + Sync {
    /// # Errors
    ///
    /// Returns an error if the order could not be fetched or decoded.
    async fn order_details(&self, order_service_id: &RecordId) -> Result<OrderDetails, ApiError>;
}

/// The two immutable lists a board starts from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Bootstrap {
    pub boxes: Vec<BoxRecord>,
    pub orders: Vec<OrderEvent>,
}

impl Bootstrap {
    #[must_use]
    pub fn new(boxes: Vec<BoxRecord>, orders: Vec<OrderEvent>) -> Self {
        Self { boxes, orders }
    }

    /// Fetch both lists concurrently.
    ///
    /// # Errors
    ///
    /// Returns the first error either call produced.
    pub async fn load(source: &dyn BootstrapSource) -> Result<Self, ApiError> {
        let (boxes, orders) = tokio::try_join!(source.list_boxes(), source.list_active_orders())?;
        info!(boxes = boxes.len(), orders = orders.len(), "api: bootstrap loaded");
        Ok(Self { boxes, orders })
    }
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
}

impl ApiClient {
    /// # Errors
    ///
    /// Returns an error if `base_url` is not an absolute http(s) URL or the
    /// HTTP client fails to build.
    pub fn new(base_url: &str) -> Result<Self, ApiError> {
        let base_url = Url::parse(base_url.trim_end_matches('/')).map_err(|e| ApiError::InvalidUrl(format!("{base_url}: {e}")))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ApiError::InvalidUrl(base_url.to_string()));
        }
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ApiError::HttpClientBuild(e.to_string()))?;
        Ok(Self { http, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, ApiError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| ApiError::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn get_text(&self, segments: &[&str]) -> Result<String, ApiError> {
        let url = self.endpoint(segments)?;
        debug!(%url, "api: GET");
        let response = self.http.get(url).send().await.map_err(|e| ApiError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| ApiError::Request(e.to_string()))?;
        if !(200..300).contains(&status) {
            return Err(ApiError::Status { status, body: text });
        }
        Ok(text)
    }

    async fn get_list<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<Vec<T>, ApiError> {
        let text = self.get_text(segments).await?;
        decode_list(&text)
    }
}

#[async_trait]
impl BootstrapSource for ApiClient {
    async fn list_boxes(&self) -> Result<Vec<BoxRecord>, ApiError> {
        self.get_list(&["boxes"]).await
    }

    async fn list_active_orders(&self) -> Result<Vec<OrderEvent>, ApiError> {
        self.get_list(&["dashboard"]).await
    }
}

#[async_trait]
impl OrderDetailsSource for ApiClient {
    async fn order_details(&self, order_service_id: &RecordId) -> Result<OrderDetails, ApiError> {
        let id = order_service_id.to_string();
        let text = self.get_text(&["order-services", &id]).await?;
        serde_json::from_str(&text).map_err(|e| ApiError::Decode(e.to_string()))
    }
}

/// Decode a JSON list, reading `null` or an empty body as no entries.
fn decode_list<T: DeserializeOwned>(text: &str) -> Result<Vec<T>, ApiError> {
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    let list: Option<Vec<T>> = serde_json::from_str(text).map_err(|e| ApiError::Decode(e.to_string()))?;
    Ok(list.unwrap_or_default())
}

#[cfg(test)]
#[path = "api_test.rs"]
mod tests;
