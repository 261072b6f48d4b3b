//! # Cloudflare REST Client
//!
//! Native REST implementation of the Access API over `reqwest` (rustls).
//!
//! Every response is wrapped in the Cloudflare envelope:
//!
//! ```json
//! {"success": true, "errors": [], "messages": [], "result": {...}, "result_info": {...}}
//! ```
//!
//! Collections are listed page by page until `result_info.total_pages` is
//! reached.
//!
//! References:
//! - [Cloudflare API v4](https://developers.cloudflare.com/api/)

use crate::cloudflare::{AccessApi, AccessEndpoint, ApiError};
use crate::config::ControllerConfig;
use crate::constants::DEFAULT_LIST_PAGE_SIZE;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};

/// Cloudflare Access REST client
#[derive(Clone)]
pub struct CloudflareClient {
    http_client: Client,
    base_url: String,
    api_token: String,
}

impl std::fmt::Debug for CloudflareClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudflareClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    errors: Vec<EnvelopeMessage>,
    result: Option<T>,
    result_info: Option<ResultInfo>,
}

#[derive(Debug, Deserialize)]
struct EnvelopeMessage {
    #[serde(default)]
    code: Option<i64>,
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct ResultInfo {
    #[serde(default)]
    total_pages: Option<u32>,
}

impl<T> Envelope<T> {
    fn messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(|e| match e.code {
                Some(code) => format!("{code}: {}", e.message),
                None => e.message.clone(),
            })
            .collect()
    }
}

impl CloudflareClient {
    /// Create a client for the given API base URL
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn new(base_url: &str, api_token: &str, timeout: Duration) -> Result<Self> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_token: api_token.to_string(),
        })
    }

    /// Create a client from the controller configuration
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built
    pub fn from_config(config: &ControllerConfig) -> Result<Self> {
        Self::new(&config.api_base_url, &config.api_token, config.http_timeout())
    }

    fn collection_url<E: AccessEndpoint>(&self, account_id: &str) -> String {
        format!(
            "{}/accounts/{}/access/{}",
            self.base_url, account_id, E::COLLECTION
        )
    }

    fn object_url<E: AccessEndpoint>(&self, account_id: &str, id: &str) -> String {
        format!("{}/{}", self.collection_url::<E>(account_id), id)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .bearer_auth(&self.api_token)
            .header("Content-Type", "application/json")
    }

    /// Send a request and unwrap the Cloudflare envelope
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<Envelope<T>, ApiError> {
        let response = request.send().await?;
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            let messages = match serde_json::from_str::<Envelope<serde_json::Value>>(&text) {
                Ok(envelope) => envelope.messages(),
                Err(_) if text.trim().is_empty() => Vec::new(),
                Err(_) => vec![text.trim().to_string()],
            };
            debug!(status = status.as_u16(), ?messages, "Cloudflare API error response");
            return Err(ApiError::from_status(status.as_u16(), messages));
        }

        let envelope: Envelope<T> = serde_json::from_str(&text).map_err(|e| {
            ApiError::Transient(format!("failed to decode Cloudflare response: {e}"))
        })?;
        if !envelope.success {
            return Err(ApiError::Validation(envelope.messages()));
        }
        Ok(envelope)
    }

    async fn send_for_result<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
    ) -> Result<T, ApiError> {
        self.send::<T>(request)
            .await?
            .result
            .ok_or_else(|| ApiError::Transient("Cloudflare response carried no result".to_string()))
    }
}

#[async_trait]
impl<E: AccessEndpoint> AccessApi<E> for CloudflareClient {
    async fn get(&self, account_id: &str, id: &str) -> Result<E::Snapshot, ApiError> {
        debug!(kind = E::KIND, account_id, id, "GET");
        let url = self.object_url::<E>(account_id, id);
        self.send_for_result(self.request(Method::GET, &url)).await
    }

    async fn list(&self, account_id: &str) -> Result<Vec<E::Snapshot>, ApiError> {
        let url = self.collection_url::<E>(account_id);
        let mut items = Vec::new();
        let mut page: u32 = 1;

        loop {
            debug!(kind = E::KIND, account_id, page, "LIST");
            let request = self
                .request(Method::GET, &url)
                .query(&[("page", page), ("per_page", DEFAULT_LIST_PAGE_SIZE)]);
            let envelope: Envelope<Vec<E::Snapshot>> = self.send(request).await?;
            let total_pages = envelope
                .result_info
                .as_ref()
                .and_then(|info| info.total_pages)
                .unwrap_or(1);
            let batch = envelope.result.unwrap_or_default();
            let fetched = batch.len();
            items.extend(batch);

            if page >= total_pages || fetched == 0 {
                break;
            }
            page += 1;
        }

        Ok(items)
    }

    async fn create(&self, account_id: &str, body: &E::Body) -> Result<E::Snapshot, ApiError> {
        debug!(kind = E::KIND, account_id, "POST");
        let url = self.collection_url::<E>(account_id);
        self.send_for_result(self.request(Method::POST, &url).json(body))
            .await
    }

    async fn update(
        &self,
        account_id: &str,
        id: &str,
        body: &E::Body,
    ) -> Result<E::Snapshot, ApiError> {
        debug!(kind = E::KIND, account_id, id, "PUT");
        let url = self.object_url::<E>(account_id, id);
        self.send_for_result(self.request(Method::PUT, &url).json(body))
            .await
    }

    async fn delete(&self, account_id: &str, id: &str) -> Result<(), ApiError> {
        debug!(kind = E::KIND, account_id, id, "DELETE");
        let url = self.object_url::<E>(account_id, id);
        let envelope: Envelope<serde_json::Value> =
            self.send(self.request(Method::DELETE, &url)).await?;
        if envelope.result.is_none() {
            warn!(kind = E::KIND, id, "Delete response carried no result");
        }
        Ok(())
    }
}
