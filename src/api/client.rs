//! reqwest implementation of the onboarding gateway

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::ApiError;
use super::OnboardingApi;
use crate::config::ApiConfig;
use crate::types::{CreateSessionRequest, PageKey, PaginatedPage, Session, SessionSummary};

const API_KEY_HEADER: &str = "x-api-key";

/// HTTP gateway to the onboarding service
pub struct HttpGateway {
    base_url: String,
    api_key: Option<String>,
    client: Client,
}

// Response types for list deserialization
#[derive(Debug, Deserialize)]
struct SessionsResponse {
    data: Vec<SessionSummary>,
    pagination: PaginationInfo,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaginationInfo {
    page: u32,
    limit: u32,
    total: u64,
    #[serde(default)]
    total_pages: Option<u32>,
    #[serde(default, alias = "hasNext")]
    has_next_page: Option<bool>,
    #[serde(default, alias = "hasPrev")]
    has_prev_page: Option<bool>,
}

impl HttpGateway {
    /// Create a gateway with a per-request timeout
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = Client::builder()
            .user_agent(concat!("onboard/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::unknown(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.is_empty()),
            client,
        })
    }

    /// Create a gateway from the `[api]` config section
    pub fn from_config(config: &ApiConfig) -> Result<Self, ApiError> {
        Self::new(
            config.base_url.clone(),
            config.api_key.clone(),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("onboarding {} {}", method, url);

        let builder = self
            .client
            .request(method, &url)
            .header("Accept", "application/json");
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    /// Send and map any non-success status to the error envelope
    async fn send(&self, builder: RequestBuilder) -> Result<Response, ApiError> {
        let response = builder.send().await.map_err(ApiError::from)?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let reason = status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string();
        let body = response.text().await.unwrap_or_default();
        let err = ApiError::from_response(status.as_u16(), &body, &reason);
        debug!(status = status.as_u16(), code = %err.code, "onboarding request failed");
        Err(err)
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ApiError> {
        let response = self.send(builder).await?;
        let body = response.text().await.map_err(ApiError::from)?;
        serde_json::from_str(&body)
            .map_err(|e| ApiError::decode(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl OnboardingApi for HttpGateway {
    async fn create_session(&self, request: &CreateSessionRequest) -> Result<Session, ApiError> {
        self.send_json(self.request(Method::POST, "/onboarding").json(request))
            .await
    }

    async fn list_sessions(&self, key: &PageKey) -> Result<PaginatedPage, ApiError> {
        let datetime = key
            .filter
            .unwrap_or_else(Utc::now)
            .to_rfc3339_opts(SecondsFormat::Millis, true);
        let page = key.page.to_string();
        let limit = key.page_size.to_string();

        let response: SessionsResponse = self
            .send_json(self.request(Method::GET, "/onboarding/sessions").query(&[
                ("datetime", datetime.as_str()),
                ("page", page.as_str()),
                ("limit", limit.as_str()),
                ("order", "desc"),
            ]))
            .await?;

        Ok(into_page(response, key))
    }

    async fn get_session(&self, id: Uuid) -> Result<Session, ApiError> {
        self.send_json(self.request(Method::GET, &format!("/onboarding/{}", id)))
            .await
    }

    async fn delete_session(&self, id: Uuid) -> Result<(), ApiError> {
        self.send(self.request(Method::DELETE, &format!("/onboarding/{}", id)))
            .await
            .map(|_| ())
    }
}

/// Rebuild the page from `(page, limit, total)` so the navigation fields
/// always satisfy the pagination invariants
fn into_page(response: SessionsResponse, key: &PageKey) -> PaginatedPage {
    let info = response.pagination;
    let page_size = if info.limit == 0 {
        key.page_size
    } else {
        info.limit
    };

    if response.data.len() > page_size as usize {
        warn!(
            items = response.data.len(),
            page_size, "server returned more items than the page size; extra items dropped"
        );
    }

    let page = PaginatedPage::new(response.data, info.page, page_size, info.total);

    let disagrees = info.total_pages.is_some_and(|n| n != page.total_pages)
        || info.has_next_page.is_some_and(|v| v != page.has_next)
        || info.has_prev_page.is_some_and(|v| v != page.has_prev);
    if disagrees {
        warn!(
            page = page.page,
            total = page.total,
            "server pagination flags disagree with page/limit/total; using derived values"
        );
    }

    page
}
