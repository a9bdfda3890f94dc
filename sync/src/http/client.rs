//! HTTP client implementation

use device_api::models::ErrorResponse;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};
use url::Url;

use crate::errors::SyncError;

/// Seconds before an API request is abandoned
pub const API_TIMEOUT_SECS: u64 = 30;

/// HTTP client for the device directory API
pub struct HttpClient {
    client: Client,
    base_url: String,
    token: String,
}

impl HttpClient {
    /// Create a new HTTP client authenticating with `token`
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self, SyncError> {
        Url::parse(base_url).map_err(|e| SyncError::ConfigError(format!("Invalid API url {}: {}", base_url, e)))?;

        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(API_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn execute(&self, method: &str, request: RequestBuilder) -> Result<Response, SyncError> {
        let response = request
            .header(header::AUTHORIZATION, format!("Bearer {}", self.token))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!("HTTP {} failed: {} - {}", method, status, body);
            return Err(SyncError::ApiError(api_error_message(status, &body)));
        }

        Ok(response)
    }

    async fn send<T: DeserializeOwned>(&self, method: &str, request: RequestBuilder) -> Result<T, SyncError> {
        Ok(self.execute(method, request).await?.json().await?)
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, SyncError> {
        let url = self.url(path);
        debug!("GET {}", url);
        self.send("GET", self.client.get(&url)).await
    }

    /// Make a POST request
    pub async fn post<T: DeserializeOwned, B: Serialize>(&self, path: &str, body: &B) -> Result<T, SyncError> {
        let url = self.url(path);
        debug!("POST {}", url);
        self.send("POST", self.client.post(&url).json(body)).await
    }

    /// Make a POST request whose reply body is ignored
    pub async fn post_no_content<B: Serialize>(&self, path: &str, body: &B) -> Result<(), SyncError> {
        let url = self.url(path);
        debug!("POST {}", url);
        self.execute("POST", self.client.post(&url).json(body)).await?;
        Ok(())
    }
}

/// Prefer the API's own error message over the raw body
fn api_error_message(status: StatusCode, body: &str) -> String {
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(response) if !response.message.is_empty() => format!("{}: {}", status, response.message),
        _ => format!("{}: {}", status, body),
    }
}
