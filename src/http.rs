//! Shared plumbing for the JSON-over-HTTP clients

use crate::{Error, Result};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

pub fn client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Error::ExternalService(format!("Failed to build HTTP client: {e}")))
}

/// Maps 429 to `RateLimited` and every other non-success status to `ExternalService`
pub async fn check_status(response: Response, service: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(Error::RateLimited(format!("{service} ({status}): {body}")));
    }
    Err(Error::ExternalService(format!("{service} API error ({status}): {body}")))
}

/// Sends a request, folding transport failures into `ExternalService`
pub async fn send(request: reqwest::RequestBuilder, service: &str) -> Result<Response> {
    let response = request
        .send()
        .await
        .map_err(|e| Error::ExternalService(format!("{service} request failed: {e}")))?;
    check_status(response, service).await
}

pub async fn json<T: serde::de::DeserializeOwned>(response: Response, service: &str) -> Result<T> {
    response
        .json()
        .await
        .map_err(|e| Error::ExternalService(format!("{service} JSON parse error: {e}")))
}
