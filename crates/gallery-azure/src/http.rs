//! Response classification shared by the adapters

use gallery_core::TransportError;
use reqwest::{Response, StatusCode};
use std::time::Duration;

/// Build the HTTP client used by both adapters
pub(crate) fn client() -> Result<reqwest::Client, TransportError> {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(15))
        .timeout(Duration::from_secs(120))
        .user_agent(concat!("gallery-azure/", env!("CARGO_PKG_VERSION")))
        .build()
        .map_err(|error| TransportError::request(error.to_string()))
}

/// Map a send failure
pub(crate) fn send_error(error: &reqwest::Error) -> TransportError {
    TransportError::request(error.to_string())
}

/// Map a non-success status and its body
pub(crate) fn classify(status: StatusCode, body: String) -> TransportError {
    let message = if body.trim().is_empty() {
        status
            .canonical_reason()
            .unwrap_or("no response body")
            .to_string()
    } else {
        body
    };
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => TransportError::Unauthorized(message),
        StatusCode::NOT_FOUND => TransportError::NotFound(message),
        _ => TransportError::status(status.as_u16(), message),
    }
}

/// Pass success responses through, classify the rest
pub(crate) async fn check(response: Response) -> Result<Response, TransportError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "unable to read response body".to_string());
    Err(classify(status, body))
}

/// Read a success body as text
pub(crate) async fn text(response: Response) -> Result<String, TransportError> {
    check(response)
        .await?
        .text()
        .await
        .map_err(|error| TransportError::Malformed(error.to_string()))
}
