//! Request-scoped failures and their caller-visible responses
//!
//! Response bodies are fixed strings per error kind. The underlying error
//! text stays in the logs so nothing about the upstream call (URL, headers,
//! credential) is echoed back to the caller.

use axum::{
    body::Body,
    http::{HeaderValue, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProxyError {
    /// Connection refused, DNS failure, TLS failure or a broken transfer
    #[error("Upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    /// No response headers within the configured bound
    #[error("Upstream timed out: {0}")]
    UpstreamTimeout(String),

    /// The inbound request cannot be turned into an outbound one
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl ProxyError {
    /// Classify a client error from the outbound call
    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::UpstreamTimeout(format!("Request timed out: {err}"))
        } else if err.is_connect() {
            Self::UpstreamUnreachable(format!("Failed to connect to upstream: {err}"))
        } else {
            Self::UpstreamUnreachable(format!("Request failed: {err}"))
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::UpstreamUnreachable(_) => StatusCode::BAD_GATEWAY,
            Self::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            Self::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            Self::UpstreamUnreachable(_) => "upstream_unreachable",
            Self::UpstreamTimeout(_) => "upstream_timeout",
            Self::InvalidRequest(_) => "invalid_request",
        }
    }

    fn public_message(&self) -> &'static str {
        match self {
            Self::UpstreamUnreachable(_) => "The upstream service could not be reached",
            Self::UpstreamTimeout(_) => "The upstream service did not respond in time",
            Self::InvalidRequest(_) => "The request path cannot be forwarded",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        create_error_response(self.status(), self.error_type(), self.public_message())
    }
}

/// Create a JSON error response
pub fn create_error_response(status: StatusCode, error_type: &str, message: &str) -> Response {
    let body = serde_json::json!({
        "error": {
            "type": error_type,
            "message": message,
        }
    });

    let mut response = Response::new(Body::from(body.to_string()));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
