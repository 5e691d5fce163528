//! The forwarding pipeline: outbound request construction, the upstream
//! call, and response relay.

use axum::{
    body::{Body, HttpBody},
    http::{Method, Request, Response, header::CONTENT_LENGTH},
};
use std::time::Duration;
use url::Url;

use super::credential::Credential;
use super::error::ProxyError;
use super::headers::{RelayHeaders, outbound_headers, relayed_response_headers};
use super::relay;
use super::upstream::UpstreamOrigin;
use crate::config::UpstreamConfig;
use crate::error::{KeyholeError, Result};

/// Time bounds applied to each upstream call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ForwardTimeouts {
    /// TCP/TLS connect bound
    pub connect: Duration,
    /// Bound on waiting for upstream response headers
    pub response: Duration,
    /// Bound on the gap between response body chunks
    pub idle: Option<Duration>,
}

impl Default for ForwardTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_secs(10),
            response: Duration::from_secs(300),
            idle: None,
        }
    }
}

impl From<&UpstreamConfig> for ForwardTimeouts {
    fn from(config: &UpstreamConfig) -> Self {
        Self {
            connect: config.connect_timeout(),
            response: config.response_timeout(),
            idle: config.idle_timeout(),
        }
    }
}

/// Everything about an outbound call except its body
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: Url,
    pub headers: RelayHeaders,
}

/// Relays requests to the single configured upstream
#[derive(Debug, Clone)]
pub struct Forwarder {
    client: reqwest::Client,
    origin: UpstreamOrigin,
    credential: Credential,
    timeouts: ForwardTimeouts,
}

impl Forwarder {
    pub fn new(
        origin: UpstreamOrigin,
        credential: Credential,
        timeouts: ForwardTimeouts,
    ) -> Result<Self> {
        // Redirects go back to the caller; following them could carry the
        // credential somewhere other than the configured origin.
        let client = reqwest::Client::builder()
            .connect_timeout(timeouts.connect)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| KeyholeError::Proxy(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            origin,
            credential,
            timeouts,
        })
    }

    pub fn origin(&self) -> &UpstreamOrigin {
        &self.origin
    }

    /// Derive the outbound request from the inbound method, path and query
    pub fn build_outbound(
        &self,
        method: &Method,
        path: &str,
        query: Option<&str>,
    ) -> std::result::Result<OutboundRequest, ProxyError> {
        let url = self
            .origin
            .target_url(path, query)
            .map_err(|e| ProxyError::InvalidRequest(e.to_string()))?;

        Ok(OutboundRequest {
            method: method.clone(),
            url,
            headers: outbound_headers(&self.credential),
        })
    }

    /// Forward a request to `path` on the upstream and relay the response.
    ///
    /// `path` is the normalized form of the request path (see
    /// [`normalize_path`](crate::proxy::normalize_path)); the inbound
    /// query is carried over as is. The upstream status and body are passed
    /// through untouched; headers go through [`relayed_response_headers`].
    /// Upstream 4xx/5xx responses are relayed like any other response. Only
    /// failures to obtain a response become a [`ProxyError`].
    pub async fn forward(
        &self,
        path: &str,
        request: Request<Body>,
    ) -> std::result::Result<Response<Body>, ProxyError> {
        let (parts, body) = request.into_parts();
        let outbound = self.build_outbound(&parts.method, path, parts.uri.query())?;

        tracing::debug!(method = %outbound.method, url = %outbound.url, "Forwarding request");

        let mut builder = self
            .client
            .request(outbound.method, outbound.url)
            .headers(outbound.headers.into_header_map());
        // A sized inbound body keeps its length upstream instead of going
        // out chunked.
        let length = body.size_hint().exact();
        if let Some(body) = relay::request_body(body) {
            builder = builder.body(body);
            if let Some(length) = length {
                builder = builder.header(CONTENT_LENGTH, length);
            }
        }

        let upstream = match tokio::time::timeout(self.timeouts.response, builder.send()).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(ProxyError::from_reqwest(&e)),
            Err(_) => {
                return Err(ProxyError::UpstreamTimeout(format!(
                    "No response headers within {}s",
                    self.timeouts.response.as_secs_f64()
                )));
            }
        };

        let status = upstream.status();
        let headers = relayed_response_headers(upstream.headers()).into_header_map();
        let body = relay::spawn_response_relay(Box::pin(upstream.bytes_stream()), self.timeouts.idle);

        let mut response = Response::new(body);
        *response.status_mut() = status;
        *response.headers_mut() = headers;
        Ok(response)
    }
}
