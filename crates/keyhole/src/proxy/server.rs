//! HTTP server for the gateway
//!
//! A single fallback handler receives every request, classifies its path and
//! either answers with the static bypass response or hands the request to
//! the [`Forwarder`].

use axum::{
    Router,
    body::Body,
    extract::{Request, State},
    http::Response,
    response::IntoResponse,
};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing::Instrument;
use uuid::Uuid;

use super::classifier::{BYPASS_BODY, Route, classify, normalize_path};
use super::credential::Credential;
use super::forward::{ForwardTimeouts, Forwarder};
use super::upstream::UpstreamOrigin;
use crate::config::Config;
use crate::error::{KeyholeError, Result};

/// Shared, read-only state for all handlers
#[derive(Debug, Clone)]
pub struct AppState {
    /// Paths starting with this prefix are forwarded
    pub prefix: String,
    /// Pipeline for forwarded requests
    pub forwarder: Forwarder,
}

impl AppState {
    pub fn new(prefix: impl Into<String>, forwarder: Forwarder) -> Self {
        Self {
            prefix: prefix.into(),
            forwarder,
        }
    }

    /// Build state from validated configuration and a loaded credential
    pub fn from_config(config: &Config, credential: Credential) -> Result<Self> {
        let origin = UpstreamOrigin::parse(&config.upstream.origin)?;
        let forwarder = Forwarder::new(
            origin,
            credential,
            ForwardTimeouts::from(&config.upstream),
        )?;
        Ok(Self::new(config.upstream.prefix.clone(), forwarder))
    }
}

/// The gateway server
pub struct ProxyServer {
    config: Config,
    credential: Credential,
}

impl ProxyServer {
    pub fn new(config: Config, credential: Credential) -> Self {
        Self { config, credential }
    }

    /// Bind the configured address and serve until Ctrl+C or SIGTERM
    pub async fn serve(self) -> Result<()> {
        let addr = self.config.listen_addr()?;
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| KeyholeError::Proxy(format!("Failed to bind to {addr}: {e}")))?;

        self.serve_on(listener).await
    }

    /// Serve on an already-bound listener
    pub async fn serve_on(self, listener: TcpListener) -> Result<()> {
        let state = Arc::new(AppState::from_config(&self.config, self.credential)?);
        let app = create_router(state.clone());

        let addr = listener.local_addr()?;
        tracing::info!("Starting gateway on {addr}");
        tracing::info!(
            "Forwarding {}* to {}",
            state.prefix,
            state.forwarder.origin().as_str()
        );

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| KeyholeError::Proxy(format!("Server error: {e}")))?;

        tracing::info!("Gateway shut down gracefully");
        Ok(())
    }
}

/// Create the router; every method and path lands in the gateway handler
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .fallback(gateway_handler)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn gateway_handler(State(state): State<Arc<AppState>>, request: Request) -> Response<Body> {
    let span = tracing::info_span!(
        "request",
        id = %Uuid::new_v4(),
        method = %request.method(),
        path = %request.uri().path(),
    );

    async move {
        let route = normalize_path(request.uri().path())
            .map(|path| (classify(&path, &state.prefix), path));

        match route {
            None | Some((Route::Bypass, _)) => {
                tracing::debug!("Bypassing upstream");
                bypass_response()
            }
            Some((Route::Forward, path)) => {
                let started = Instant::now();
                match state.forwarder.forward(&path, request).await {
                    Ok(response) => {
                        tracing::info!(
                            status = response.status().as_u16(),
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Upstream responded"
                        );
                        response
                    }
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Forwarding failed"
                        );
                        e.into_response()
                    }
                }
            }
        }
    }
    .instrument(span)
    .await
}

/// The static response for paths outside the forwarding prefix
pub fn bypass_response() -> Response<Body> {
    Response::new(Body::from(BYPASS_BODY))
}

/// Wait for shutdown signal (Ctrl+C or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown");
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use tower::ServiceExt;

    fn test_state(origin: &str) -> Arc<AppState> {
        let forwarder = Forwarder::new(
            UpstreamOrigin::parse(origin).unwrap(),
            Credential::new("sk-server-test").unwrap(),
            ForwardTimeouts::default(),
        )
        .unwrap();
        Arc::new(AppState::new("/v1/", forwarder))
    }

    #[tokio::test]
    async fn test_root_path_bypasses() {
        let app = create_router(test_state("http://127.0.0.1:9"));

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .uri("/")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers().get("content-type").is_none());

        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert_eq!(&body_bytes[..], b"OK");
    }

    #[tokio::test]
    async fn test_bypass_ignores_method() {
        let app = create_router(test_state("http://127.0.0.1:9"));

        let response = app
            .oneshot(
                axum::http::Request::builder()
                    .method("DELETE")
                    .uri("/health")
                    .body(Body::from("ignored"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_state_from_default_config() {
        let state = AppState::from_config(
            &Config::default(),
            Credential::new("sk-config").unwrap(),
        )
        .unwrap();
        assert_eq!(state.prefix, "/v1/");
        assert_eq!(state.forwarder.origin().as_str(), "https://api.openai.com");
    }

    #[test]
    fn test_state_rejects_bad_origin() {
        let mut config = Config::default();
        config.upstream.origin = "gopher://example.com".to_string();
        assert!(AppState::from_config(&config, Credential::new("sk").unwrap()).is_err());
    }
}
