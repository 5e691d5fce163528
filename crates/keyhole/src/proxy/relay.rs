//! Body pipes between the caller and the upstream
//!
//! Request bodies are handed to the client as a stream. Response bodies are
//! pumped by a spawned task into a bounded channel that backs the caller's
//! response body, so at most `RELAY_BUFFER_CAPACITY` chunks are held per
//! request. The task stops pulling from the upstream as soon as the caller's
//! side of the channel is gone, which drops (and cancels) the upstream
//! transfer.

use axum::body::{Body, HttpBody};
use bytes::Bytes;
use futures::{Stream, StreamExt};
use std::fmt::Display;
use std::io;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::Instrument;

const RELAY_BUFFER_CAPACITY: usize = 32;

/// Turn the inbound body into an outbound one without buffering it.
///
/// Bodies known to be empty are sent as no body at all, so bodiless
/// requests do not go out with chunked framing.
pub fn request_body(body: Body) -> Option<reqwest::Body> {
    if body.size_hint().exact() == Some(0) {
        return None;
    }
    Some(reqwest::Body::wrap_stream(body.into_data_stream()))
}

/// How a response relay ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RelayOutcome {
    Complete,
    CallerGone,
    UpstreamFailed,
    IdleTimeout,
}

enum Pull {
    Chunk(Bytes),
    End,
    Failed(String),
    Idle,
}

async fn pull<S, E>(upstream: &mut S, idle_timeout: Option<Duration>) -> Pull
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: Display,
{
    let item = match idle_timeout {
        Some(limit) => match tokio::time::timeout(limit, upstream.next()).await {
            Ok(item) => item,
            Err(_) => return Pull::Idle,
        },
        None => upstream.next().await,
    };

    match item {
        Some(Ok(chunk)) => Pull::Chunk(chunk),
        Some(Err(e)) => Pull::Failed(e.to_string()),
        None => Pull::End,
    }
}

/// Spawn the upstream → caller pipe and return the caller-facing body
pub fn spawn_response_relay<S, E>(upstream: S, idle_timeout: Option<Duration>) -> Body
where
    S: Stream<Item = Result<Bytes, E>> + Unpin + Send + 'static,
    E: Display + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Result<Bytes, io::Error>>(RELAY_BUFFER_CAPACITY);

    let relay = async move {
        let mut upstream = upstream;
        let mut chunks: u64 = 0;
        let mut bytes: u64 = 0;

        let outcome = loop {
            tokio::select! {
                _ = tx.closed() => break RelayOutcome::CallerGone,
                pulled = pull(&mut upstream, idle_timeout) => match pulled {
                    Pull::Chunk(chunk) => {
                        let len = chunk.len() as u64;
                        if tx.send(Ok(chunk)).await.is_err() {
                            break RelayOutcome::CallerGone;
                        }
                        chunks += 1;
                        bytes += len;
                    }
                    Pull::End => break RelayOutcome::Complete,
                    Pull::Failed(reason) => {
                        tracing::warn!("Upstream body failed mid-stream: {reason}");
                        let _ = tx.send(Err(io::Error::other("upstream body failed"))).await;
                        break RelayOutcome::UpstreamFailed;
                    }
                    Pull::Idle => {
                        tracing::warn!("Upstream body stalled past idle timeout");
                        let _ = tx
                            .send(Err(io::Error::new(io::ErrorKind::TimedOut, "upstream body stalled")))
                            .await;
                        break RelayOutcome::IdleTimeout;
                    }
                },
            }
        };

        match outcome {
            RelayOutcome::Complete => {
                tracing::debug!(chunks, bytes, "Response relay complete");
            }
            RelayOutcome::CallerGone => {
                tracing::info!(chunks, bytes, "Caller disconnected, upstream transfer cancelled");
            }
            RelayOutcome::UpstreamFailed | RelayOutcome::IdleTimeout => {
                tracing::debug!(chunks, bytes, ?outcome, "Response relay aborted");
            }
        }
    };

    tokio::spawn(relay.instrument(tracing::Span::current()));

    Body::from_stream(ReceiverStream::new(rx))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    fn chunks(parts: &[&'static str]) -> Vec<Result<Bytes, io::Error>> {
        parts.iter().map(|p| Ok(Bytes::from_static(p.as_bytes()))).collect()
    }

    #[test]
    fn test_empty_request_body_is_omitted() {
        assert!(request_body(Body::empty()).is_none());
        assert!(request_body(Body::from("")).is_none());
    }

    #[test]
    fn test_non_empty_request_body_is_streamed() {
        assert!(request_body(Body::from(r#"{"model":"gpt-4o"}"#)).is_some());
    }

    #[tokio::test]
    async fn test_relays_chunks_in_order() {
        let upstream = stream::iter(chunks(&["data: 1\n\n", "data: 2\n\n", "data: [DONE]\n\n"]));
        let body = spawn_response_relay(upstream, None);

        let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"data: 1\n\ndata: 2\n\ndata: [DONE]\n\n");
    }

    #[tokio::test]
    async fn test_upstream_failure_surfaces_as_body_error() {
        let upstream = stream::iter(vec![
            Ok(Bytes::from_static(b"partial")),
            Err(io::Error::other("connection reset")),
        ]);
        let body = spawn_response_relay(upstream, None);

        assert!(axum::body::to_bytes(body, usize::MAX).await.is_err());
    }

    #[tokio::test]
    async fn test_idle_timeout_ends_stalled_stream() {
        let upstream = stream::iter(chunks(&["first"])).chain(stream::pending());
        let body = spawn_response_relay(upstream, Some(Duration::from_millis(50)));

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            axum::body::to_bytes(body, usize::MAX),
        )
        .await
        .expect("relay should not hang");
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_dropping_body_cancels_upstream() {
        let (upstream_tx, upstream_rx) = mpsc::channel::<Result<Bytes, io::Error>>(1);
        let body = spawn_response_relay(ReceiverStream::new(upstream_rx), None);

        drop(body);

        tokio::time::timeout(Duration::from_secs(5), upstream_tx.closed())
            .await
            .expect("upstream stream should be dropped once the caller is gone");
    }
}
