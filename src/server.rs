//! HTTP boundary: turns request bodies into envelopes for the [`Proxy`] and
//! writes its answers back as JSON.
//!
//! Every JSON-RPC outcome, including parse and size errors, is an HTTP 200
//! with an error envelope. Only non-POST methods (405) and a blown request
//! deadline (408) surface as HTTP errors.

use crate::proxy::Proxy;
use crate::types::{Id, JsonRpcError, JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR, PARSE_ERROR};
use axum::{
    body::Bytes,
    error_handling::HandleErrorLayer,
    extract::{Request, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    BoxError, Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tower::ServiceBuilder;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{debug, error, info, warn};

#[derive(Clone)]
pub struct AppState {
    pub proxy: Arc<Proxy>,
    pub max_body_size: usize,
    pub max_batch_response: usize,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

pub fn create_router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/", post(rpc_handler))
        .route("/health", get(health_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CatchPanicLayer::new())
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .timeout(request_timeout),
        )
        .with_state(state)
}

/// Runs until Ctrl+C or SIGTERM, then drains in-flight requests.
pub async fn serve(listener: TcpListener, router: Router) -> std::io::Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
}

pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
    })
}

pub async fn rpc_handler(State(state): State<AppState>, request: Request) -> Response {
    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok());

    if let Some(length) = declared {
        if length > state.max_body_size {
            warn!(
                content_length = length,
                max_size = state.max_body_size,
                "request body too large"
            );
            return reply(&JsonRpcResponse::from_error(
                Id::Null,
                JsonRpcError::request_too_large(),
            ));
        }
    }

    // Chunked bodies carry no length up front; the read itself is capped.
    let body = match axum::body::to_bytes(request.into_body(), state.max_body_size).await {
        Ok(body) => body,
        Err(e) => {
            warn!(error = %e, max_size = state.max_body_size, "failed to read request body");
            return reply(&JsonRpcResponse::from_error(
                Id::Null,
                JsonRpcError::request_too_large(),
            ));
        }
    };

    let payload = trim_whitespace(&body);

    if is_batch(payload) {
        let requests: Vec<JsonRpcRequest> = match serde_json::from_slice(payload) {
            Ok(requests) => requests,
            Err(e) => {
                error!(error = %e, "failed to decode batch request");
                return reply(&parse_error());
            }
        };

        let responses = state.proxy.handle_batch(&requests).await;
        batch_reply(&responses, state.max_batch_response)
    } else {
        let request: JsonRpcRequest = match serde_json::from_slice(payload) {
            Ok(request) => request,
            Err(e) => {
                error!(
                    error = %e,
                    body = %String::from_utf8_lossy(payload),
                    "failed to decode request"
                );
                return reply(&parse_error());
            }
        };

        let response = state.proxy.handle(&request).await;
        reply(&response)
    }
}

/// A payload whose first non-whitespace byte is `[` is a batch.
pub fn is_batch(payload: &[u8]) -> bool {
    trim_whitespace(payload).first() == Some(&b'[')
}

fn trim_whitespace(bytes: &[u8]) -> &[u8] {
    let start = bytes
        .iter()
        .position(|b| !b.is_ascii_whitespace())
        .unwrap_or(bytes.len());
    let end = bytes
        .iter()
        .rposition(|b| !b.is_ascii_whitespace())
        .map_or(start, |i| i + 1);
    &bytes[start..end]
}

fn parse_error() -> JsonRpcResponse {
    JsonRpcResponse::error(Id::Null, PARSE_ERROR, "invalid json")
}

fn reply<T: Serialize>(body: &T) -> Response {
    Json(body).into_response()
}

fn batch_reply(responses: &[JsonRpcResponse], max_batch_response: usize) -> Response {
    let encoded = match serde_json::to_vec(responses) {
        Ok(encoded) => encoded,
        Err(e) => {
            error!(error = %e, "failed to encode batch response");
            return reply(&[JsonRpcResponse::error(
                Id::Null,
                INTERNAL_ERROR,
                "failed to encode batch response",
            )]);
        }
    };

    if encoded.len() > max_batch_response {
        warn!(
            size = encoded.len(),
            limit = max_batch_response,
            "batch response exceeds limit"
        );
        return reply(&[JsonRpcResponse::from_error(
            Id::Null,
            JsonRpcError::batch_response_too_large(),
        )]);
    }

    debug!(size = encoded.len(), items = responses.len(), "writing batch response");
    (
        [(header::CONTENT_TYPE, "application/json")],
        Bytes::from(encoded),
    )
        .into_response()
}

async fn handle_middleware_error(err: BoxError) -> (StatusCode, String) {
    if err.is::<tower::timeout::error::Elapsed>() {
        warn!("request deadline elapsed");
        (StatusCode::REQUEST_TIMEOUT, "request timed out".to_string())
    } else {
        error!(error = %err, "unhandled middleware error");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "internal server error".to_string(),
        )
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl+C received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
}
