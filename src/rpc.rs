use crate::error::ForwardError;
use crate::types::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
use async_trait::async_trait;
use reqwest::{header, Client, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};
use url::Url;

/// Something that can carry JSON-RPC envelopes to the upstream node.
///
/// `Err` means the call never produced a usable answer. For a single request
/// a status other than 200 is not an `Err`: it comes back as a server-error
/// envelope. A batch is forwarded and returned as a unit, so there the same
/// status is an `Err`.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward_one(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, ForwardError>;

    async fn forward_batch(
        &self,
        requests: &[JsonRpcRequest],
    ) -> Result<Vec<JsonRpcResponse>, ForwardError>;
}

pub struct UpstreamClient {
    url: Url,
    http_client: Client,
    timeout: Duration,
}

impl UpstreamClient {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, ForwardError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .tcp_nodelay(true)
            .build()
            .map_err(ForwardError::Client)?;

        Ok(Self {
            url,
            http_client,
            timeout,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn post<T: Serialize + Sync + ?Sized>(
        &self,
        payload: &T,
    ) -> Result<(StatusCode, Vec<u8>, Duration), ForwardError> {
        let body = serde_json::to_vec(payload).map_err(ForwardError::Encode)?;

        let start = Instant::now();
        let response = self
            .http_client
            .post(self.url.clone())
            .header(header::CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(ForwardError::from_send)?;

        let status = response.status();
        let bytes = response.bytes().await.map_err(ForwardError::Body)?;

        Ok((status, bytes.to_vec(), start.elapsed()))
    }
}

#[async_trait]
impl Forwarder for UpstreamClient {
    async fn forward_one(&self, request: &JsonRpcRequest) -> Result<JsonRpcResponse, ForwardError> {
        let (status, body, elapsed) = self.post(request).await.map_err(|e| {
            error!(error = %e, method = %request.method, "upstream request failed");
            e
        })?;

        if status != StatusCode::OK {
            warn!(
                status = status.as_u16(),
                method = %request.method,
                body = %String::from_utf8_lossy(&body),
                "upstream returned non-200 status"
            );
            return Ok(JsonRpcResponse::from_error(
                request.id.clone(),
                soft_failure(status),
            ));
        }

        let response: JsonRpcResponse = decode(&body).map_err(|e| {
            error!(
                error = %e,
                method = %request.method,
                body = %String::from_utf8_lossy(&body),
                "failed to decode upstream response"
            );
            e
        })?;

        debug!(
            method = %request.method,
            status = status.as_u16(),
            duration_ms = elapsed.as_millis() as u64,
            "request forwarded"
        );

        Ok(response)
    }

    async fn forward_batch(
        &self,
        requests: &[JsonRpcRequest],
    ) -> Result<Vec<JsonRpcResponse>, ForwardError> {
        let batch_size = requests.len();
        let (status, body, elapsed) = self.post(requests).await.map_err(|e| {
            error!(error = %e, batch_size, "upstream batch request failed");
            e
        })?;

        if status != StatusCode::OK {
            warn!(
                status = status.as_u16(),
                batch_size,
                body = %String::from_utf8_lossy(&body),
                "upstream returned non-200 status for batch"
            );
            return Err(ForwardError::Status(status));
        }

        let responses: Vec<JsonRpcResponse> = decode(&body).map_err(|e| {
            error!(error = %e, batch_size, "failed to decode upstream batch response");
            e
        })?;

        debug!(
            batch_size,
            status = status.as_u16(),
            duration_ms = elapsed.as_millis() as u64,
            "batch forwarded"
        );

        Ok(responses)
    }
}

pub fn is_timeout_status(status: StatusCode) -> bool {
    status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT
}

fn soft_failure(status: StatusCode) -> JsonRpcError {
    if is_timeout_status(status) {
        JsonRpcError::upstream_timeout()
    } else {
        JsonRpcError::upstream_error()
    }
}

fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T, ForwardError> {
    serde_json::from_slice(body).map_err(ForwardError::Decode)
}
