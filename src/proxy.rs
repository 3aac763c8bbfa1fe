use crate::rpc::Forwarder;
use crate::types::{
    Id, JsonRpcError, JsonRpcRequest, JsonRpcResponse, INTERNAL_ERROR, INVALID_REQUEST,
};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Validates JSON-RPC envelopes and relays them to the upstream.
///
/// Every path ends in a response envelope: validation failures, transport
/// failures and upstream errors are all reported in-band.
pub struct Proxy {
    forwarder: Arc<dyn Forwarder>,
    max_batch_items: usize,
}

impl Proxy {
    pub fn new(forwarder: Arc<dyn Forwarder>, max_batch_items: usize) -> Self {
        Self {
            forwarder,
            max_batch_items,
        }
    }

    pub async fn handle(&self, request: &JsonRpcRequest) -> JsonRpcResponse {
        if !request.has_valid_version() {
            warn!(
                version = %request.jsonrpc,
                method = %request.method,
                "invalid jsonrpc version"
            );
            return JsonRpcResponse::error(
                request.id.clone(),
                INVALID_REQUEST,
                "jsonrpc must be 2.0",
            );
        }

        if request.method.is_empty() {
            warn!("empty method in request");
            return JsonRpcResponse::error(
                request.id.clone(),
                INVALID_REQUEST,
                "method cannot be empty",
            );
        }

        info!(method = %request.method, id = ?request.id, "handling request");

        match self.forwarder.forward_one(request).await {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, method = %request.method, "failed to forward request");
                JsonRpcResponse::error(
                    request.id.clone(),
                    INTERNAL_ERROR,
                    "failed to forward request to upstream",
                )
            }
        }
    }

    /// Handles a batch as one unit.
    ///
    /// A rejected batch yields exactly one envelope. Validation stops at the
    /// first item with a bad version and nothing is forwarded; items are not
    /// checked for an empty method.
    pub async fn handle_batch(&self, requests: &[JsonRpcRequest]) -> Vec<JsonRpcResponse> {
        if requests.is_empty() {
            warn!("empty batch request");
            return vec![JsonRpcResponse::error(
                Id::Null,
                INVALID_REQUEST,
                "empty batch request",
            )];
        }

        if requests.len() > self.max_batch_items {
            warn!(
                size = requests.len(),
                limit = self.max_batch_items,
                "batch request exceeds limit"
            );
            return vec![JsonRpcResponse::from_error(
                Id::Null,
                JsonRpcError::batch_too_large(),
            )];
        }

        info!(size = requests.len(), "handling batch request");

        if let Some((index, invalid)) = requests
            .iter()
            .enumerate()
            .find(|(_, req)| !req.has_valid_version())
        {
            warn!(
                index,
                version = %invalid.jsonrpc,
                "invalid jsonrpc version in batch"
            );
            return vec![JsonRpcResponse::error(
                invalid.id.clone(),
                INVALID_REQUEST,
                "jsonrpc must be 2.0",
            )];
        }

        match self.forwarder.forward_batch(requests).await {
            Ok(responses) => responses,
            Err(e) => {
                error!(error = %e, size = requests.len(), "failed to forward batch request");
                requests
                    .iter()
                    .map(|req| {
                        JsonRpcResponse::error(
                            req.id.clone(),
                            INTERNAL_ERROR,
                            "failed to forward batch request",
                        )
                    })
                    .collect()
            }
        }
    }
}
