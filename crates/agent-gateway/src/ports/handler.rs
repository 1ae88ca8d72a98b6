//! Inbound port implemented by every agent.

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::{AgentProfile, ApiResult, RpcRequest};

/// Opaque request handler behind an agent endpoint.
///
/// The gateway authenticates and validates the envelope, then calls
/// [`handle`](AgentHandler::handle) exactly once per request. Whatever the
/// handler returns is reflected verbatim in the JSON-RPC response.
/// Implementations are shared across concurrent requests and must not rely
/// on per-call mutable state.
#[async_trait]
pub trait AgentHandler: Send + Sync {
    /// Self-description used to build the public agent card.
    fn profile(&self) -> AgentProfile;

    /// Process one request. `Err` becomes a JSON-RPC error with HTTP 500.
    async fn handle(&self, request: &RpcRequest) -> ApiResult<Value>;
}
