//! A2A message payloads carried in `message/send`.

use agent_gateway::{ApiError, ApiResult, RpcRequest};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The only JSON-RPC method the built-in agents answer.
pub const MESSAGE_SEND: &str = "message/send";

/// One content part of a message. Non-text parts are accepted and ignored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Part {
    Text { text: String },
    #[serde(other)]
    Other,
}

/// Message sent by a client.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IncomingMessage {
    #[serde(default)]
    pub role: Option<String>,
    pub parts: Vec<Part>,
    #[serde(default)]
    pub message_id: Option<String>,
    #[serde(default)]
    pub context_id: Option<String>,
}

impl IncomingMessage {
    /// All text parts joined with newlines.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                Part::Text { text } => Some(text.as_str()),
                Part::Other => None,
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Reply produced by an agent.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentMessage {
    pub kind: String,
    pub role: String,
    pub message_id: String,
    pub parts: Vec<Part>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_id: Option<String>,
}

impl AgentMessage {
    /// Single-text-part agent reply in the same context as `incoming`.
    pub fn reply_to(incoming: &IncomingMessage, text: impl Into<String>) -> Self {
        Self {
            kind: "message".to_string(),
            role: "agent".to_string(),
            message_id: uuid::Uuid::new_v4().to_string(),
            parts: vec![Part::Text { text: text.into() }],
            context_id: incoming.context_id.clone(),
        }
    }

    pub fn into_value(self) -> ApiResult<Value> {
        serde_json::to_value(self).map_err(|e| ApiError::internal(e.to_string()))
    }
}

/// Check the method and pull the message and its text out of a request.
pub fn incoming_text(request: &RpcRequest) -> ApiResult<(IncomingMessage, String)> {
    if request.method != MESSAGE_SEND {
        return Err(ApiError::method_not_found(&request.method));
    }

    let raw = request
        .param("message")
        .ok_or_else(|| ApiError::invalid_params("missing 'message' field"))?;
    let message: IncomingMessage = serde_json::from_value(raw.clone())
        .map_err(|e| ApiError::invalid_params(format!("malformed message: {}", e)))?;

    let text = message.text();
    if text.trim().is_empty() {
        return Err(ApiError::invalid_params("message has no text content"));
    }
    Ok((message, text))
}
