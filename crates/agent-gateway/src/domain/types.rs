//! Wire types: the JSON-RPC envelope and the public agent card.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::error::ApiError;

/// JSON-RPC protocol version accepted on the message route.
pub const JSONRPC_VERSION: &str = "2.0";

/// A2A protocol version advertised in agent cards.
pub const A2A_PROTOCOL_VERSION: &str = "0.3.0";

/// Longest string id accepted.
pub const MAX_ID_LENGTH: usize = 256;

/// JSON-RPC request id: a string or a number.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RpcId {
    Number(serde_json::Number),
    String(String),
}

impl From<u64> for RpcId {
    fn from(v: u64) -> Self {
        RpcId::Number(v.into())
    }
}

impl From<&str> for RpcId {
    fn from(v: &str) -> Self {
        RpcId::String(v.to_string())
    }
}

impl From<String> for RpcId {
    fn from(v: String) -> Self {
        RpcId::String(v)
    }
}

impl fmt::Display for RpcId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RpcId::Number(n) => write!(f, "{}", n),
            RpcId::String(s) => write!(f, "{}", s),
        }
    }
}

/// Validated JSON-RPC request envelope.
///
/// `params` is carried as an opaque value; only the agent handler interprets
/// it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RpcRequest {
    pub jsonrpc: String,
    pub id: RpcId,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl RpcRequest {
    pub fn new(id: impl Into<RpcId>, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: id.into(),
            method: method.into(),
            params,
        }
    }

    /// Validate a decoded body and turn it into a request.
    ///
    /// Notifications (null id) are rejected: every call gets a response.
    pub fn from_value(value: Value) -> Result<Self, ApiError> {
        let mut object = match value {
            Value::Object(map) => map,
            Value::Array(_) => {
                return Err(ApiError::invalid_request("batch requests are not supported"))
            }
            _ => return Err(ApiError::invalid_request("expected a JSON object")),
        };

        match object.get("jsonrpc").and_then(Value::as_str) {
            Some(JSONRPC_VERSION) => {}
            _ => return Err(ApiError::invalid_request("jsonrpc must be \"2.0\"")),
        }

        let id = match object.remove("id") {
            None | Some(Value::Null) => {
                return Err(ApiError::invalid_request(
                    "null id (notifications not supported)",
                ))
            }
            Some(Value::String(s)) if s.is_empty() => {
                return Err(ApiError::invalid_request("empty string id"))
            }
            Some(Value::String(s)) if s.len() > MAX_ID_LENGTH => {
                return Err(ApiError::invalid_request(format!(
                    "id string too long (max {} chars)",
                    MAX_ID_LENGTH
                )))
            }
            Some(Value::String(s)) => RpcId::String(s),
            Some(Value::Number(n)) => RpcId::Number(n),
            Some(_) => return Err(ApiError::invalid_request("id must be string or number")),
        };

        let method = match object.remove("method") {
            Some(Value::String(m)) if !m.is_empty() => m,
            _ => return Err(ApiError::invalid_request("method must be a non-empty string")),
        };

        let params = match object.remove("params") {
            None | Some(Value::Null) => None,
            Some(p @ Value::Object(_)) | Some(p @ Value::Array(_)) => Some(p),
            Some(_) => {
                return Err(ApiError::invalid_request(
                    "params must be an object or an array",
                ))
            }
        };

        Ok(Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            method,
            params,
        })
    }

    /// Named parameter lookup.
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.params.as_ref().and_then(|p| p.get(name))
    }
}

/// JSON-RPC response envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    pub jsonrpc: String,
    /// `None` serializes as `null`, used when the request id is unknown.
    pub id: Option<RpcId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ApiError>,
}

impl RpcResponse {
    pub fn success(id: RpcId, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id: Some(id),
            result: Some(result),
            error: None,
        }
    }

    pub fn failure(id: Option<RpcId>, error: ApiError) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.to_string(),
            id,
            result: None,
            error: Some(error),
        }
    }
}

/// Static self-description supplied by an agent handler.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentProfile {
    pub name: String,
    pub description: String,
    pub version: String,
    pub skills: Vec<AgentSkill>,
}

/// One capability advertised in the agent card.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentSkill {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub examples: Vec<String>,
}

/// Optional protocol features.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCapabilities {
    pub streaming: bool,
    pub push_notifications: bool,
}

/// Security scheme entry, OpenAPI style.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityScheme {
    #[serde(rename = "type")]
    pub kind: String,
    pub scheme: String,
}

/// Public capability document served at `/.well-known/agent-card.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentCard {
    pub name: String,
    pub description: String,
    pub url: String,
    pub version: String,
    pub protocol_version: String,
    pub preferred_transport: String,
    pub capabilities: AgentCapabilities,
    pub default_input_modes: Vec<String>,
    pub default_output_modes: Vec<String>,
    pub skills: Vec<AgentSkill>,
    pub security_schemes: BTreeMap<String, SecurityScheme>,
    pub security: Vec<BTreeMap<String, Vec<String>>>,
}

impl AgentCard {
    /// Build the card for a profile served at `url`.
    pub fn from_profile(profile: &AgentProfile, url: impl Into<String>) -> Self {
        let mut security_schemes = BTreeMap::new();
        security_schemes.insert(
            "bearer".to_string(),
            SecurityScheme {
                kind: "http".to_string(),
                scheme: "bearer".to_string(),
            },
        );
        let mut requirement = BTreeMap::new();
        requirement.insert("bearer".to_string(), Vec::new());

        Self {
            name: profile.name.clone(),
            description: profile.description.clone(),
            url: url.into(),
            version: profile.version.clone(),
            protocol_version: A2A_PROTOCOL_VERSION.to_string(),
            preferred_transport: "JSONRPC".to_string(),
            capabilities: AgentCapabilities::default(),
            default_input_modes: vec!["text".to_string()],
            default_output_modes: vec!["text".to_string()],
            skills: profile.skills.clone(),
            security_schemes,
            security: vec![requirement],
        }
    }
}
