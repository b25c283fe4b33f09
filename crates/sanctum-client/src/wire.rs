//! Wire envelope types for the vault protocol.
//!
//! Requests are `{id, method, params}`; responses are `{id, result}` or
//! `{id, error}`. Frames carry compact JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A request envelope.
#[derive(Debug, Serialize)]
pub(crate) struct WireRequest<'a> {
    pub id: u64,
    pub method: &'a str,
    pub params: Value,
}

/// A response envelope.
#[derive(Debug, Deserialize)]
pub(crate) struct WireResponse {
    #[serde(default)]
    pub id: Option<u64>,
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<WireError>,
}

/// A server-reported error: a structured envelope, or a legacy bare string.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum WireError {
    Envelope(ErrorEnvelope),
    Message(String),
}

/// Structured error envelope as sent by the vault.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ErrorEnvelope {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub suggestion: Option<String>,
    #[serde(default)]
    pub docs_url: Option<String>,
    #[serde(default)]
    pub context: Map<String, Value>,
}

/// A credential visible to the agent: path plus listing tags.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct CredentialRef {
    pub path: String,
    #[serde(default)]
    pub tags: Vec<String>,
}
