use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde_json::{Map, Value};

use crate::wire::{ErrorEnvelope, WireError};

/// Vault error codes, as a closed enumeration.
///
/// Codes this client does not recognize land in [`VaultCode::Other`] with the
/// raw code string preserved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VaultCode {
    AuthFailed,
    AccessDenied,
    CredentialNotFound,
    VaultLocked,
    LeaseExpired,
    RateLimited,
    SessionExpired,
    Other(String),
}

impl VaultCode {
    /// Map a wire code string to its variant.
    pub fn from_wire(code: &str) -> Self {
        match code {
            "AUTH_FAILED" => Self::AuthFailed,
            "ACCESS_DENIED" => Self::AccessDenied,
            "CREDENTIAL_NOT_FOUND" => Self::CredentialNotFound,
            "VAULT_LOCKED" => Self::VaultLocked,
            "LEASE_EXPIRED" => Self::LeaseExpired,
            "RATE_LIMITED" => Self::RateLimited,
            "SESSION_EXPIRED" => Self::SessionExpired,
            other => Self::Other(other.to_string()),
        }
    }

    /// The canonical wire string for this code.
    pub fn as_str(&self) -> &str {
        match self {
            Self::AuthFailed => "AUTH_FAILED",
            Self::AccessDenied => "ACCESS_DENIED",
            Self::CredentialNotFound => "CREDENTIAL_NOT_FOUND",
            Self::VaultLocked => "VAULT_LOCKED",
            Self::LeaseExpired => "LEASE_EXPIRED",
            Self::RateLimited => "RATE_LIMITED",
            Self::SessionExpired => "SESSION_EXPIRED",
            Self::Other(raw) => raw,
        }
    }
}

impl fmt::Display for VaultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failure reported by the vault, with its diagnostic envelope preserved.
#[derive(Debug, Clone, thiserror::Error, PartialEq)]
#[error("{code}: {message}")]
pub struct VaultFailure {
    pub code: VaultCode,
    /// Human-readable description.
    pub message: String,
    /// Extended diagnostic text, when the server supplied one.
    pub detail: Option<String>,
    /// Remediation hint, when the server supplied one.
    pub suggestion: Option<String>,
    /// Documentation reference, when the server supplied one.
    pub docs_url: Option<String>,
    /// Extra structured diagnostic fields.
    pub context: Map<String, Value>,
}

impl VaultFailure {
    /// Build a client-originated failure in the server taxonomy.
    pub(crate) fn local(code: VaultCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            detail: None,
            suggestion: None,
            docs_url: None,
            context: Map::new(),
        }
    }
}

/// Fallback code for errors that arrive without a usable code.
const GENERIC_CODE: &str = "INTERNAL_ERROR";

/// Translate a server error into the typed taxonomy.
///
/// Total: every envelope, recognized or not, produces a [`VaultFailure`];
/// legacy bare-string errors map to the generic code with the string as the
/// message.
pub fn translate(err: WireError) -> VaultFailure {
    match err {
        WireError::Message(message) => VaultFailure {
            code: VaultCode::Other(GENERIC_CODE.to_string()),
            message,
            detail: None,
            suggestion: None,
            docs_url: None,
            context: Map::new(),
        },
        WireError::Envelope(envelope) => {
            let ErrorEnvelope {
                code,
                message,
                detail,
                suggestion,
                docs_url,
                context,
            } = envelope;
            VaultFailure {
                code: VaultCode::from_wire(code.as_deref().unwrap_or(GENERIC_CODE)),
                message: message.unwrap_or_else(|| "unknown error".to_string()),
                detail,
                suggestion,
                docs_url,
                context,
            }
        }
    }
}

/// Errors surfaced by the vault client.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] sanctum_transport::TransportError),

    /// Frame-level error.
    #[error("frame error: {0}")]
    Frame(#[from] sanctum_frame::FrameError),

    /// JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// The signing key could not be loaded or is malformed.
    #[error("key error for {path:?}: {reason}")]
    Key { path: PathBuf, reason: String },

    /// The session is already connected or connecting.
    #[error("session already connected")]
    AlreadyConnected,

    /// The session is not connected yet.
    #[error("session not connected")]
    NotConnected,

    /// The session has been closed.
    #[error("session closed")]
    Closed,

    /// The connection died while calls were outstanding.
    #[error("connection lost: {0}")]
    Disconnected(String),

    /// No response arrived within the call timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    /// The server sent a payload this client cannot interpret.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A failure reported by the vault.
    #[error(transparent)]
    Vault(#[from] VaultFailure),
}

pub type Result<T> = std::result::Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    const FIXED_CODES: &[(&str, VaultCode)] = &[
        ("AUTH_FAILED", VaultCode::AuthFailed),
        ("ACCESS_DENIED", VaultCode::AccessDenied),
        ("CREDENTIAL_NOT_FOUND", VaultCode::CredentialNotFound),
        ("VAULT_LOCKED", VaultCode::VaultLocked),
        ("LEASE_EXPIRED", VaultCode::LeaseExpired),
        ("RATE_LIMITED", VaultCode::RateLimited),
        ("SESSION_EXPIRED", VaultCode::SessionExpired),
    ];

    #[test]
    fn every_fixed_code_maps_to_its_variant() {
        for (wire, expected) in FIXED_CODES {
            let code = VaultCode::from_wire(wire);
            assert_eq!(&code, expected);
            assert_eq!(code.as_str(), *wire);
        }
    }

    #[test]
    fn unknown_code_maps_to_other() {
        let code = VaultCode::from_wire("SOLAR_FLARE");
        assert_eq!(code, VaultCode::Other("SOLAR_FLARE".to_string()));
        assert_eq!(code.as_str(), "SOLAR_FLARE");
    }

    #[test]
    fn translate_preserves_envelope_fields() {
        let envelope = ErrorEnvelope {
            code: Some("ACCESS_DENIED".to_string()),
            message: Some("not allowed".to_string()),
            detail: Some("policy forbids".to_string()),
            suggestion: Some("ask an admin".to_string()),
            docs_url: Some("https://docs.example/access".to_string()),
            context: serde_json::json!({ "policy": "deny-all" })
                .as_object()
                .cloned()
                .unwrap(),
        };

        let failure = translate(WireError::Envelope(envelope));
        assert_eq!(failure.code, VaultCode::AccessDenied);
        assert_eq!(failure.message, "not allowed");
        assert_eq!(failure.detail.as_deref(), Some("policy forbids"));
        assert_eq!(failure.suggestion.as_deref(), Some("ask an admin"));
        assert_eq!(failure.docs_url.as_deref(), Some("https://docs.example/access"));
        assert_eq!(
            failure.context.get("policy"),
            Some(&serde_json::Value::String("deny-all".to_string()))
        );
    }

    #[test]
    fn translate_legacy_string_error() {
        let failure = translate(WireError::Message("something went wrong".to_string()));
        assert_eq!(failure.code, VaultCode::Other("INTERNAL_ERROR".to_string()));
        assert_eq!(failure.message, "something went wrong");
    }

    #[test]
    fn translate_envelope_without_code_or_message() {
        let failure = translate(WireError::Envelope(ErrorEnvelope::default()));
        assert_eq!(failure.code, VaultCode::Other("INTERNAL_ERROR".to_string()));
        assert_eq!(failure.message, "unknown error");
    }

    #[test]
    fn failure_display_carries_code_and_message() {
        let failure = VaultFailure::local(VaultCode::VaultLocked, "vault is sealed");
        assert_eq!(failure.to_string(), "VAULT_LOCKED: vault is sealed");
    }
}
