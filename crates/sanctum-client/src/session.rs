use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use sanctum_frame::DEFAULT_MAX_PAYLOAD;
use sanctum_transport::{ConnectTarget, VaultStream};
use serde_json::{json, Map, Value};
use tracing::{info, warn};

use crate::auth;
use crate::dispatch::{DispatchConfig, Dispatcher};
use crate::error::{ClientError, Result};
use crate::identity::AgentIdentity;
use crate::lease::{Lease, LeaseTracker};
use crate::lock;
use crate::wire::CredentialRef;

/// Session lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Unauthenticated,
    Authenticating,
    Authenticated,
    Closed,
}

/// Configuration for a vault session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Where to connect when `connect` gets no explicit target.
    pub target: Option<ConnectTarget>,
    /// Signing key file override; the default derives from the agent name.
    pub key_path: Option<PathBuf>,
    /// Timeout for ordinary request/response round trips.
    pub request_timeout: Duration,
    /// Timeout for each authentication round trip.
    pub auth_timeout: Duration,
    /// Maximum wire message size in bytes.
    pub max_message_size: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            target: None,
            key_path: None,
            request_timeout: Duration::from_secs(30),
            auth_timeout: Duration::from_secs(5),
            max_message_size: DEFAULT_MAX_PAYLOAD,
        }
    }
}

/// Connect to the vault as `agent_name` using default configuration.
pub fn connect(agent_name: &str) -> Result<VaultSession> {
    connect_with_config(agent_name, SessionConfig::default())
}

/// Connect to the vault with explicit configuration.
pub fn connect_with_config(agent_name: &str, config: SessionConfig) -> Result<VaultSession> {
    let session = VaultSession::with_config(agent_name, config);
    session.connect(None)?;
    Ok(session)
}

/// An authenticated session with the Sanctum vault.
///
/// Owns the transport, the authenticated state and the lease tracker for its
/// lifetime. All operations take `&self`; concurrent callers each block only
/// on their own call. Dropping the session releases tracked leases and closes
/// the connection.
pub struct VaultSession {
    agent_name: String,
    config: SessionConfig,
    state: Mutex<State>,
}

enum State {
    Unauthenticated,
    Authenticating,
    Authenticated(Arc<Active>),
    Closed,
}

struct Active {
    dispatcher: Dispatcher,
    session_id: String,
    leases: LeaseTracker,
}

impl VaultSession {
    /// Create an unconnected session with default configuration.
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self::with_config(agent_name, SessionConfig::default())
    }

    /// Create an unconnected session with explicit configuration.
    pub fn with_config(agent_name: impl Into<String>, config: SessionConfig) -> Self {
        Self {
            agent_name: agent_name.into(),
            config,
            state: Mutex::new(State::Unauthenticated),
        }
    }

    /// Connect and authenticate.
    ///
    /// Target precedence: explicit argument, then the configured target, then
    /// the default socket path. Rejected while a connection attempt is in
    /// flight or after one succeeded; a closed session stays closed.
    pub fn connect(&self, target: Option<ConnectTarget>) -> Result<()> {
        {
            let mut state = lock(&self.state);
            match &*state {
                State::Unauthenticated => {}
                State::Authenticating | State::Authenticated(_) => {
                    return Err(ClientError::AlreadyConnected)
                }
                State::Closed => return Err(ClientError::Closed),
            }
            *state = State::Authenticating;
        }

        match self.establish(target) {
            Ok(active) => {
                let mut state = lock(&self.state);
                if matches!(&*state, State::Closed) {
                    // Closed from another caller while we were authenticating.
                    drop(state);
                    active.dispatcher.shutdown();
                    return Err(ClientError::Closed);
                }
                *state = State::Authenticated(Arc::new(active));
                Ok(())
            }
            Err(err) => {
                let mut state = lock(&self.state);
                if matches!(&*state, State::Authenticating) {
                    *state = State::Unauthenticated;
                }
                Err(err)
            }
        }
    }

    fn establish(&self, target: Option<ConnectTarget>) -> Result<Active> {
        let target = target
            .or_else(|| self.config.target.clone())
            .unwrap_or_else(ConnectTarget::default_socket);
        let identity = AgentIdentity::load(&self.agent_name, self.config.key_path.as_deref())?;

        info!(agent = %self.agent_name, %target, "connecting to vault");
        let stream = VaultStream::connect(&target)?;
        let dispatcher = Dispatcher::new(
            stream,
            DispatchConfig {
                request_timeout: self.config.request_timeout,
                max_message_size: self.config.max_message_size,
            },
        )?;

        let auth = auth::authenticate(&dispatcher, &identity, self.config.auth_timeout)?;
        info!(agent = %self.agent_name, "session authenticated");

        Ok(Active {
            dispatcher,
            session_id: auth.session_id,
            leases: LeaseTracker::new(),
        })
    }

    /// Retrieve a credential value as a UTF-8 string.
    ///
    /// The lease is tracked and auto-released on [`close`](Self::close).
    pub fn retrieve(&self, path: &str) -> Result<String> {
        decode_secret(&self.retrieve_call(path, None)?)
    }

    /// Like [`retrieve`](Self::retrieve), with an explicit lease TTL in
    /// seconds.
    pub fn retrieve_with_ttl(&self, path: &str, ttl_secs: u64) -> Result<String> {
        decode_secret(&self.retrieve_call(path, Some(ttl_secs))?)
    }

    /// Retrieve a credential and return the full result mapping (lease id,
    /// ttl, metadata) without decoding the value. The lease is tracked.
    pub fn retrieve_raw(&self, path: &str) -> Result<Map<String, Value>> {
        self.retrieve_call(path, None)
    }

    /// Like [`retrieve_raw`](Self::retrieve_raw), with an explicit lease TTL
    /// in seconds.
    pub fn retrieve_raw_with_ttl(&self, path: &str, ttl_secs: u64) -> Result<Map<String, Value>> {
        self.retrieve_call(path, Some(ttl_secs))
    }

    /// List credentials the agent has access to, in server order.
    pub fn list(&self) -> Result<Vec<CredentialRef>> {
        let active = self.active()?;
        let result = active
            .dispatcher
            .call("list", json!({ "session_id": active.session_id }))?;
        let credentials = result
            .get("credentials")
            .cloned()
            .unwrap_or_else(|| Value::Array(Vec::new()));
        serde_json::from_value(credentials)
            .map_err(|e| ClientError::Protocol(format!("malformed credential list: {e}")))
    }

    /// Use-not-retrieve: the vault performs `operation` with the credential
    /// server-side and returns only the result. No lease is created.
    pub fn use_credential(
        &self,
        path: &str,
        operation: &str,
        params: Option<Map<String, Value>>,
    ) -> Result<Map<String, Value>> {
        let active = self.active()?;
        let mut rpc = json!({
            "session_id": active.session_id,
            "path": path,
            "operation": operation,
        });
        if let Some(params) = params {
            rpc["params"] = Value::Object(params);
        }
        into_object(active.dispatcher.call("use", rpc)?)
    }

    /// Explicitly release a credential lease.
    pub fn release_lease(&self, lease_id: &str) -> Result<()> {
        let active = self.active()?;
        active.leases.release(&active.dispatcher, lease_id)
    }

    /// Release all tracked leases and disconnect.
    ///
    /// Best effort: individual release failures are collected and returned,
    /// never raised, and never stop the remaining releases. Idempotent — a
    /// second close does nothing.
    pub fn close(&self) -> Vec<ClientError> {
        let previous = {
            let mut state = lock(&self.state);
            std::mem::replace(&mut *state, State::Closed)
        };
        let State::Authenticated(active) = previous else {
            return Vec::new();
        };

        let failures = active.leases.release_all(&active.dispatcher);
        for err in &failures {
            warn!(%err, "lease release failed during close");
        }
        active.dispatcher.shutdown();
        info!(agent = %self.agent_name, "session closed");
        failures
    }

    /// The agent this session authenticates as.
    pub fn agent_name(&self) -> &str {
        &self.agent_name
    }

    /// Current lifecycle status.
    pub fn status(&self) -> SessionStatus {
        match &*lock(&self.state) {
            State::Unauthenticated => SessionStatus::Unauthenticated,
            State::Authenticating => SessionStatus::Authenticating,
            State::Authenticated(_) => SessionStatus::Authenticated,
            State::Closed => SessionStatus::Closed,
        }
    }

    /// The server-assigned session id, once authenticated.
    pub fn session_id(&self) -> Option<String> {
        match &*lock(&self.state) {
            State::Authenticated(active) => Some(active.session_id.clone()),
            _ => None,
        }
    }

    /// Ids of all currently tracked leases.
    pub fn tracked_leases(&self) -> Vec<String> {
        match &*lock(&self.state) {
            State::Authenticated(active) => active.leases.tracked_ids(),
            _ => Vec::new(),
        }
    }

    fn active(&self) -> Result<Arc<Active>> {
        match &*lock(&self.state) {
            State::Authenticated(active) => Ok(Arc::clone(active)),
            State::Closed => Err(ClientError::Closed),
            _ => Err(ClientError::NotConnected),
        }
    }

    fn retrieve_call(&self, path: &str, ttl: Option<u64>) -> Result<Map<String, Value>> {
        let active = self.active()?;
        let mut params = json!({ "session_id": active.session_id, "path": path });
        if let Some(ttl) = ttl {
            params["ttl"] = json!(ttl);
        }

        let result = into_object(active.dispatcher.call("retrieve", params)?)?;
        let lease_id = result
            .get("lease_id")
            .and_then(Value::as_str)
            .ok_or_else(|| ClientError::Protocol("retrieve result missing 'lease_id'".to_string()))?;

        active.leases.record(Lease {
            id: lease_id.to_string(),
            path: path.to_string(),
            ttl: result.get("ttl").and_then(Value::as_u64),
        });
        Ok(result)
    }
}

impl Drop for VaultSession {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn into_object(value: Value) -> Result<Map<String, Value>> {
    match value {
        Value::Object(map) => Ok(map),
        other => Err(ClientError::Protocol(format!(
            "expected a result object, got {other}"
        ))),
    }
}

fn decode_secret(result: &Map<String, Value>) -> Result<String> {
    let value_hex = result
        .get("value")
        .and_then(Value::as_str)
        .ok_or_else(|| ClientError::Protocol("retrieve result missing 'value'".to_string()))?;
    let bytes = hex::decode(value_hex)
        .map_err(|_| ClientError::Protocol("secret value is not valid hex".to_string()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
