use std::time::Duration;

use serde_json::{json, Value};
use tracing::debug;

use crate::dispatch::Dispatcher;
use crate::error::{ClientError, Result, VaultCode, VaultFailure};
use crate::identity::AgentIdentity;

/// Handshake progress, in protocol order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    Init,
    ChallengeReceived,
    ResponseSent,
    Authenticated,
    Failed,
}

/// Outcome of a successful handshake.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResult {
    /// Server-assigned session identifier.
    pub session_id: String,
}

/// Run the challenge-response handshake over an established dispatcher.
///
/// Proves possession of the agent's signing key without transmitting it: the
/// server picks the nonce, the client returns only its signature over it.
/// The nonce is server-chosen and single-use per connection, which rules out
/// replay.
///
/// Any failure shuts the transport down; no retry is attempted here.
pub fn authenticate(
    dispatcher: &Dispatcher,
    identity: &AgentIdentity,
    timeout: Duration,
) -> Result<AuthResult> {
    match run_handshake(dispatcher, identity, timeout) {
        Ok(result) => Ok(result),
        Err(err) => {
            debug!(
                agent = identity.name(),
                state = ?AuthState::Failed,
                "authentication failed, closing transport"
            );
            dispatcher.shutdown();
            Err(err)
        }
    }
}

fn run_handshake(
    dispatcher: &Dispatcher,
    identity: &AgentIdentity,
    timeout: Duration,
) -> Result<AuthResult> {
    let mut state = AuthState::Init;

    let hello = dispatcher.call_with_timeout(
        "authenticate",
        json!({ "agent_name": identity.name() }),
        timeout,
    )?;
    let session_id = field_str(&hello, "session_id")?;
    let challenge_hex = field_str(&hello, "challenge")?;
    let challenge =
        hex::decode(&challenge_hex).map_err(|_| auth_failed("challenge is not valid hex"))?;
    transition(&mut state, AuthState::ChallengeReceived);

    let signature = identity.sign(&challenge);

    transition(&mut state, AuthState::ResponseSent);
    let ack = dispatcher.call_with_timeout(
        "challenge_response",
        json!({
            "session_id": session_id,
            "signature": hex::encode(signature.to_bytes()),
            "verify_key": identity.verify_key_hex(),
        }),
        timeout,
    )?;

    if !ack
        .get("authenticated")
        .and_then(Value::as_bool)
        .unwrap_or(false)
    {
        return Err(auth_failed("authentication not confirmed"));
    }
    transition(&mut state, AuthState::Authenticated);

    Ok(AuthResult { session_id })
}

fn transition(state: &mut AuthState, next: AuthState) {
    debug!(from = ?state, to = ?next, "auth state");
    *state = next;
}

fn auth_failed(message: &str) -> ClientError {
    ClientError::Vault(VaultFailure::local(VaultCode::AuthFailed, message))
}

fn field_str(value: &Value, key: &str) -> Result<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| auth_failed(&format!("server reply missing '{key}'")))
}
