//! Client engine for the Sanctum credential vault.
//!
//! Connects to the vault daemon over a Unix domain socket or TCP, proves the
//! agent's identity by signing a server-issued challenge with its Ed25519
//! key, and exchanges correlated request/response messages. Leases returned
//! by retrieval calls are tracked and released on demand or at session
//! teardown.
//!
//! ```no_run
//! let session = sanctum_client::connect("my-agent")?;
//! let api_key = session.retrieve("openai/api_key")?;
//! let header = session.use_credential("openai/api_key", "http_header", None)?;
//! session.close();
//! # Ok::<(), sanctum_client::ClientError>(())
//! ```

pub mod auth;
pub mod dispatch;
pub mod error;
pub mod identity;
pub mod lease;
pub mod session;
pub mod wire;

pub use auth::{AuthResult, AuthState};
pub use dispatch::{DispatchConfig, Dispatcher};
pub use error::{translate, ClientError, Result, VaultCode, VaultFailure};
pub use identity::AgentIdentity;
pub use lease::{Lease, LeaseTracker};
pub use sanctum_transport::ConnectTarget;
pub use session::{connect, connect_with_config, SessionConfig, SessionStatus, VaultSession};
pub use wire::{CredentialRef, ErrorEnvelope, WireError};

/// Lock a mutex, recovering the guard if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &std::sync::Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
}
