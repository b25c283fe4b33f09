use std::fmt;
use std::path::{Path, PathBuf};

use ed25519_dalek::{Signature, Signer, SigningKey, VerifyingKey};

use crate::error::{ClientError, Result};

const SEED_LEN: usize = 32;

/// The agent identity: a name and the Ed25519 key that proves it.
///
/// The signing key lives only in memory and is never serialized; it is used
/// once per session to sign the server-issued challenge.
pub struct AgentIdentity {
    name: String,
    key: SigningKey,
}

impl AgentIdentity {
    /// Wrap an already-loaded signing key.
    pub fn new(name: impl Into<String>, key: SigningKey) -> Self {
        Self {
            name: name.into(),
            key,
        }
    }

    /// Load the identity key from a file containing a hex-encoded 32-byte seed.
    ///
    /// With no explicit path, the key is looked up at
    /// `~/.sanctum/keys/<name>.key`.
    pub fn load(name: &str, key_path: Option<&Path>) -> Result<Self> {
        let path = match key_path {
            Some(path) => path.to_path_buf(),
            None => default_key_path(name),
        };

        let raw = std::fs::read_to_string(&path).map_err(|e| ClientError::Key {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let seed = hex::decode(raw.trim()).map_err(|e| ClientError::Key {
            path: path.clone(),
            reason: format!("invalid hex: {e}"),
        })?;
        let seed: [u8; SEED_LEN] = seed.as_slice().try_into().map_err(|_| ClientError::Key {
            path: path.clone(),
            reason: format!("seed is {} bytes, expected {SEED_LEN}", seed.len()),
        })?;

        Ok(Self {
            name: name.to_string(),
            key: SigningKey::from_bytes(&seed),
        })
    }

    /// The agent name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Sign a server-issued challenge nonce.
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.key.sign(message)
    }

    /// The public half of the key.
    pub fn verifying_key(&self) -> VerifyingKey {
        self.key.verifying_key()
    }

    /// Hex-encoded public key, sent as the key reference during auth.
    pub fn verify_key_hex(&self) -> String {
        hex::encode(self.key.verifying_key().as_bytes())
    }
}

impl fmt::Debug for AgentIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentIdentity")
            .field("name", &self.name)
            .field("key", &format_args!("<redacted>"))
            .finish()
    }
}

/// Default key file location: `~/.sanctum/keys/<name>.key`.
fn default_key_path(name: &str) -> PathBuf {
    let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
    home.join(".sanctum").join("keys").join(format!("{name}.key"))
}

#[cfg(test)]
mod tests {
    use ed25519_dalek::Verifier;

    use super::*;

    const SEED: [u8; 32] = [7u8; 32];

    fn temp_key_file(name: &str, contents: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("sanctum-identity-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        std::fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn load_and_sign_verifies() {
        let path = temp_key_file("good.key", &hex::encode(SEED));
        let identity = AgentIdentity::load("agent-a", Some(&path)).unwrap();

        let signature = identity.sign(b"nonce-bytes");
        identity
            .verifying_key()
            .verify(b"nonce-bytes", &signature)
            .unwrap();

        assert_eq!(identity.name(), "agent-a");
        assert_eq!(identity.verify_key_hex().len(), 64);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn load_trims_trailing_newline() {
        let path = temp_key_file("newline.key", &format!("{}\n", hex::encode(SEED)));
        let identity = AgentIdentity::load("agent-a", Some(&path));
        assert!(identity.is_ok());
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn wrong_seed_length_rejected() {
        let path = temp_key_file("short.key", &hex::encode([7u8; 16]));
        let err = AgentIdentity::load("agent-a", Some(&path)).unwrap_err();
        assert!(matches!(err, ClientError::Key { .. }));
        assert!(err.to_string().contains("16 bytes"));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn non_hex_key_rejected() {
        let path = temp_key_file("garbage.key", "not-hex-at-all");
        let err = AgentIdentity::load("agent-a", Some(&path)).unwrap_err();
        assert!(matches!(err, ClientError::Key { .. }));
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn missing_key_file_rejected() {
        let err =
            AgentIdentity::load("agent-a", Some(Path::new("/nonexistent/agent.key"))).unwrap_err();
        assert!(matches!(err, ClientError::Key { .. }));
    }

    #[test]
    fn default_key_path_derived_from_name() {
        let path = default_key_path("agent-a");
        assert!(path.ends_with(".sanctum/keys/agent-a.key"));
    }

    #[test]
    fn debug_output_redacts_key() {
        let identity = AgentIdentity::new("agent-a", SigningKey::from_bytes(&SEED));
        let debug = format!("{identity:?}");
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains(&hex::encode(SEED)));
    }
}
