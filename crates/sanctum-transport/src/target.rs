use std::fmt;
use std::path::{Path, PathBuf};

/// Where the vault daemon is listening.
///
/// Exactly one endpoint kind per target; the variants are mutually exclusive
/// by construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectTarget {
    /// Filesystem Unix domain socket path.
    Unix(PathBuf),
    /// TCP host and port.
    Tcp { host: String, port: u16 },
}

impl ConnectTarget {
    /// Target a Unix domain socket path.
    pub fn unix(path: impl AsRef<Path>) -> Self {
        Self::Unix(path.as_ref().to_path_buf())
    }

    /// Target a TCP host/port pair.
    pub fn tcp(host: impl Into<String>, port: u16) -> Self {
        Self::Tcp {
            host: host.into(),
            port,
        }
    }

    /// The default vault socket: `~/.sanctum/vault.sock`.
    pub fn default_socket() -> Self {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::Unix(home.join(".sanctum").join("vault.sock"))
    }
}

impl fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unix(path) => write!(f, "{}", path.display()),
            Self::Tcp { host, port } => write!(f, "{host}:{port}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_unix_target() {
        let target = ConnectTarget::unix("/tmp/vault.sock");
        assert_eq!(target.to_string(), "/tmp/vault.sock");
    }

    #[test]
    fn display_tcp_target() {
        let target = ConnectTarget::tcp("vault.internal", 7410);
        assert_eq!(target.to_string(), "vault.internal:7410");
    }

    #[test]
    fn default_socket_under_home() {
        let ConnectTarget::Unix(path) = ConnectTarget::default_socket() else {
            panic!("default target should be a unix socket");
        };
        assert!(path.ends_with(".sanctum/vault.sock"));
    }

    #[test]
    fn targets_compare_by_value() {
        assert_eq!(
            ConnectTarget::tcp("localhost", 1),
            ConnectTarget::Tcp {
                host: "localhost".to_string(),
                port: 1
            }
        );
        assert_ne!(
            ConnectTarget::unix("/a.sock"),
            ConnectTarget::unix("/b.sock")
        );
    }
}
