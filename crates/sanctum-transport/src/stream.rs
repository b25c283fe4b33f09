use std::io::{Read, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use tracing::debug;

use crate::error::{Result, TransportError};
use crate::target::ConnectTarget;

/// A connected stream to the vault daemon — implements Read + Write.
///
/// Wraps a Unix domain socket stream or a TCP stream depending on the
/// connection target.
pub struct VaultStream {
    inner: StreamInner,
}

enum StreamInner {
    #[cfg(unix)]
    Unix(std::os::unix::net::UnixStream),
    Tcp(TcpStream),
}

impl VaultStream {
    /// Maximum socket path length.
    /// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
    #[cfg(target_os = "linux")]
    const MAX_PATH_LEN: usize = 108;
    #[cfg(target_os = "macos")]
    const MAX_PATH_LEN: usize = 104;
    #[cfg(not(any(target_os = "linux", target_os = "macos")))]
    const MAX_PATH_LEN: usize = 104;

    /// Connect to the vault at the given target (blocking).
    pub fn connect(target: &ConnectTarget) -> Result<Self> {
        match target {
            ConnectTarget::Unix(path) => {
                let path_bytes = path.as_os_str().len();
                if path_bytes >= Self::MAX_PATH_LEN {
                    return Err(TransportError::PathTooLong {
                        path: path.clone(),
                        len: path_bytes,
                        max: Self::MAX_PATH_LEN,
                    });
                }

                #[cfg(not(unix))]
                {
                    return Err(TransportError::Connect {
                        target: target.clone(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::Unsupported,
                            "unix domain sockets are not available on this platform",
                        ),
                    });
                }

                #[cfg(unix)]
                {
                    let stream = std::os::unix::net::UnixStream::connect(path).map_err(|e| {
                        TransportError::Connect {
                            target: target.clone(),
                            source: e,
                        }
                    })?;
                    debug!(?path, "connected to unix domain socket");
                    Ok(Self {
                        inner: StreamInner::Unix(stream),
                    })
                }
            }
            ConnectTarget::Tcp { host, port } => {
                let stream = TcpStream::connect((host.as_str(), *port)).map_err(|e| {
                    TransportError::Connect {
                        target: target.clone(),
                        source: e,
                    }
                })?;
                stream.set_nodelay(true)?;
                debug!(%host, port, "connected over tcp");
                Ok(Self {
                    inner: StreamInner::Tcp(stream),
                })
            }
        }
    }

    /// Set read timeout on the underlying stream.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
            StreamInner::Tcp(stream) => stream.set_read_timeout(timeout).map_err(Into::into),
        }
    }

    /// Set write timeout on the underlying stream.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) -> Result<()> {
        match &self.inner {
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
            StreamInner::Tcp(stream) => stream.set_write_timeout(timeout).map_err(Into::into),
        }
    }

    /// Try to clone this stream (creates a new file descriptor).
    pub fn try_clone(&self) -> Result<Self> {
        let inner = match &self.inner {
            #[cfg(unix)]
            StreamInner::Unix(stream) => StreamInner::Unix(stream.try_clone()?),
            StreamInner::Tcp(stream) => StreamInner::Tcp(stream.try_clone()?),
        };
        Ok(Self { inner })
    }

    /// Shut down both halves of the connection.
    ///
    /// Safe to call more than once; a stream that is already shut down
    /// reports success.
    pub fn shutdown(&self) -> Result<()> {
        let result = match &self.inner {
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.shutdown(Shutdown::Both),
            StreamInner::Tcp(stream) => stream.shutdown(Shutdown::Both),
        };
        match result {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotConnected => Ok(()),
            Err(err) => Err(TransportError::Io(err)),
        }
    }

    #[cfg(unix)]
    pub(crate) fn from_unix(stream: std::os::unix::net::UnixStream) -> Self {
        Self {
            inner: StreamInner::Unix(stream),
        }
    }
}

#[cfg(unix)]
impl From<std::os::unix::net::UnixStream> for VaultStream {
    fn from(stream: std::os::unix::net::UnixStream) -> Self {
        Self::from_unix(stream)
    }
}

impl Read for VaultStream {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.read(buf),
            StreamInner::Tcp(stream) => stream.read(buf),
        }
    }
}

impl Write for VaultStream {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.inner {
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.write(buf),
            StreamInner::Tcp(stream) => stream.write(buf),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.inner {
            #[cfg(unix)]
            StreamInner::Unix(stream) => stream.flush(),
            StreamInner::Tcp(stream) => stream.flush(),
        }
    }
}

impl std::fmt::Debug for VaultStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let kind = match &self.inner {
            #[cfg(unix)]
            StreamInner::Unix(_) => "unix",
            StreamInner::Tcp(_) => "tcp",
        };
        f.debug_struct("VaultStream").field("type", &kind).finish()
    }
}
