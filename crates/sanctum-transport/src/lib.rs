//! Byte-stream transport for the Sanctum vault client.
//!
//! Resolves where the vault daemon is listening (Unix domain socket path or
//! TCP host/port) and produces a connected [`VaultStream`] implementing
//! `Read` + `Write`. Framing and protocol live in the layers above.

pub mod error;
pub mod stream;
pub mod target;

pub use error::{Result, TransportError};
pub use stream::VaultStream;
pub use target::ConnectTarget;
