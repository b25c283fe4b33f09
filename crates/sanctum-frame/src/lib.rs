//! Length-prefixed message framing for the Sanctum vault protocol.
//!
//! Every message on the wire is a 4-byte big-endian unsigned length prefix
//! followed by exactly that many payload bytes. No partial reads, no buffer
//! management in user code.

pub mod codec;
pub mod error;
pub mod reader;
pub mod writer;

pub use codec::{decode_frame, encode_frame, FrameConfig, DEFAULT_MAX_PAYLOAD, LEN_PREFIX_SIZE};
pub use error::{FrameError, Result};
pub use reader::FrameReader;
pub use writer::FrameWriter;
