//! Wire framing and IPC message types for eppd.
//!
//! Two framings live here:
//!
//! - [`FrameCodec`] / [`FrameBuffer`]: the EPP transport frame, a big-endian
//!   length header followed by a UTF-8 XML document (RFC 5734). Registries
//!   disagree on whether the length counts the header, so the codec is
//!   configured per registry.
//! - [`read_message`] / [`write_message`]: length-prefixed JSON used between
//!   the supervisor, its workers and front-end clients.
//!
//! # Example
//!
//! ```rust
//! use eppd_protocol::{FrameBuffer, FrameCodec};
//!
//! let codec = FrameCodec::default();
//! let frame = codec.encode(b"<epp/>").unwrap();
//!
//! let mut buffer = FrameBuffer::new();
//! buffer.extend(&frame[..3]);
//! assert!(buffer.try_take(&codec).unwrap().is_none());
//! buffer.extend(&frame[3..]);
//! assert_eq!(buffer.try_take(&codec).unwrap().unwrap(), b"<epp/>");
//! ```

mod error;
mod framing;
mod ipc;
mod types;

pub use error::{ProtocolError, ProtocolResult};
pub use framing::{FrameBuffer, FrameCodec, FrameStatus};
pub use ipc::{decode_message, encode_message, read_message, write_message};
pub use types::{Envelope, ErrorPayload, Request, Response, WorkerReply, WorkerRequest};

/// Front-end protocol version.
pub const PROTOCOL_VERSION: &str = "1";

/// Maximum size of a front-end request or worker command (1 MiB).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Maximum size of a reply carrying a decoded registry response (16 MiB).
pub const MAX_REPLY_SIZE: usize = 16 * 1024 * 1024;

/// Maximum declared length of an EPP frame (16 MiB).
pub const MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;
