//! IPC framing and request/response types between `cali` and its daemon.
//!
//! # Wire format
//!
//! Messages are length-prefixed JSON:
//! - 4 bytes: payload length (u32, big-endian)
//! - N bytes: JSON payload
//!
//! Every payload is an [`Envelope`] carrying the protocol version, a request
//! id used for correlation, and the [`Request`] or [`Response`] itself.
//!
//! Most requests get exactly one response. `list_events` is answered with a
//! stream: any number of [`Response::ListItem`] frames terminated by a single
//! [`Response::ListEnd`] (or an [`Response::Error`]), all sharing the request id.
//!
//! ```rust
//! use cali_protocol::{Envelope, Request, encode_message, decode_message};
//!
//! let request = Envelope::request("req-123", Request::Ping);
//! let bytes = encode_message(&request).unwrap();
//! let decoded: Envelope<Request> = decode_message(&bytes).unwrap();
//! assert_eq!(decoded, request);
//! ```

mod error;
mod framing;
mod types;

pub use error::{ProtocolError, ProtocolResult};
pub use framing::{decode_message, encode_message, frame_len, read_frame, write_frame};
pub use types::{AuthMode, Envelope, ErrorCode, ErrorResponse, Request, Response, StatusInfo};

/// Protocol version constant.
pub const PROTOCOL_VERSION: &str = "1";

/// Maximum message size (1 MB).
pub const MAX_MESSAGE_SIZE: u32 = 1024 * 1024;
