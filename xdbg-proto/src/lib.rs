//! Wire protocol for the xdbg runtime debug service.
//!
//! Every request/response pair is framed with an 8-byte header (magic,
//! version, type tag, big-endian length) followed by a `postcard`-encoded
//! payload. See [`frame`] for the header layout and [`codec`] for the
//! encode/decode entry points.

mod codec;
mod error;
mod frame;
mod message;

pub use codec::{decode_request, decode_response, encode_request, encode_response, truncate_utf8};
pub use error::ProtoError;
pub use frame::{FrameHeader, FrameType, MAGIC, MAX_PAYLOAD_SIZE, VERSION};
pub use message::{Request, Response};
