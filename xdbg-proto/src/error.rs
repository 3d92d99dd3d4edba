//! Wire-level error taxonomy. Session- and server-level errors
//! (`ErrCommandNotFound`, `ErrTooManySessions`, ...) live in `xdbg::Error`
//! and wrap these where a protocol failure crosses that boundary.

/// Errors produced while encoding or decoding a frame.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ProtoError {
    /// The peer closed the connection before a full frame was read.
    #[error("connection closed")]
    ConnectionClosed,

    /// The frame header or payload failed validation (bad magic, bad
    /// version, wrong type tag, or payload that won't deserialize).
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The payload exceeds [`crate::MAX_PAYLOAD_SIZE`].
    #[error("message exceeds maximum payload size")]
    MessageTooLarge,

    /// Underlying I/O failure while reading or writing the stream.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ProtoError {
    /// `true` if this is the specific "unsupported version" variant,
    /// which the client surfaces with an explanatory hint (§4.1, §7).
    pub fn is_version_mismatch(&self) -> bool {
        matches!(self, Self::InvalidMessage(msg) if msg.starts_with("unsupported version"))
    }
}
