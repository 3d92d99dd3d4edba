//! Fixed 8-byte frame header: `[magic: u16][version: u8][type: u8][len: u32]`,
//! all big-endian. Mirrors the host↔guest framing in `bux_proto::codec`, but
//! with an explicit magic/version/type header instead of a bare length
//! prefix, since the debug protocol needs to reject foreign connections and
//! detect client/server version skew before it ever touches the payload.

/// Protocol magic number identifying an xdbg frame.
pub const MAGIC: u16 = 0xDB09;

/// Current wire protocol version.
pub const VERSION: u8 = 1;

/// Maximum payload size accepted on either side of the connection (1 MiB).
pub const MAX_PAYLOAD_SIZE: u32 = 1024 * 1024;

/// Number of bytes occupied by [`FrameHeader`] on the wire.
pub const HEADER_LEN: usize = 8;

/// Distinguishes a request frame from a response frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FrameType {
    /// Client-to-server request.
    Request = 0x01,
    /// Server-to-client response.
    Response = 0x02,
}

impl FrameType {
    fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0x01 => Some(Self::Request),
            0x02 => Some(Self::Response),
            _ => None,
        }
    }
}

/// Parsed frame header.
#[derive(Debug, Clone, Copy)]
pub struct FrameHeader {
    /// Message type tag.
    pub frame_type: FrameType,
    /// Length in bytes of the payload that follows.
    pub payload_len: u32,
}

impl FrameHeader {
    /// Builds the 8-byte on-wire representation for a header with the
    /// current magic/version.
    pub fn encode(frame_type: FrameType, payload_len: u32) -> [u8; HEADER_LEN] {
        let mut buf = [0u8; HEADER_LEN];
        buf[0..2].copy_from_slice(&MAGIC.to_be_bytes());
        buf[2] = VERSION;
        buf[3] = frame_type as u8;
        buf[4..8].copy_from_slice(&payload_len.to_be_bytes());
        buf
    }

    /// Parses an 8-byte buffer into a header, validating magic, version,
    /// and payload-size bound. Does not validate `frame_type` against a
    /// caller-expected value — callers that require a specific type check
    /// `frame_type` themselves so they can report `ErrInvalidMessage`.
    pub fn decode(buf: &[u8; HEADER_LEN]) -> Result<Self, crate::ProtoError> {
        let magic = u16::from_be_bytes([buf[0], buf[1]]);
        if magic != MAGIC {
            return Err(crate::ProtoError::InvalidMessage("bad magic".into()));
        }
        let version = buf[2];
        if version != VERSION {
            return Err(crate::ProtoError::InvalidMessage(format!(
                "unsupported version {version}"
            )));
        }
        let frame_type = FrameType::from_u8(buf[3])
            .ok_or_else(|| crate::ProtoError::InvalidMessage("bad frame type".into()))?;
        let payload_len = u32::from_be_bytes([buf[4], buf[5], buf[6], buf[7]]);
        if payload_len > MAX_PAYLOAD_SIZE {
            return Err(crate::ProtoError::MessageTooLarge);
        }
        Ok(Self {
            frame_type,
            payload_len,
        })
    }
}
