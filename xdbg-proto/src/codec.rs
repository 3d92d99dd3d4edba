//! Async frame encode/decode over any `AsyncRead`/`AsyncWrite` stream.
//!
//! Structured the way `bux_proto::codec::send`/`recv` frame a postcard
//! payload with a length prefix, but split into explicit encode (pure,
//! sync) and decode (async, reads from the stream) halves, since the
//! server needs to encode a response once and hand the bytes to
//! `Session::write_data` rather than writing directly from the codec.

use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::ProtoError;
use crate::frame::{FrameHeader, FrameType, HEADER_LEN, MAX_PAYLOAD_SIZE};
use crate::message::{Request, Response};

/// Serializes `req` and prepends the frame header. Fails if the serialized
/// payload exceeds [`crate::MAX_PAYLOAD_SIZE`].
pub fn encode_request(req: &Request) -> Result<Vec<u8>, ProtoError> {
    encode(FrameType::Request, req)
}

/// Serializes `resp` and prepends the frame header.
pub fn encode_response(resp: &Response) -> Result<Vec<u8>, ProtoError> {
    encode(FrameType::Response, resp)
}

fn encode<T: serde::Serialize>(frame_type: FrameType, msg: &T) -> Result<Vec<u8>, ProtoError> {
    let payload = postcard::to_allocvec(msg)
        .map_err(|e| ProtoError::InvalidMessage(format!("encode failed: {e}")))?;
    let len = u32::try_from(payload.len()).map_err(|_| ProtoError::MessageTooLarge)?;
    if len > MAX_PAYLOAD_SIZE {
        return Err(ProtoError::MessageTooLarge);
    }
    let mut frame = Vec::with_capacity(HEADER_LEN + payload.len());
    frame.extend_from_slice(&FrameHeader::encode(frame_type, len));
    frame.extend_from_slice(&payload);
    Ok(frame)
}

/// Reads and decodes one request frame from `stream`.
pub async fn decode_request(
    stream: &mut (impl AsyncRead + Unpin),
) -> Result<Request, ProtoError> {
    decode(stream, FrameType::Request).await
}

/// Reads and decodes one response frame from `stream`.
pub async fn decode_response(
    stream: &mut (impl AsyncRead + Unpin),
) -> Result<Response, ProtoError> {
    decode(stream, FrameType::Response).await
}

async fn decode<T: for<'de> serde::Deserialize<'de>>(
    stream: &mut (impl AsyncRead + Unpin),
    expected: FrameType,
) -> Result<T, ProtoError> {
    let mut header_buf = [0u8; HEADER_LEN];
    read_exact_or_closed(stream, &mut header_buf).await?;
    let header = FrameHeader::decode(&header_buf)?;
    if header.frame_type != expected {
        return Err(ProtoError::InvalidMessage("unexpected frame type".into()));
    }

    let mut payload = vec![0u8; header.payload_len as usize];
    stream.read_exact(&mut payload).await?;
    postcard::from_bytes(&payload)
        .map_err(|e| ProtoError::InvalidMessage(format!("decode failed: {e}")))
}

/// Like `read_exact`, but treats EOF before any byte is read as
/// `ErrConnectionClosed` rather than a generic I/O error, matching §4.1:
/// "EOF before completion ⇒ ErrConnectionClosed".
async fn read_exact_or_closed(
    stream: &mut (impl AsyncRead + Unpin),
    buf: &mut [u8],
) -> Result<(), ProtoError> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = stream.read(&mut buf[filled..]).await?;
        if n == 0 {
            return if filled == 0 {
                Err(ProtoError::ConnectionClosed)
            } else {
                Err(ProtoError::Io(std::io::Error::from(
                    std::io::ErrorKind::UnexpectedEof,
                )))
            };
        }
        filled += n;
    }
    Ok(())
}

/// Truncates `s` to at most `max_bytes` bytes without splitting a
/// multi-byte UTF-8 character, walking backward from `max_bytes` until a
/// char boundary is found.
pub fn truncate_utf8(s: &str, max_bytes: usize) -> &str {
    if s.len() <= max_bytes {
        return s;
    }
    let mut boundary = max_bytes;
    while boundary > 0 && !s.is_char_boundary(boundary) {
        boundary -= 1;
    }
    &s[..boundary]
}
