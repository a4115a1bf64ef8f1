//! Length-prefixed framing over the agent socket.
//!
//! Wraps [`tokio_util::codec::LengthDelimitedCodec`], whose stock
//! configuration is the agent's framing: a 4-byte big-endian length
//! followed by the payload. The payload is UTF-8 JSON — requests encode
//! from [`ApiRequest`], responses decode into [`AgentResponse`].

use bytes::{Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder, LengthDelimitedCodec};

use crate::errors::{ApmError, Result};
use crate::protocol::message::{AgentResponse, ApiRequest};

/// Maximum frame accepted from the agent: 8 MiB.
///
/// Frames past this limit fail decoding rather than allocating
/// unboundedly for a corrupt length prefix.
pub const MAX_FRAME_BYTES: usize = 8 * 1024 * 1024;

/// Framed JSON codec for the agent connection.
///
/// Use as the codec parameter of [`tokio_util::codec::Framed`]: the
/// `Encoder` side writes framed [`ApiRequest`]s, the `Decoder` side yields
/// framed [`AgentResponse`]s.
#[derive(Debug)]
pub struct MessageCodec(LengthDelimitedCodec);

impl MessageCodec {
    /// Create a codec with the default [`MAX_FRAME_BYTES`] limit.
    #[must_use]
    pub fn new() -> Self {
        let mut inner = LengthDelimitedCodec::new();
        inner.set_max_frame_length(MAX_FRAME_BYTES);
        Self(inner)
    }
}

impl Default for MessageCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder<ApiRequest> for MessageCodec {
    type Error = ApmError;

    fn encode(&mut self, item: ApiRequest, dst: &mut BytesMut) -> Result<()> {
        let body = serde_json::to_vec(&item)?;
        self.0
            .encode(Bytes::from(body), dst)
            .map_err(|e| ApmError::Codec(format!("framing failed: {e}")))
    }
}

impl Decoder for MessageCodec {
    type Item = AgentResponse;
    type Error = ApmError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<AgentResponse>> {
        match self.0.decode(src) {
            Ok(Some(frame)) => AgentResponse::from_slice(&frame).map(Some),
            Ok(None) => Ok(None),
            Err(e) => Err(ApmError::Codec(format!("unframing failed: {e}"))),
        }
    }
}

// ── Standalone helpers ────────────────────────────────────────────────────────

/// Encode one request into a complete frame (length prefix + JSON body).
///
/// # Errors
///
/// Returns [`ApmError::Codec`] on serialization failure.
pub fn encode(msg: &ApiRequest) -> Result<Vec<u8>> {
    let body = serde_json::to_vec(msg)?;
    let len = u32::try_from(body.len())
        .map_err(|_| ApmError::Codec("message exceeds u32 frame length".into()))?;
    let mut frame = Vec::with_capacity(4 + body.len());
    frame.extend_from_slice(&len.to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Decode one complete response frame.
///
/// # Errors
///
/// Returns [`ApmError::Codec`] when the buffer is shorter than its length
/// prefix claims or the payload is malformed.
pub fn decode(frame: &[u8]) -> Result<AgentResponse> {
    AgentResponse::from_slice(unframe(frame)?)
}

/// Decode one complete request frame (the agent-facing direction; used by
/// tests standing in for the agent).
///
/// # Errors
///
/// Returns [`ApmError::Codec`] on framing or JSON shape mismatch.
pub fn decode_request(frame: &[u8]) -> Result<ApiRequest> {
    serde_json::from_slice(unframe(frame)?).map_err(Into::into)
}

fn unframe(frame: &[u8]) -> Result<&[u8]> {
    if frame.len() < 4 {
        return Err(ApmError::Codec("frame shorter than length prefix".into()));
    }
    let declared = u32::from_be_bytes([frame[0], frame[1], frame[2], frame[3]]) as usize;
    let body = &frame[4..];
    if body.len() != declared {
        return Err(ApmError::Codec(format!(
            "frame length mismatch: prefix says {declared}, got {}",
            body.len()
        )));
    }
    Ok(body)
}
