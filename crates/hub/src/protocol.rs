// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire format encoding/decoding for the agent protocol.
//!
//! Wire format: 4-byte length prefix (big-endian) + 1-byte kind tag + JSON payload.
//! The length counts the tag byte and the payload.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use polychat_core::{Envelope, EnvelopeKind};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Maximum frame length (1 MiB), tag included
pub const MAX_FRAME_LEN: usize = 1024 * 1024;

/// Size of the length prefix
pub const LENGTH_PREFIX_LEN: usize = 4;

/// Protocol version (from Cargo.toml)
pub const PROTOCOL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Frame-level failures
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge { size: usize, max: usize },

    #[error("empty frame")]
    EmptyFrame,

    #[error("unknown message kind {tag}")]
    UnknownKind { tag: u8, consumed: usize },

    #[error("malformed {kind} payload: {source}")]
    Malformed {
        kind: EnvelopeKind,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CodecError {
    /// Whether the stream can no longer be trusted after this error.
    ///
    /// An unknown kind still arrives in a well-delimited frame, so the
    /// reader can skip it and carry on.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::UnknownKind { .. })
    }
}

/// Result of looking for one frame at the front of a buffer
#[derive(Debug, PartialEq, Eq)]
pub enum Decoded {
    Complete { envelope: Envelope, consumed: usize },
    /// More bytes are needed; retry once they arrive
    Incomplete,
}

/// Encode an envelope into a complete frame.
pub fn encode(envelope: &Envelope) -> Result<Bytes, CodecError> {
    let payload = envelope.payload_to_vec()?;
    let len = payload.len() + 1;

    if len > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_LEN,
        });
    }

    let mut frame = BytesMut::with_capacity(LENGTH_PREFIX_LEN + len);
    frame.put_u32(len as u32);
    frame.put_u8(envelope.kind().tag());
    frame.put_slice(&payload);
    Ok(frame.freeze())
}

/// Decode the first frame in `buf`, which may hold a partial frame.
pub fn decode(buf: &[u8]) -> Result<Decoded, CodecError> {
    let Some(prefix) = buf.get(..LENGTH_PREFIX_LEN) else {
        return Ok(Decoded::Incomplete);
    };
    let len = u32::from_be_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;

    if len == 0 {
        return Err(CodecError::EmptyFrame);
    }
    // Reject before buffering the body
    if len > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge {
            size: len,
            max: MAX_FRAME_LEN,
        });
    }

    let consumed = LENGTH_PREFIX_LEN + len;
    let Some(body) = buf.get(LENGTH_PREFIX_LEN..consumed) else {
        return Ok(Decoded::Incomplete);
    };

    let tag = body[0];
    let kind = EnvelopeKind::from_tag(tag).ok_or(CodecError::UnknownKind { tag, consumed })?;
    let envelope = Envelope::payload_from_slice(kind, &body[1..])
        .map_err(|source| CodecError::Malformed { kind, source })?;

    Ok(Decoded::Complete { envelope, consumed })
}

/// Errors reading frames from a stream
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("codec error: {0}")]
    Codec(#[from] CodecError),

    #[error("Connection closed")]
    ConnectionClosed,

    #[error("connection closed mid-frame ({buffered} bytes buffered)")]
    Truncated { buffered: usize },

    #[error("Timeout")]
    Timeout,
}

/// One frame pulled off the stream
#[derive(Debug, PartialEq, Eq)]
pub enum Frame {
    Envelope(Envelope),
    /// Well-formed frame with a kind this hub does not know
    Unknown { tag: u8 },
}

/// Buffers a byte stream and yields whole frames.
///
/// Streams deliver fragments, so bytes are accumulated until `decode`
/// finds a complete frame.
pub struct FrameReader<R> {
    inner: R,
    buf: BytesMut,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(8 * 1024),
        }
    }

    /// Read the next frame.
    ///
    /// Returns `ConnectionClosed` on EOF at a frame boundary.
    pub async fn next_frame(&mut self) -> Result<Frame, ProtocolError> {
        loop {
            match decode(&self.buf) {
                Ok(Decoded::Complete { envelope, consumed }) => {
                    self.buf.advance(consumed);
                    return Ok(Frame::Envelope(envelope));
                }
                Ok(Decoded::Incomplete) => {}
                Err(CodecError::UnknownKind { tag, consumed }) => {
                    self.buf.advance(consumed);
                    return Ok(Frame::Unknown { tag });
                }
                Err(e) => return Err(e.into()),
            }

            if self.inner.read_buf(&mut self.buf).await? == 0 {
                if self.buf.is_empty() {
                    return Err(ProtocolError::ConnectionClosed);
                }
                return Err(ProtocolError::Truncated {
                    buffered: self.buf.len(),
                });
            }
        }
    }

    /// Read the next frame, giving up after `timeout`.
    pub async fn next_frame_within(
        &mut self,
        timeout: std::time::Duration,
    ) -> Result<Frame, ProtocolError> {
        tokio::time::timeout(timeout, self.next_frame())
            .await
            .map_err(|_| ProtocolError::Timeout)?
    }
}

/// Write one pre-encoded frame and flush.
pub async fn write_frame<W: AsyncWrite + Unpin>(
    writer: &mut W,
    frame: &[u8],
) -> Result<(), std::io::Error> {
    writer.write_all(frame).await?;
    writer.flush().await
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
