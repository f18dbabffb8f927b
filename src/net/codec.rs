//! Length-prefixed JSON framing.
//!
//! Each frame is the payload's byte length in ASCII decimal, a `#`
//! delimiter, then the UTF-8 JSON payload:
//!
//! ```text
//! 47#{"id":"…","pattern":"get_data","data":{"key":"x"}}
//! ```

use bytes::{BufMut, BytesMut};
use thiserror::Error;
use tokio_util::codec::{Decoder, Encoder};

use crate::rpc::packet::Packet;

const DELIMITER: u8 = b'#';

/// Longest length prefix accepted before the delimiter must appear.
const MAX_PREFIX_DIGITS: usize = 20;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid JSON payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("malformed length prefix: {0:?}")]
    InvalidLength(String),

    #[error("frame of {size} bytes exceeds limit of {limit} bytes")]
    FrameTooLarge { size: usize, limit: usize },
}

/// Codec turning a byte stream into [`Packet`]s and back.
#[derive(Debug, Clone)]
pub struct PacketCodec {
    max_frame_bytes: usize,
    /// Payload length of the frame currently being read, once its prefix is consumed.
    pending_len: Option<usize>,
}

impl PacketCodec {
    pub fn new(max_frame_bytes: usize) -> Self {
        Self {
            max_frame_bytes,
            pending_len: None,
        }
    }

    fn read_prefix(&self, src: &mut BytesMut) -> Result<Option<usize>, CodecError> {
        let Some(pos) = src.iter().position(|b| *b == DELIMITER) else {
            if src.len() > MAX_PREFIX_DIGITS {
                let shown = String::from_utf8_lossy(&src[..MAX_PREFIX_DIGITS]).into_owned();
                return Err(CodecError::InvalidLength(shown));
            }
            return Ok(None);
        };

        let prefix = src.split_to(pos + 1);
        let digits = &prefix[..pos];
        let text = std::str::from_utf8(digits)
            .map_err(|_| CodecError::InvalidLength(String::from_utf8_lossy(digits).into_owned()))?;
        if text.is_empty() || !text.bytes().all(|b| b.is_ascii_digit()) {
            return Err(CodecError::InvalidLength(text.to_string()));
        }
        let size: usize = text
            .parse()
            .map_err(|_| CodecError::InvalidLength(text.to_string()))?;
        if size > self.max_frame_bytes {
            return Err(CodecError::FrameTooLarge {
                size,
                limit: self.max_frame_bytes,
            });
        }
        Ok(Some(size))
    }
}

impl Decoder for PacketCodec {
    type Item = Packet;
    type Error = CodecError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Packet>, CodecError> {
        let size = match self.pending_len {
            Some(size) => size,
            None => match self.read_prefix(src)? {
                Some(size) => {
                    self.pending_len = Some(size);
                    size
                }
                None => return Ok(None),
            },
        };

        if src.len() < size {
            src.reserve(size - src.len());
            return Ok(None);
        }

        self.pending_len = None;
        let payload = src.split_to(size);
        let packet = serde_json::from_slice(&payload)?;
        Ok(Some(packet))
    }
}

impl Encoder<Packet> for PacketCodec {
    type Error = CodecError;

    fn encode(&mut self, packet: Packet, dst: &mut BytesMut) -> Result<(), CodecError> {
        let payload = serde_json::to_vec(&packet)?;
        if payload.len() > self.max_frame_bytes {
            return Err(CodecError::FrameTooLarge {
                size: payload.len(),
                limit: self.max_frame_bytes,
            });
        }
        let prefix = payload.len().to_string();
        dst.reserve(prefix.len() + 1 + payload.len());
        dst.put_slice(prefix.as_bytes());
        dst.put_u8(DELIMITER);
        dst.put_slice(&payload);
        Ok(())
    }
}
