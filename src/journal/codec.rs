//! Journal file codec.
//!
//! A journal starts with the 8-byte [`MAGIC`] and is followed by one frame
//! per event: `[u32 big-endian payload length][MessagePack InputEvent]`.
//! The encoder writes the magic ahead of its first frame; the decoder
//! refuses input that does not start with it.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::event::InputEvent;

use super::JournalError;

/// File signature. The trailing digit is the format version.
pub const MAGIC: &[u8; 8] = b"SELPOPJ1";

/// Upper bound on one encoded event. Real frames are well under 100 bytes.
pub const MAX_FRAME_SIZE: usize = 64 * 1024;

const LEN_BYTES: usize = 4;

#[derive(Debug, Default)]
pub struct EventCodec {
    /// Whether the magic has been written (encoding) or checked (decoding).
    header_done: bool,
}

impl EventCodec {
    pub fn new() -> Self {
        Self::default()
    }

    fn check_magic(&mut self, src: &mut BytesMut) -> Result<bool, JournalError> {
        let seen = src.len().min(MAGIC.len());
        if src[..seen] != MAGIC[..seen] {
            return Err(JournalError::NotAJournal);
        }
        if seen < MAGIC.len() {
            return Ok(false);
        }
        let _ = src.split_to(MAGIC.len());
        self.header_done = true;
        Ok(true)
    }
}

/// Payload length announced by the frame header at the front of `src`.
fn peek_len(src: &[u8]) -> Option<usize> {
    let header: [u8; LEN_BYTES] = src.get(..LEN_BYTES)?.try_into().ok()?;
    Some(u32::from_be_bytes(header) as usize)
}

impl Decoder for EventCodec {
    type Item = InputEvent;
    type Error = JournalError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        if !self.header_done && !self.check_magic(src)? {
            return Ok(None);
        }

        let Some(len) = peek_len(src) else {
            return Ok(None);
        };
        if len > MAX_FRAME_SIZE {
            return Err(JournalError::PayloadTooLarge(len));
        }

        let frame_len = LEN_BYTES + len;
        if src.len() < frame_len {
            src.reserve(frame_len - src.len());
            return Ok(None);
        }

        let frame = src.split_to(frame_len);
        let event: InputEvent = rmp_serde::from_slice(&frame[LEN_BYTES..])?;
        Ok(Some(event))
    }
}

impl Encoder<InputEvent> for EventCodec {
    type Error = JournalError;

    fn encode(&mut self, item: InputEvent, dst: &mut BytesMut) -> Result<(), Self::Error> {
        let payload = rmp_serde::to_vec_named(&item)?;
        if payload.len() > MAX_FRAME_SIZE {
            return Err(JournalError::PayloadTooLarge(payload.len()));
        }

        if !self.header_done {
            dst.extend_from_slice(MAGIC);
            self.header_done = true;
        }
        dst.reserve(LEN_BYTES + payload.len());
        dst.put_u32(payload.len() as u32);
        dst.extend_from_slice(&payload);
        Ok(())
    }
}
