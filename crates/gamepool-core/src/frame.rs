//! Length-prefixed framing.
//!
//! Every frame starts with a little-endian `u32` holding the total frame
//! length, header included. [`FrameBuffer`] accumulates bytes read from a
//! socket and hands out complete frames; it never blocks and never touches
//! I/O itself.

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// Size of the length header in bytes.
pub const HEADER_LEN: usize = 4;

/// Default upper bound on a declared frame length (16 MiB).
pub const DEFAULT_MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

/// Framing errors. Both are fatal for the connection.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FrameError {
    /// The declared length is smaller than the header itself.
    #[error("declared frame length {0} is shorter than the header")]
    TooShort(usize),

    /// The declared or requested length exceeds the limit.
    #[error("frame length {len} exceeds the limit of {max} bytes")]
    TooLarge {
        /// Declared length.
        len: usize,
        /// Configured limit.
        max: usize,
    },
}

/// Accumulates raw bytes and splits them into frames.
#[derive(Debug)]
pub struct FrameBuffer {
    buf: BytesMut,
    max_frame: usize,
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameBuffer {
    /// Create an empty buffer with the default frame limit.
    #[must_use]
    pub fn new() -> Self {
        Self::with_max_frame(DEFAULT_MAX_FRAME_BYTES)
    }

    /// Create an empty buffer that rejects frames longer than `max_frame`.
    #[must_use]
    pub fn with_max_frame(max_frame: usize) -> Self {
        Self {
            buf: BytesMut::with_capacity(4096),
            max_frame: max_frame.max(HEADER_LEN),
        }
    }

    /// Append bytes read from the peer.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Number of bytes buffered and not yet taken.
    #[must_use]
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    /// Whether nothing is buffered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Declared length of the next frame once it is fully buffered.
    ///
    /// Returns `Ok(None)` while the header or body is still incomplete.
    ///
    /// # Errors
    ///
    /// Returns a [`FrameError`] as soon as the header declares an impossible
    /// length, even before the body arrives.
    pub fn next_frame_length(&self) -> Result<Option<usize>, FrameError> {
        if self.buf.len() < HEADER_LEN {
            return Ok(None);
        }
        let mut header = &self.buf[..HEADER_LEN];
        let declared = header.get_u32_le() as usize;

        if declared < HEADER_LEN {
            return Err(FrameError::TooShort(declared));
        }
        if declared > self.max_frame {
            return Err(FrameError::TooLarge {
                len: declared,
                max: self.max_frame,
            });
        }
        if self.buf.len() < declared {
            return Ok(None);
        }
        Ok(Some(declared))
    }

    /// Remove exactly `len` bytes (header included) from the front.
    ///
    /// Returns `None` if fewer than `len` bytes are buffered.
    pub fn take_frame(&mut self, len: usize) -> Option<Bytes> {
        if self.buf.len() < len {
            return None;
        }
        Some(self.buf.split_to(len).freeze())
    }

    /// Take the next complete frame and return its payload without the header.
    ///
    /// # Errors
    ///
    /// Propagates [`FrameError`] from [`Self::next_frame_length`].
    pub fn next_frame(&mut self) -> Result<Option<Bytes>, FrameError> {
        let Some(len) = self.next_frame_length()? else {
            return Ok(None);
        };
        Ok(self.take_frame(len).map(|frame| frame.slice(HEADER_LEN..)))
    }
}

/// Prefix `payload` with its total length.
///
/// # Errors
///
/// Returns [`FrameError::TooLarge`] if the frame would not fit the `u32`
/// length header.
pub fn encode_frame(payload: &[u8]) -> Result<Bytes, FrameError> {
    let total = payload.len() + HEADER_LEN;
    let declared = u32::try_from(total).map_err(|_| FrameError::TooLarge {
        len: total,
        max: u32::MAX as usize,
    })?;

    let mut out = BytesMut::with_capacity(total);
    out.put_u32_le(declared);
    out.put_slice(payload);
    Ok(out.freeze())
}
