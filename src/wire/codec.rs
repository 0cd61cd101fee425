//! Newline framing for the RPC byte stream.
//!
//! [`LineCodec`] follows the shape of [`tokio_util::codec::LinesCodec`] but
//! never fails on input: invalid UTF-8 is decoded lossily so one corrupted
//! line cannot end the stream, and there is no length limit that would make
//! it discard data. Use it with [`tokio_util::codec::FramedRead`] on the read
//! half of a connection, or through [`LineBuffer`] when bytes arrive by hand.

use bytes::{BufMut, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::{AppError, Result};

/// Line codec for the RPC stream. Each `\n`-terminated line is one message.
///
/// # Decoder
///
/// Yields each complete line without its terminator. A trailing fragment
/// with no newline stays buffered until more bytes arrive, or is yielded as
/// the final line at EOF.
///
/// # Encoder
///
/// Writes `item\n`. An item that itself contains `\n` would split into two
/// messages on the peer, so it is refused with [`AppError::Fatal`].
#[derive(Debug, Default)]
pub struct LineCodec {
    /// Offset into the buffer already scanned for a newline.
    next_index: usize,
}

impl LineCodec {
    /// Create a new codec.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl Decoder for LineCodec {
    type Item = String;
    type Error = AppError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        let scan_from = self.next_index.min(src.len());
        match src[scan_from..].iter().position(|b| *b == b'\n') {
            Some(offset) => {
                let newline_index = scan_from + offset;
                self.next_index = 0;
                let mut line = src.split_to(newline_index + 1);
                line.truncate(newline_index);
                Ok(Some(String::from_utf8_lossy(&line).into_owned()))
            }
            None => {
                self.next_index = src.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>> {
        if let Some(line) = self.decode(src)? {
            return Ok(Some(line));
        }
        if src.is_empty() {
            return Ok(None);
        }
        self.next_index = 0;
        let rest = src.split();
        Ok(Some(String::from_utf8_lossy(&rest).into_owned()))
    }
}

impl Encoder<String> for LineCodec {
    type Error = AppError;

    fn encode(&mut self, item: String, dst: &mut BytesMut) -> Result<()> {
        if item.contains('\n') {
            return Err(AppError::Fatal("outbound line contains a newline".into()));
        }
        dst.reserve(item.len() + 1);
        dst.put_slice(item.as_bytes());
        dst.put_u8(b'\n');
        Ok(())
    }
}

/// Push-style wrapper around [`LineCodec`] for callers that receive raw
/// chunks instead of driving a framed stream.
///
/// Between calls to [`feed`](Self::feed) the buffer holds at most one
/// incomplete, newline-free fragment.
#[derive(Debug, Default)]
pub struct LineBuffer {
    codec: LineCodec,
    buf: BytesMut,
}

impl LineBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `bytes` and return every line they complete, in order.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buf.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Ok(Some(line)) = self.codec.decode(&mut self.buf) {
            lines.push(line);
        }
        lines
    }

    /// Bytes received after the last newline.
    #[must_use]
    pub fn remainder(&self) -> &[u8] {
        &self.buf
    }
}
