//! Newline-delimited text framing
//!
//! Wraps `LinesCodec` with one change: an unterminated fragment left in
//! the buffer when the peer closes is discarded instead of yielded.

use bytes::BytesMut;
use tokio_util::codec::{Decoder, Encoder, LinesCodec, LinesCodecError};

/// Line codec used on both halves of a relay connection
#[derive(Debug, Clone)]
pub struct RelayLineCodec {
    inner: LinesCodec,
}

impl RelayLineCodec {
    /// Lines longer than `max_length` bytes fail with
    /// `LinesCodecError::MaxLineLengthExceeded`.
    pub fn new(max_length: usize) -> Self {
        Self {
            inner: LinesCodec::new_with_max_length(max_length),
        }
    }
}

impl Decoder for RelayLineCodec {
    type Item = String;
    type Error = LinesCodecError;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<String>, LinesCodecError> {
        self.inner.decode(buf)
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<String>, LinesCodecError> {
        match self.inner.decode(buf)? {
            Some(line) => Ok(Some(line)),
            None => {
                buf.clear();
                Ok(None)
            }
        }
    }
}

impl<T: AsRef<str>> Encoder<T> for RelayLineCodec {
    type Error = LinesCodecError;

    fn encode(&mut self, line: T, buf: &mut BytesMut) -> Result<(), LinesCodecError> {
        self.inner.encode(line, buf)
    }
}
