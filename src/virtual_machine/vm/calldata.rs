use crate::types::bytes::Bytes;
use crate::types::word::{self, WORD_BYTES, Word};

/// Immutable input buffer of one execution.
///
/// Reads past the end are zero-padded and never fail, including offsets too
/// large to address.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Calldata(Bytes);

impl Calldata {
    pub fn new(data: impl Into<Bytes>) -> Self {
        Self(data.into())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }

    /// Byte at `offset`, or 0 when out of range.
    pub fn read_byte(&self, offset: Word) -> u8 {
        word::to_usize(offset)
            .and_then(|i| self.0.get(i).copied())
            .unwrap_or(0)
    }

    /// 32 bytes at `offset` as a big-endian word, zero-padded on the right.
    pub fn read_word(&self, offset: Word) -> Word {
        let mut buf = [0u8; WORD_BYTES];
        buf.copy_from_slice(&self.read_range(offset, WORD_BYTES));
        Word::from_be_bytes(buf)
    }

    /// `len` bytes at `offset`, zero-padded on the right.
    pub fn read_range(&self, offset: Word, len: usize) -> Vec<u8> {
        let tail = self.tail(offset);
        let take = tail.len().min(len);
        let mut out = vec![0u8; len];
        out[..take].copy_from_slice(&tail[..take]);
        out
    }

    /// Bytes from `offset` to the end. Empty when `offset` is out of range.
    pub fn tail(&self, offset: Word) -> &[u8] {
        match word::to_usize(offset) {
            Some(start) => self.0.tail(start),
            None => &[],
        }
    }
}
