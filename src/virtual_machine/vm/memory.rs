use crate::types::word::{self, WORD_BYTES, Word};
use crate::virtual_machine::errors::VMError;
use std::fmt;

/// Default cap on materialized memory (16 MiB).
pub const DEFAULT_MAX_MEMORY: usize = 16 * 1024 * 1024;

/// Byte-addressable, zero-initialized execution memory.
///
/// The buffer is materialized lazily in whole 32-byte words. Any read or write
/// that touches bytes past the high-water mark first grows the buffer to
/// `ceil((offset + length) / 32)` words. It never shrinks. Zero-length
/// accesses touch nothing and never grow it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Memory {
    bytes: Vec<u8>,
    max_bytes: usize,
}

impl Memory {
    /// Creates empty memory with the default size cap.
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_MEMORY)
    }

    /// Creates empty memory that refuses to grow past `max_bytes`.
    pub fn with_limit(max_bytes: usize) -> Self {
        Self {
            bytes: Vec::new(),
            max_bytes,
        }
    }

    /// Grows the buffer so `[offset, offset + length)` is materialized.
    fn expand(&mut self, offset: usize, length: usize) -> Result<(), VMError> {
        if length == 0 {
            return Ok(());
        }
        let end = offset
            .checked_add(length)
            .filter(|end| *end <= self.max_bytes)
            .ok_or(VMError::InvalidMemoryAccess {
                offset: Word::from(offset),
                length: Word::from(length),
            })?;
        let new_len = end.div_ceil(WORD_BYTES) * WORD_BYTES;
        if new_len > self.bytes.len() {
            self.bytes.resize(new_len, 0);
        }
        Ok(())
    }

    /// Writes one byte.
    pub fn store(&mut self, offset: usize, value: u8) -> Result<(), VMError> {
        self.expand(offset, 1)?;
        self.bytes[offset] = value;
        Ok(())
    }

    /// Writes one byte given as a word.
    ///
    /// Returns [`VMError::InvalidMemoryValue`] when `value` is above 255.
    pub fn store_value(&mut self, offset: usize, value: Word) -> Result<(), VMError> {
        let byte = u8::try_from(word::to_usize(value).unwrap_or(usize::MAX))
            .map_err(|_| VMError::InvalidMemoryValue { value })?;
        self.store(offset, byte)
    }

    /// Writes the 32-byte big-endian encoding of `value` at `offset`.
    pub fn store_word(&mut self, offset: usize, value: Word) -> Result<(), VMError> {
        self.store_range(offset, &word::to_be_bytes(value))
    }

    /// Copies `data` into memory starting at `offset`.
    pub fn store_range(&mut self, offset: usize, data: &[u8]) -> Result<(), VMError> {
        self.expand(offset, data.len())?;
        if !data.is_empty() {
            self.bytes[offset..offset + data.len()].copy_from_slice(data);
        }
        Ok(())
    }

    /// Writes `length` bytes at `offset`: the front of `source`, then zeros.
    ///
    /// The size cap is checked before anything is written, so `length` may be
    /// arbitrarily large without allocating.
    pub fn copy_padded(
        &mut self,
        offset: usize,
        length: usize,
        source: &[u8],
    ) -> Result<(), VMError> {
        if length == 0 {
            return Ok(());
        }
        self.expand(offset, length)?;
        let target = &mut self.bytes[offset..offset + length];
        let take = source.len().min(length);
        target[..take].copy_from_slice(&source[..take]);
        target[take..].fill(0);
        Ok(())
    }

    /// Reads one byte.
    pub fn load(&mut self, offset: usize) -> Result<u8, VMError> {
        self.expand(offset, 1)?;
        Ok(self.bytes[offset])
    }

    /// Reads 32 bytes at `offset` as a big-endian word.
    pub fn load_word(&mut self, offset: usize) -> Result<Word, VMError> {
        self.expand(offset, WORD_BYTES)?;
        let mut buf = [0u8; WORD_BYTES];
        buf.copy_from_slice(&self.bytes[offset..offset + WORD_BYTES]);
        Ok(Word::from_be_bytes(buf))
    }

    /// Copies `length` bytes starting at `offset`.
    pub fn load_range(&mut self, offset: usize, length: usize) -> Result<Vec<u8>, VMError> {
        self.expand(offset, length)?;
        if length == 0 {
            return Ok(Vec::new());
        }
        Ok(self.bytes[offset..offset + length].to_vec())
    }

    /// Number of 32-byte words materialized so far.
    pub fn active_words(&self) -> usize {
        self.bytes.len() / WORD_BYTES
    }

    /// Materialized size in bytes, always a multiple of 32.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(&self.bytes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_empty() {
        let memory = Memory::new();
        assert_eq!(memory.active_words(), 0);
        assert!(memory.is_empty());
    }

    #[test]
    fn store_at_100_expands_to_four_words() {
        let mut memory = Memory::new();
        memory.store(100, 42).unwrap();
        assert_eq!(memory.active_words(), 4);
        assert_eq!(memory.load(100).unwrap(), 42);
        for offset in 0..100 {
            assert_eq!(memory.load(offset).unwrap(), 0);
        }
        assert_eq!(memory.active_words(), 4);
    }

    #[test]
    fn load_range_expands_by_touched_words() {
        let mut memory = Memory::new();
        memory.load_range(0, 32).unwrap();
        assert_eq!(memory.active_words(), 1);

        let mut memory = Memory::new();
        memory.load_range(1, 32).unwrap();
        assert_eq!(memory.active_words(), 2);

        let mut memory = Memory::new();
        memory.load_range(68, 32).unwrap();
        assert_eq!(memory.active_words(), 4);
    }

    #[test]
    fn never_shrinks() {
        let mut memory = Memory::new();
        memory.store(200, 1).unwrap();
        let words = memory.active_words();
        memory.store(0, 1).unwrap();
        memory.load_word(0).unwrap();
        assert_eq!(memory.active_words(), words);
    }

    #[test]
    fn zero_length_touches_nothing() {
        let mut memory = Memory::new();
        assert!(memory.load_range(1000, 0).unwrap().is_empty());
        memory.store_range(1000, &[]).unwrap();
        assert_eq!(memory.active_words(), 0);
    }

    #[test]
    fn word_round_trip_is_big_endian() {
        let mut memory = Memory::new();
        memory.store_word(0, Word::from(0x4243u64)).unwrap();
        assert_eq!(memory.load(30).unwrap(), 0x42);
        assert_eq!(memory.load(31).unwrap(), 0x43);
        assert_eq!(memory.load_word(0).unwrap(), Word::from(0x4243u64));
    }

    #[test]
    fn store_value_rejects_wide_values() {
        let mut memory = Memory::new();
        memory.store_value(0, Word::from(255u64)).unwrap();
        assert!(matches!(
            memory.store_value(0, Word::from(256u64)),
            Err(VMError::InvalidMemoryValue { .. })
        ));
    }

    #[test]
    fn limit_is_enforced() {
        let mut memory = Memory::with_limit(64);
        memory.store(63, 1).unwrap();
        assert!(matches!(
            memory.store(64, 1),
            Err(VMError::InvalidMemoryAccess { .. })
        ));
        assert!(memory.load_range(usize::MAX, 2).is_err());
    }

    #[test]
    fn copy_padded_zero_fills_and_checks_limit() {
        let mut memory = Memory::with_limit(64);
        memory.store_range(0, &[0xff; 8]).unwrap();
        memory.copy_padded(2, 4, &[1, 2]).unwrap();
        assert_eq!(&memory.as_slice()[..8], &[0xff, 0xff, 1, 2, 0, 0, 0xff, 0xff]);
        assert!(matches!(
            memory.copy_padded(0, usize::MAX, &[1]),
            Err(VMError::InvalidMemoryAccess { .. })
        ));
        assert!(memory.copy_padded(60, 8, &[]).is_err());
        assert_eq!(memory.active_words(), 1);
    }

    #[test]
    fn display_is_hex() {
        let mut memory = Memory::new();
        memory.store(0, 0xab).unwrap();
        assert!(memory.to_string().starts_with("0xab00"));
        assert_eq!(memory.to_string().len(), 2 + 64);
    }
}
