use crate::types::word::{self, Word};
use crate::virtual_machine::errors::VMError;
use std::collections::BTreeMap;
use std::fmt;

/// Sparse word-to-word storage of one execution.
///
/// Absent keys read as zero. Writing zero removes the slot so only non-zero
/// slots are materialized. Iteration is ordered by key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Storage {
    slots: BTreeMap<Word, Word>,
}

impl Storage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Value at `slot`, zero when unset.
    pub fn get(&self, slot: Word) -> Word {
        self.slots.get(&slot).copied().unwrap_or(Word::ZERO)
    }

    /// Upserts `value` at `slot`.
    pub fn put(&mut self, slot: Word, value: Word) {
        if value.is_zero() {
            self.slots.remove(&slot);
        } else {
            self.slots.insert(slot, value);
        }
    }

    /// Upserts from big-endian byte strings of up to 32 bytes each.
    ///
    /// Used to seed storage from external data before a run.
    pub fn put_be_bytes(&mut self, slot: &[u8], value: &[u8]) -> Result<(), VMError> {
        let slot = word::from_be_slice(slot).ok_or(VMError::InvalidStorageSlot { len: slot.len() })?;
        let value =
            word::from_be_slice(value).ok_or(VMError::InvalidStorageValue { len: value.len() })?;
        self.put(slot, value);
        Ok(())
    }

    /// Number of non-zero slots.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Non-zero slots in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Word, &Word)> {
        self.slots.iter()
    }
}

impl fmt::Display for Storage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;
        for (i, (slot, value)) in self.slots.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}: {}", word::to_hex(*slot), word::to_hex(*value))?;
        }
        write!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absent_key_reads_zero() {
        let storage = Storage::new();
        assert_eq!(storage.get(Word::from(7u64)), Word::ZERO);
    }

    #[test]
    fn put_overwrites() {
        let mut storage = Storage::new();
        storage.put(Word::MAX, Word::from(1u64));
        storage.put(Word::MAX, Word::from(2u64));
        assert_eq!(storage.get(Word::MAX), Word::from(2u64));
        assert_eq!(storage.len(), 1);
    }

    #[test]
    fn writing_zero_clears_slot() {
        let mut storage = Storage::new();
        storage.put(Word::from(1u64), Word::from(5u64));
        storage.put(Word::from(1u64), Word::ZERO);
        assert!(storage.is_empty());
        assert_eq!(storage.get(Word::from(1u64)), Word::ZERO);
    }

    #[test]
    fn put_be_bytes_validates() {
        let mut storage = Storage::new();
        storage.put_be_bytes(&[0x01], &[0x02, 0x03]).unwrap();
        assert_eq!(storage.get(Word::from(1u64)), Word::from(0x0203u64));
        assert!(matches!(
            storage.put_be_bytes(&[0u8; 33], &[1]),
            Err(VMError::InvalidStorageSlot { len: 33 })
        ));
        assert!(matches!(
            storage.put_be_bytes(&[1], &[0u8; 40]),
            Err(VMError::InvalidStorageValue { len: 40 })
        ));
    }

    #[test]
    fn display_in_key_order() {
        let mut storage = Storage::new();
        storage.put(Word::from(2u64), Word::from(0xbu64));
        storage.put(Word::from(1u64), Word::from(0xau64));
        assert_eq!(storage.to_string(), "{0x01: 0x0a, 0x02: 0x0b}");
    }
}
