//! 32-byte Keccak-256 hash type used by the `SHA3` opcode.

use crate::types::word::Word;
use sha3::{Digest, Keccak256};
use std::fmt;

/// Keccak-256 hash length in bytes.
pub const HASH_LEN: usize = 32;

/// Signature of the hash primitive the interpreter calls for `SHA3`.
///
/// Injected into the runner so callers can swap the primitive in tests.
pub type HashFn = fn(&[u8]) -> Hash;

/// Fixed-size 32-byte hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Hash, Ord, PartialOrd)]
pub struct Hash(pub [u8; HASH_LEN]);

impl Hash {
    /// Interprets the digest as a big-endian machine word.
    pub fn to_word(&self) -> Word {
        Word::from_be_bytes(self.0)
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

/// Keccak-256 of `data`, the default [`HashFn`].
pub fn keccak256(data: &[u8]) -> Hash {
    Hash(Keccak256::digest(data).into())
}
