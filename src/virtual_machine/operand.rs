//! Push immediates.
//!
//! An [`Operand`] is the immediate that follows a `PUSHn` opcode: a declared
//! width of 1 to 32 bytes plus the value. The width is kept separately from the
//! value so re-encoding reproduces non-minimal encodings such as `PUSH2 0x0001`.

use crate::types::word::{self, WORD_BYTES, Word};
use crate::virtual_machine::errors::VMError;
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Operand {
    width: u8,
    value: Word,
}

impl Operand {
    /// Creates an operand of `width` bytes.
    ///
    /// Fails when the width is outside 1..=32 or `value` needs more bytes.
    pub fn new(width: usize, value: Word) -> Result<Self, VMError> {
        if width == 0 || width > WORD_BYTES {
            return Err(VMError::InvalidOperand {
                operand: word::to_hex(value),
                reason: "push width must be between 1 and 32 bytes",
            });
        }
        if word::byte_width(value) > width {
            return Err(VMError::InvalidOperand {
                operand: word::to_hex(value),
                reason: "value does not fit in the declared width",
            });
        }
        Ok(Self {
            width: width as u8,
            value,
        })
    }

    /// Smallest operand (at least one byte) holding `value`.
    pub fn minimal(value: Word) -> Self {
        Self {
            width: word::byte_width(value) as u8,
            value,
        }
    }

    /// Decodes an immediate from `available` bytes of a `width`-byte slot.
    ///
    /// Missing trailing bytes are treated as zero, so a truncated `PUSH2 0x42`
    /// reads as `0x4200`.
    pub(crate) fn from_code(width: usize, available: &[u8]) -> Self {
        let mut buf = [0u8; WORD_BYTES];
        let start = WORD_BYTES - width;
        let take = available.len().min(width);
        buf[start..start + take].copy_from_slice(&available[..take]);
        Self {
            width: width as u8,
            value: Word::from_be_bytes(buf),
        }
    }

    pub fn width(&self) -> usize {
        self.width as usize
    }

    pub fn value(&self) -> Word {
        self.value
    }

    /// Big-endian bytes at the declared width.
    pub fn to_bytes(&self) -> Vec<u8> {
        word::to_be_bytes(self.value)[WORD_BYTES - self.width()..].to_vec()
    }

    /// Appends the big-endian immediate to `out`.
    pub fn encode(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&word::to_be_bytes(self.value)[WORD_BYTES - self.width()..]);
    }
}

/// `0x` followed by exactly two hex digits per byte of declared width.
impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.to_bytes()))
    }
}

/// Parses `0x`-prefixed hex into bytes, two digits per byte.
pub(crate) fn parse_hex_bytes(token: &str) -> Result<Vec<u8>, VMError> {
    let invalid = |reason| VMError::InvalidOperand {
        operand: token.to_string(),
        reason,
    };
    let digits = token
        .strip_prefix("0x")
        .ok_or_else(|| invalid("expected a 0x-prefixed hex literal"))?;
    if digits.is_empty() {
        return Err(invalid("expected at least one byte of hex digits"));
    }
    hex::decode(digits).map_err(|err| match err {
        hex::FromHexError::OddLength => invalid("expected two hex digits per byte"),
        _ => invalid("invalid hex digit"),
    })
}
