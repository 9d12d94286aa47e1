//! 256-bit machine word and the arithmetic the opcodes are defined over.
//!
//! [`Word`] is an unsigned 256-bit integer. Everything wraps modulo 2^256.
//! Signed opcodes read the same bits as two's complement: a word with bit 255
//! set is negative. Division and modulo by zero yield zero instead of faulting.

use ruint::Uint;

/// Native value type of the VM: stack items, storage keys and storage values.
pub type Word = Uint<256, 4>;

/// Width of a word in bytes.
pub const WORD_BYTES: usize = 32;

/// Width of a word in bits.
pub const WORD_BITS: usize = 256;

const SIGN_BIT: usize = WORD_BITS - 1;

/// Returns true when `value` is negative under two's complement.
pub fn is_negative(value: Word) -> bool {
    value.bit(SIGN_BIT)
}

/// Magnitude of `value` read as a signed integer. `-2^255` maps to itself.
fn magnitude(value: Word) -> Word {
    if is_negative(value) {
        value.wrapping_neg()
    } else {
        value
    }
}

/// Builds a word from at most 32 big-endian bytes, left-padding with zeros.
///
/// Returns `None` when the value does not fit in a word.
pub fn from_be_slice(bytes: &[u8]) -> Option<Word> {
    Word::try_from_be_slice(bytes)
}

/// Big-endian 32-byte encoding.
pub fn to_be_bytes(value: Word) -> [u8; WORD_BYTES] {
    value.to_be_bytes::<WORD_BYTES>()
}

/// Smallest number of bytes (at least one) that can hold `value`.
pub fn byte_width(value: Word) -> usize {
    value.bit_len().div_ceil(8).max(1)
}

/// Big-endian encoding of `value` without leading zero bytes (at least one byte).
pub fn minimal_be_bytes(value: Word) -> Vec<u8> {
    let bytes = to_be_bytes(value);
    bytes[WORD_BYTES - byte_width(value)..].to_vec()
}

/// Converts to `usize` when the value fits.
pub fn to_usize(value: Word) -> Option<usize> {
    usize::try_from(value).ok()
}

/// Lowercase hex with a `0x` prefix and no leading zero bytes.
pub fn to_hex(value: Word) -> String {
    format!("0x{}", hex::encode(minimal_be_bytes(value)))
}

fn from_bool(flag: bool) -> Word {
    if flag { Word::from(1u64) } else { Word::ZERO }
}

/// Unsigned division, `a / 0 == 0`.
pub fn div(a: Word, b: Word) -> Word {
    if b.is_zero() { Word::ZERO } else { a / b }
}

/// Unsigned remainder, `a % 0 == 0`.
pub fn rem(a: Word, b: Word) -> Word {
    if b.is_zero() { Word::ZERO } else { a % b }
}

/// Signed division truncating toward zero. `a / 0 == 0` and `-2^255 / -1 == -2^255`.
pub fn sdiv(a: Word, b: Word) -> Word {
    if b.is_zero() {
        return Word::ZERO;
    }
    let quotient = magnitude(a) / magnitude(b);
    if is_negative(a) != is_negative(b) {
        quotient.wrapping_neg()
    } else {
        quotient
    }
}

/// Signed remainder. The result takes the sign of the dividend, `a % 0 == 0`.
pub fn smod(a: Word, b: Word) -> Word {
    if b.is_zero() {
        return Word::ZERO;
    }
    let remainder = magnitude(a) % magnitude(b);
    if is_negative(a) {
        remainder.wrapping_neg()
    } else {
        remainder
    }
}

/// `(a + b) % m` computed without intermediate overflow. Zero when `m == 0`.
pub fn addmod(a: Word, b: Word, m: Word) -> Word {
    if m.is_zero() { Word::ZERO } else { a.add_mod(b, m) }
}

/// `(a * b) % m` computed without intermediate overflow. Zero when `m == 0`.
pub fn mulmod(a: Word, b: Word, m: Word) -> Word {
    if m.is_zero() { Word::ZERO } else { a.mul_mod(b, m) }
}

/// `base ^ exponent` modulo 2^256.
pub fn exp(base: Word, exponent: Word) -> Word {
    base.wrapping_pow(exponent)
}

/// Sign-extends `value` from `(byte_index + 1)` bytes. Indices above 30 leave it unchanged.
pub fn signextend(byte_index: Word, value: Word) -> Word {
    let index = match to_usize(byte_index) {
        Some(i) if i < WORD_BYTES - 1 => i,
        _ => return value,
    };
    let sign_bit = 8 * index + 7;
    let upper = Word::MAX.wrapping_shl(sign_bit + 1);
    if value.bit(sign_bit) {
        value | upper
    } else {
        value & !upper
    }
}

/// Byte `index` of `value` counting from the most significant byte. Zero for `index >= 32`.
pub fn byte(index: Word, value: Word) -> Word {
    match to_usize(index) {
        Some(i) if i < WORD_BYTES => Word::from(to_be_bytes(value)[i]),
        _ => Word::ZERO,
    }
}

/// Shift amount as `usize`, or `None` when it clears the whole word.
fn shift_amount(shift: Word) -> Option<usize> {
    to_usize(shift).filter(|s| *s < WORD_BITS)
}

/// Logical left shift. Shifts of 256 or more produce zero.
pub fn shl(shift: Word, value: Word) -> Word {
    shift_amount(shift).map_or(Word::ZERO, |s| value.wrapping_shl(s))
}

/// Logical right shift. Shifts of 256 or more produce zero.
pub fn shr(shift: Word, value: Word) -> Word {
    shift_amount(shift).map_or(Word::ZERO, |s| value.wrapping_shr(s))
}

/// Arithmetic right shift. Shifts of 256 or more produce zero or all ones by sign.
pub fn sar(shift: Word, value: Word) -> Word {
    let negative = is_negative(value);
    match shift_amount(shift) {
        Some(s) if negative => !((!value).wrapping_shr(s)),
        Some(s) => value.wrapping_shr(s),
        None if negative => Word::MAX,
        None => Word::ZERO,
    }
}

/// Unsigned less-than as a 0/1 word.
pub fn lt(a: Word, b: Word) -> Word {
    from_bool(a < b)
}

/// Unsigned greater-than as a 0/1 word.
pub fn gt(a: Word, b: Word) -> Word {
    from_bool(a > b)
}

/// Signed less-than as a 0/1 word.
pub fn slt(a: Word, b: Word) -> Word {
    let (neg_a, neg_b) = (is_negative(a), is_negative(b));
    from_bool(if neg_a != neg_b { neg_a } else { a < b })
}

/// Signed greater-than as a 0/1 word.
pub fn sgt(a: Word, b: Word) -> Word {
    slt(b, a)
}

/// Equality as a 0/1 word.
pub fn eq(a: Word, b: Word) -> Word {
    from_bool(a == b)
}

/// 1 when `a` is zero, else 0.
pub fn iszero(a: Word) -> Word {
    from_bool(a.is_zero())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn w(v: u64) -> Word {
        Word::from(v)
    }

    /// Two's complement encoding of `-v`.
    fn neg(v: u64) -> Word {
        w(v).wrapping_neg()
    }

    #[test]
    fn add_wraps() {
        assert_eq!(w(1).wrapping_add(Word::MAX), Word::ZERO);
        assert_eq!(Word::ZERO.wrapping_sub(w(1)), Word::MAX);
    }

    #[test]
    fn division_by_zero_is_zero() {
        assert_eq!(div(w(7), Word::ZERO), Word::ZERO);
        assert_eq!(rem(w(7), Word::ZERO), Word::ZERO);
        assert_eq!(sdiv(neg(7), Word::ZERO), Word::ZERO);
        assert_eq!(smod(neg(7), Word::ZERO), Word::ZERO);
    }

    #[test]
    fn sdiv_truncates_toward_zero() {
        assert_eq!(sdiv(Word::MAX, w(1)), Word::MAX);
        assert_eq!(sdiv(neg(11), neg(2)), w(5));
        assert_eq!(sdiv(w(20), neg(2)), neg(10));
        assert_eq!(sdiv(neg(11), w(2)), neg(5));
    }

    #[test]
    fn sdiv_min_by_minus_one_overflows_to_min() {
        let min = w(1).wrapping_shl(255);
        assert_eq!(sdiv(min, Word::MAX), min);
    }

    #[test]
    fn smod_takes_sign_of_dividend() {
        assert_eq!(smod(neg(11), w(3)), neg(2));
        assert_eq!(smod(w(11), neg(3)), w(2));
        assert_eq!(smod(neg(8), neg(3)), neg(2));
    }

    #[test]
    fn addmod_and_mulmod_do_not_overflow() {
        assert_eq!(addmod(Word::MAX, w(2), w(2)), w(1));
        assert_eq!(mulmod(Word::MAX, Word::MAX, w(12)), w(9));
    }

    #[test]
    fn modular_ops_with_zero_modulus_are_zero() {
        assert_eq!(addmod(w(5), w(6), Word::ZERO), Word::ZERO);
        assert_eq!(mulmod(w(5), w(6), Word::ZERO), Word::ZERO);
    }

    #[test]
    fn exp_wraps() {
        assert_eq!(exp(w(2), w(10)), w(1024));
        assert_eq!(exp(w(2), w(256)), Word::ZERO);
        assert_eq!(exp(w(0), w(0)), w(1));
        assert_eq!(exp(Word::MAX, w(2)), w(1));
    }

    #[test]
    fn signextend_cases() {
        assert_eq!(signextend(w(0), w(0xFF)), Word::MAX);
        assert_eq!(signextend(w(0), w(0x7F)), w(0x7F));
        assert_eq!(
            signextend(w(1), w(0xABCD)),
            Word::MAX.wrapping_shl(16) | w(0xABCD)
        );
        assert_eq!(signextend(w(100), w(0xFF)), w(0xFF));
        assert_eq!(signextend(Word::MAX, w(0xFF)), w(0xFF));
    }

    #[test]
    fn byte_counts_from_most_significant() {
        let value = w(0x1122);
        assert_eq!(byte(w(31), value), w(0x22));
        assert_eq!(byte(w(30), value), w(0x11));
        assert_eq!(byte(w(0), Word::MAX), w(0xFF));
        assert_eq!(byte(w(32), Word::MAX), Word::ZERO);
    }

    #[test]
    fn shifts_saturate_at_256() {
        assert_eq!(shl(w(4), w(1)), w(16));
        assert_eq!(shl(w(256), w(1)), Word::ZERO);
        assert_eq!(shr(w(4), w(16)), w(1));
        assert_eq!(shr(Word::MAX, Word::MAX), Word::ZERO);
    }

    #[test]
    fn sar_keeps_sign() {
        assert_eq!(sar(w(2), w(16)), w(4));
        assert_eq!(sar(w(2), neg(16)), neg(4));
        assert_eq!(sar(w(300), neg(16)), Word::MAX);
        assert_eq!(sar(w(300), w(16)), Word::ZERO);
        assert_eq!(sar(w(1), neg(1)), neg(1));
    }

    #[test]
    fn signed_comparisons() {
        assert_eq!(slt(neg(1), w(0)), w(1));
        assert_eq!(slt(w(0), neg(1)), w(0));
        assert_eq!(sgt(w(1), neg(5)), w(1));
        assert_eq!(lt(neg(1), w(0)), w(0));
        assert_eq!(gt(neg(1), w(0)), w(1));
    }

    #[test]
    fn minimal_encoding() {
        assert_eq!(minimal_be_bytes(Word::ZERO), vec![0]);
        assert_eq!(minimal_be_bytes(w(0x4243)), vec![0x42, 0x43]);
        assert_eq!(minimal_be_bytes(Word::MAX).len(), WORD_BYTES);
        assert_eq!(to_hex(w(0x10)), "0x10");
    }

    #[test]
    fn be_slice_round_trip() {
        assert_eq!(from_be_slice(&[0x42, 0x43]), Some(w(0x4243)));
        assert_eq!(from_be_slice(&[]), Some(Word::ZERO));
        assert_eq!(from_be_slice(&[1u8; 33]), None);
        assert_eq!(from_be_slice(&[0u8; 33]), Some(Word::ZERO));
    }

    #[test]
    fn usize_conversion() {
        assert_eq!(to_usize(w(100)), Some(100));
        assert_eq!(to_usize(Word::MAX), None);
    }
}
