//! Various convenience utilities for splitting DPS8/M words and word
//! pairs into smaller components and for joining them together.
use crate::unsigned::{Unsigned15Bit, Unsigned18Bit, Unsigned36Bit, Unsigned72Bit};

/// Split a word pair into its even (first, more significant) and odd
/// (second) words.
pub fn split_pair(pair: Unsigned72Bit) -> (Unsigned36Bit, Unsigned36Bit) {
    let bits = u128::from(pair);
    (
        Unsigned36Bit::from_truncated((bits >> 36) as u64),
        Unsigned36Bit::from_truncated(bits as u64),
    )
}

/// Join an even and an odd word into a word pair.
pub fn join_pair(even: Unsigned36Bit, odd: Unsigned36Bit) -> Unsigned72Bit {
    Unsigned72Bit::from_truncated((u128::from(even) << 36) | u128::from(odd))
}

/// Extract the left (more significant) half word, bits 0-17.
pub fn left_half(word: Unsigned36Bit) -> Unsigned18Bit {
    Unsigned18Bit::from_truncated((u64::from(word) >> 18) as u32)
}

/// Extract the right (less significant) half word, bits 18-35.
pub fn right_half(word: Unsigned36Bit) -> Unsigned18Bit {
    Unsigned18Bit::from_truncated(u64::from(word) as u32)
}

/// Join two half words into a word.
pub fn join_halves(left: Unsigned18Bit, right: Unsigned18Bit) -> Unsigned36Bit {
    Unsigned36Bit::from_truncated((u64::from(left) << 18) | u64::from(right))
}

/// Treat a 15-bit quantity as a two's complement offset and extend
/// it to 18 bits.  This is how the offset in an instruction using
/// `PRn|offset` addressing is added to the pointer register's word
/// number.
pub fn sign_extend_15_to_18(n: Unsigned15Bit) -> Unsigned18Bit {
    let bits = u32::from(n);
    if bits & 0o40_000 != 0 {
        Unsigned18Bit::from_truncated(bits | 0o700_000)
    } else {
        Unsigned18Bit::from_truncated(bits)
    }
}
