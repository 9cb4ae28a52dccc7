//! Bit fields within DPS8/M words.
//!
//! The DPS8/M documentation (AL39) numbers the bits of a word from
//! the left: bit 0 is the most significant bit.  So in a 36-bit word
//! the 24-bit `ADDR` field of a segment descriptor is bits 0-23 and
//! occupies the top 24 bits of the value.  All of the functions here
//! use that numbering.
//!
//! There are two ways to get at a field:
//!
//! - [`Field`] describes a field whose position is fixed by the
//!   hardware (for example the `R1` field of an SDW).  Its position
//!   is checked when the constant is evaluated, so access through it
//!   cannot fail.
//! - The `extract` and `insert` methods of the word types (see
//!   [`crate::prelude`]) accept a position computed at run time and
//!   so return a [`FieldError`] when the field does not fit.

use super::error::FieldError;

/// Return a value whose `length` least significant bits are set.
pub(crate) const fn low_mask(length: u32) -> u128 {
    if length >= u128::BITS {
        u128::MAX
    } else {
        (1_u128 << length) - 1
    }
}

/// Verify that a field of `length` bits starting at `start` lies
/// within a word which is `width` bits wide.
pub fn check_field(start: u32, length: u32, width: u32) -> Result<(), FieldError> {
    if length == 0 {
        Err(FieldError::ZeroLength)
    } else if start >= width || length > width - start {
        Err(FieldError::OutOfRange {
            start,
            length,
            width,
        })
    } else {
        Ok(())
    }
}

/// Extract `length` bits starting at bit `start` of a `width`-bit
/// word held in the low bits of `bits`.  The caller must already
/// have validated the field with [`check_field`].
pub(crate) const fn extract_unchecked(bits: u128, width: u32, start: u32, length: u32) -> u128 {
    (bits >> (width - start - length)) & low_mask(length)
}

/// Replace `length` bits starting at bit `start` of a `width`-bit
/// word with the low `length` bits of `value`.  The caller must
/// already have validated the field with [`check_field`].
pub(crate) const fn insert_unchecked(
    bits: u128,
    value: u128,
    width: u32,
    start: u32,
    length: u32,
) -> u128 {
    let shift = width - start - length;
    let mask = low_mask(length) << shift;
    (bits & !mask) | ((value << shift) & mask)
}

/// A field of `length` bits starting at bit `start` in a word of
/// `W` bits.
///
/// Constants of this type are checked during constant evaluation,
/// so a field which does not fit in its word is a compile-time error:
///
/// ```compile_fail
/// use base::bitfield::Field;
/// const BAD: Field<18> = Field::new(10, 9);
/// let _ = BAD;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Field<const W: u32> {
    start: u32,
    length: u32,
}

impl<const W: u32> Field<W> {
    pub const fn new(start: u32, length: u32) -> Field<W> {
        if length == 0 {
            panic!("a bit field must contain at least one bit");
        }
        if start >= W || length > W - start {
            panic!("bit field does not fit within the word");
        }
        Field { start, length }
    }

    /// A single-bit field.
    pub const fn bit(n: u32) -> Field<W> {
        Field::new(n, 1)
    }

    pub const fn start(&self) -> u32 {
        self.start
    }

    pub const fn length(&self) -> u32 {
        self.length
    }

    pub(crate) const fn get_from(&self, bits: u128) -> u128 {
        extract_unchecked(bits, W, self.start, self.length)
    }

    pub(crate) const fn set_in(&self, bits: u128, value: u128) -> u128 {
        insert_unchecked(bits, value, W, self.start, self.length)
    }
}
