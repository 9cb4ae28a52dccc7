//! Unsigned types of the widths which occur in DPS8/M words and
//! registers.
//!
//! The machine word is 36 bits wide, and the appending unit deals
//! with a number of narrower quantities packed into words: 3-bit
//! ring numbers, 14-bit segment bounds, 15-bit segment numbers,
//! 18-bit word offsets and 24-bit absolute addresses.  Descriptors
//! are fetched as 72-bit word pairs.  Each of these has its own type
//! here so that, for example, a segment number cannot be passed where
//! an absolute address is expected.

use std::fmt::{self, Debug, Display, Formatter, Octal};

use serde::Serialize;

use super::bitfield::{check_field, extract_unchecked, insert_unchecked, Field};
use super::error::{ConversionFailed, FieldError};

#[cfg(test)]
mod tests;

/// Conversions from native types which can never fail (e.g.
/// `From<u8> for Unsigned18Bit`).
macro_rules! from_native_type_to_self {
    ($SelfT:ty, $($from:ty)*) => {
        $(
            impl From<$from> for $SelfT {
                fn from(n: $from) -> Self {
                    Self {
                        bits: n.into(),
                    }
                }
            }
        )*
    }
}

/// Conversions to native types which can never fail (e.g.
/// `From<Unsigned18Bit> for u64`).
macro_rules! from_self_to_native_type {
    ($SelfT:ty, $($to:ty)*) => {
        $(
            impl From<$SelfT> for $to {
                fn from(n: $SelfT) -> $to {
                    // The range of n.bits is narrower than that of
                    // its storage type, so this cannot truncate even
                    // where $to is narrower than the storage type.
                    n.bits as $to
                }
            }
        )*
    }
}

/// Conversions to native types which fail when the value does not
/// fit (e.g. `TryFrom<Unsigned18Bit> for u16`).
macro_rules! try_from_self_to_native_type {
    ($SelfT:ty, $($to:ty)*) => {
        $(
            impl TryFrom<$SelfT> for $to {
                type Error = ConversionFailed;
                fn try_from(n: $SelfT) -> Result<$to, ConversionFailed> {
                    <$to>::try_from(n.bits).map_err(|_| ConversionFailed::TooLarge)
                }
            }
        )*
    }
}

/// Conversions from native types which fail when the value does not
/// fit (e.g. `TryFrom<u64> for Unsigned36Bit`).
macro_rules! try_from_native_type_to_self {
    ($SelfT:ty, $InnerT:ty, $($from:ty)*) => {
        $(
            impl TryFrom<$from> for $SelfT {
                type Error = ConversionFailed;
                fn try_from(n: $from) -> Result<Self, ConversionFailed> {
                    let bits: $InnerT = match n.try_into() {
                        Err(_) => {
                            // The storage type is unsigned, so a
                            // failure for a negative input means the
                            // input was too small.  For unsigned
                            // inputs this comparison is always false.
                            #[allow(unused_comparisons)]
                            if n < 0 {
                                return Err(ConversionFailed::TooSmall);
                            } else {
                                return Err(ConversionFailed::TooLarge);
                            }
                        }
                        Ok(value) if value > Self::VALUE_BITS => {
                            return Err(ConversionFailed::TooLarge);
                        }
                        Ok(value) => value,
                    };
                    Ok(Self { bits })
                }
            }
        )*
    }
}

/// Conversions from a narrower word type to a wider one.
macro_rules! widen {
    ($FromT:ty => $($ToT:ty)*) => {
        $(
            impl From<$FromT> for $ToT {
                fn from(n: $FromT) -> $ToT {
                    Self { bits: n.bits.into() }
                }
            }
        )*
    }
}

/// This macro implements the functionality shared by all the word
/// types.  `SelfT` is the type being defined, `BITS` its width and
/// `InnerT` the native type which stores the bits.
macro_rules! unsigned_word_impl {
    ($SelfT:ty, $BITS:expr, $InnerT:ty) => {
        impl $SelfT {
            pub const BITS: u32 = $BITS;
            const MODULUS: $InnerT = (1 << $BITS);
            const VALUE_BITS: $InnerT = Self::MODULUS - 1;

            pub const MAX: Self = Self {
                bits: Self::VALUE_BITS,
            };
            pub const ZERO: Self = Self { bits: 0 };
            pub const ONE: Self = Self { bits: 1 };
            pub const MIN: Self = Self::ZERO;

            // An out-of-range N fails at compile time.  This is pub
            // so that it can be used in u36!() and similar.
            pub const fn new<const N: $InnerT>() -> $SelfT {
                type Word = $SelfT;
                struct Helper<const M: $InnerT>;
                impl<const M: $InnerT> Helper<M> {
                    const U: Word = {
                        if M > Word::MAX.bits {
                            panic!("input value is out of range")
                        } else {
                            Word { bits: M }
                        }
                    };
                }
                Helper::<N>::U
            }

            /// Keep only the low `BITS` bits of `n`.
            pub const fn from_truncated(n: $InnerT) -> Self {
                Self {
                    bits: n & Self::VALUE_BITS,
                }
            }

            pub const fn is_zero(&self) -> bool {
                self.bits == 0
            }

            pub const fn wrapping_add(self, rhs: $SelfT) -> $SelfT {
                Self::from_truncated(self.bits.wrapping_add(rhs.bits))
            }

            pub const fn wrapping_sub(self, rhs: $SelfT) -> $SelfT {
                Self::from_truncated(self.bits.wrapping_sub(rhs.bits))
            }

            pub fn checked_add(self, rhs: $SelfT) -> Option<$SelfT> {
                match self.bits.checked_add(rhs.bits) {
                    Some(sum) if sum <= Self::VALUE_BITS => Some(Self { bits: sum }),
                    _ => None,
                }
            }

            // Trait methods cannot be const, so this is a work-alike
            // of std::ops::BitAnd usable in constant expressions.
            pub const fn and(self, mask: $InnerT) -> Self {
                Self {
                    bits: self.bits & mask,
                }
            }

            /// Return the value of the field of `length` bits
            /// starting at bit `start` (bit 0 is the most significant).
            pub fn extract(self, start: u32, length: u32) -> Result<$InnerT, FieldError> {
                check_field(start, length, $BITS)?;
                Ok(extract_unchecked(u128::from(self.bits), $BITS, start, length) as $InnerT)
            }

            /// Return a copy of this word in which the field of
            /// `length` bits starting at bit `start` holds the low
            /// `length` bits of `value`.
            pub fn insert(self, value: $InnerT, start: u32, length: u32) -> Result<Self, FieldError> {
                check_field(start, length, $BITS)?;
                let bits = insert_unchecked(
                    u128::from(self.bits),
                    u128::from(value),
                    $BITS,
                    start,
                    length,
                );
                Ok(Self {
                    bits: bits as $InnerT,
                })
            }

            /// Fetch a field whose position was checked at compile time.
            pub const fn get(self, field: Field<{ $BITS }>) -> $InnerT {
                field.get_from(self.bits as u128) as $InnerT
            }

            /// Test a one-bit field.
            pub const fn flag(self, field: Field<{ $BITS }>) -> bool {
                self.get(field) != 0
            }

            /// Replace a field whose position was checked at compile time.
            pub const fn with(self, field: Field<{ $BITS }>, value: $InnerT) -> Self {
                Self {
                    bits: field.set_in(self.bits as u128, value as u128) as $InnerT,
                }
            }

            /// Set or clear a one-bit field.
            pub const fn with_flag(self, field: Field<{ $BITS }>, value: bool) -> Self {
                self.with(field, if value { 1 } else { 0 })
            }
        }

        impl Display for $SelfT {
            fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
                Octal::fmt(&self.bits, f)
            }
        }

        impl Octal for $SelfT {
            fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
                Octal::fmt(&self.bits, f)
            }
        }

        impl Debug for $SelfT {
            fn fmt(&self, f: &mut Formatter) -> fmt::Result {
                write!(f, concat!(stringify!($SelfT), "{{bits: {:#o}}}"), self.bits)
            }
        }

        impl std::ops::BitAnd for $SelfT {
            type Output = Self;
            fn bitand(self, rhs: Self) -> Self {
                Self {
                    bits: self.bits & rhs.bits,
                }
            }
        }

        impl std::ops::BitOr for $SelfT {
            type Output = Self;
            fn bitor(self, rhs: Self) -> Self {
                Self {
                    bits: self.bits | rhs.bits,
                }
            }
        }

        impl std::ops::Not for $SelfT {
            type Output = Self;
            fn not(self) -> Self {
                Self {
                    bits: (!self.bits) & Self::VALUE_BITS,
                }
            }
        }
    };
}

/// `Unsigned3Bit` holds a ring number.  Ring 0 is the most
/// privileged and ring 7 the least.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Unsigned3Bit {
    pub(crate) bits: u8,
}

/// `Unsigned14Bit` holds a segment bound (in units of 16 words) or a
/// call limiter.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Unsigned14Bit {
    pub(crate) bits: u16,
}

/// `Unsigned15Bit` holds a segment number.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Unsigned15Bit {
    pub(crate) bits: u16,
}

/// `Unsigned18Bit` is a half word.  Word offsets within a segment
/// (the computed address, `CA`) are 18 bits wide.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Unsigned18Bit {
    pub(crate) bits: u32,
}

/// `Unsigned24Bit` is an absolute (physical) memory address.  Main
/// memory has at most 16M words.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Unsigned24Bit {
    pub(crate) bits: u32,
}

/// `Unsigned36Bit` is the DPS8/M machine word.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Unsigned36Bit {
    pub(crate) bits: u64,
}

/// `Unsigned72Bit` is an even/odd word pair, as used for segment
/// descriptors and for the `ldbr`/`sdbr` operand.
#[derive(Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Unsigned72Bit {
    pub(crate) bits: u128,
}

unsigned_word_impl!(Unsigned3Bit, 3, u8);
unsigned_word_impl!(Unsigned14Bit, 14, u16);
unsigned_word_impl!(Unsigned15Bit, 15, u16);
unsigned_word_impl!(Unsigned18Bit, 18, u32);
unsigned_word_impl!(Unsigned24Bit, 24, u32);
unsigned_word_impl!(Unsigned36Bit, 36, u64);
unsigned_word_impl!(Unsigned72Bit, 72, u128);

////////////////////////////////////////////////////////////////////////
// Unsigned3Bit
////////////////////////////////////////////////////////////////////////

from_self_to_native_type!(Unsigned3Bit, u8 i8 u16 i16 u32 i32 u64 i64 u128 usize);
try_from_native_type_to_self!(Unsigned3Bit, u8, u8 i8 u16 i16 u32 i32 u64 i64 usize);

////////////////////////////////////////////////////////////////////////
// Unsigned14Bit
////////////////////////////////////////////////////////////////////////

from_native_type_to_self!(Unsigned14Bit, u8);
from_self_to_native_type!(Unsigned14Bit, u16 i16 u32 i32 u64 i64 u128 usize);
try_from_self_to_native_type!(Unsigned14Bit, u8);
try_from_native_type_to_self!(Unsigned14Bit, u16, u16 i16 u32 i32 u64 i64 usize);

////////////////////////////////////////////////////////////////////////
// Unsigned15Bit
////////////////////////////////////////////////////////////////////////

from_native_type_to_self!(Unsigned15Bit, u8);
from_self_to_native_type!(Unsigned15Bit, u16 i16 u32 i32 u64 i64 u128 usize);
try_from_self_to_native_type!(Unsigned15Bit, u8);
try_from_native_type_to_self!(Unsigned15Bit, u16, u16 i16 u32 i32 u64 i64 usize);

////////////////////////////////////////////////////////////////////////
// Unsigned18Bit
////////////////////////////////////////////////////////////////////////

from_native_type_to_self!(Unsigned18Bit, u8 u16);
from_self_to_native_type!(Unsigned18Bit, u32 i32 u64 i64 u128 usize);
try_from_self_to_native_type!(Unsigned18Bit, u8 u16);
try_from_native_type_to_self!(Unsigned18Bit, u32, u32 i32 u64 i64 usize);

////////////////////////////////////////////////////////////////////////
// Unsigned24Bit
////////////////////////////////////////////////////////////////////////

from_native_type_to_self!(Unsigned24Bit, u8 u16);
from_self_to_native_type!(Unsigned24Bit, u32 i32 u64 i64 u128 usize);
try_from_self_to_native_type!(Unsigned24Bit, u8 u16);
try_from_native_type_to_self!(Unsigned24Bit, u32, u32 i32 u64 i64 usize);

////////////////////////////////////////////////////////////////////////
// Unsigned36Bit
////////////////////////////////////////////////////////////////////////

from_native_type_to_self!(Unsigned36Bit, u8 u16 u32);
from_self_to_native_type!(Unsigned36Bit, u64 i64 u128);
try_from_self_to_native_type!(Unsigned36Bit, u32 usize);
try_from_native_type_to_self!(Unsigned36Bit, u64, u64 i64 u128 usize);

////////////////////////////////////////////////////////////////////////
// Unsigned72Bit
////////////////////////////////////////////////////////////////////////

from_native_type_to_self!(Unsigned72Bit, u8 u16 u32 u64);
from_self_to_native_type!(Unsigned72Bit, u128);
try_from_native_type_to_self!(Unsigned72Bit, u128, u128);

////////////////////////////////////////////////////////////////////////
// Conversions between the word types
////////////////////////////////////////////////////////////////////////

widen!(Unsigned3Bit => Unsigned14Bit Unsigned15Bit Unsigned18Bit Unsigned36Bit);
widen!(Unsigned14Bit => Unsigned15Bit Unsigned18Bit Unsigned24Bit Unsigned36Bit);
widen!(Unsigned15Bit => Unsigned18Bit Unsigned24Bit Unsigned36Bit);
widen!(Unsigned18Bit => Unsigned24Bit Unsigned36Bit);
widen!(Unsigned24Bit => Unsigned36Bit);
widen!(Unsigned36Bit => Unsigned72Bit);
