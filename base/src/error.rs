//! Basic error reporting.

use std::error::Error;
use std::fmt::{self, Debug, Display, Formatter};

/// Represents a failure to convert to or from one of the unsigned
/// word types defined in the base crate.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConversionFailed {
    TooLarge,
    TooSmall,
}

impl Error for ConversionFailed {}

impl Display for ConversionFailed {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            ConversionFailed::TooLarge => f.write_str("value is too large"),
            ConversionFailed::TooSmall => f.write_str("value is too small"),
        }
    }
}

/// Represents a request for a bit field which does not lie within
/// the word it was applied to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldError {
    /// A field must contain at least one bit.
    ZeroLength,
    /// The field extends past the least significant bit of the word.
    OutOfRange { start: u32, length: u32, width: u32 },
}

impl Error for FieldError {}

impl Display for FieldError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            FieldError::ZeroLength => f.write_str("bit field has zero length"),
            FieldError::OutOfRange {
                start,
                length,
                width,
            } => write!(
                f,
                "bit field of {length} bits starting at bit {start} does not fit in a {width}-bit word"
            ),
        }
    }
}
