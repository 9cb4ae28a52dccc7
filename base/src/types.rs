//! Names for the roles the word types play in the appending unit.
use super::unsigned::{Unsigned15Bit, Unsigned18Bit, Unsigned24Bit, Unsigned3Bit};

/// A ring number; 0 is the most privileged ring and 7 the least.
pub type Ring = Unsigned3Bit;

/// A segment number, as held in `TPR.TSR`, `PPR.PSR` or a pointer
/// register's `SNR`.
pub type SegmentNumber = Unsigned15Bit;

/// A word offset within a segment (the computed address, `CA`).
pub type WordOffset = Unsigned18Bit;

/// A 24-bit absolute address in main memory.
pub type AbsoluteAddress = Unsigned24Bit;

/// Words per page in a paged segment.
pub const PAGE_SIZE: u32 = 1024;
