//! Registers of the DPS8/M which take part in address translation.
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use base::prelude::*;

/// Procedure Pointer Register: describes the procedure being
/// executed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Ppr {
    /// Ring in which the procedure is executing.
    pub prr: Ring,
    /// Segment number of the procedure.
    pub psr: SegmentNumber,
    /// Privileged mode.
    pub p: bool,
    /// Instruction counter.
    pub ic: WordOffset,
}

/// Temporary Pointer Register: the target of the current reference.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Tpr {
    /// Target segment number.
    pub tsr: SegmentNumber,
    /// Target ring number.
    pub trr: Ring,
    /// Computed address (word offset in the target segment).
    pub ca: WordOffset,
    /// Bit offset within the word; 6 bits.
    pub tbr: u8,
}

impl Display for Tpr {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(
            f,
            "{:>05o}|{:>06o} ring {}",
            self.tsr, self.ca, self.trr
        )
    }
}

/// One of the eight pointer registers PR0-PR7.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PointerRegister {
    /// Segment number.
    pub snr: SegmentNumber,
    /// Ring number.
    pub rnr: Ring,
    /// Word number within the segment.
    pub wordno: WordOffset,
    /// Bit number within the word; 6 bits.
    pub bitno: u8,
}

/// The registers the appending unit reads and writes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Registers {
    pub ppr: Ppr,
    pub tpr: Tpr,
    pub par: [PointerRegister; 8],
    /// Ring alarm register; zero disables the ring alarm check.
    pub ralr: Ring,
}

/// Descriptor Segment Base Register.
///
/// The `ldbr` instruction loads it from a word pair laid out as:
///
/// | word | bits  | field                                      |
/// |------|-------|--------------------------------------------|
/// | even | 0-23  | `ADDR`, base of the descriptor segment      |
/// | odd  | 1-14  | `BND`, bound in units of 16 words           |
/// | odd  | 19    | `U`, set when the descriptor segment is unpaged |
/// | odd  | 24-35 | `STACK`, the stack base segment number (12 bits) |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Dsbr {
    /// The absolute address of the descriptor segment (when `unpaged`)
    /// or of its page table.
    pub addr: AbsoluteAddress,
    pub bound: Unsigned14Bit,
    pub unpaged: bool,
    pub stack: u16,
}

const DSBR_ADDR: Field<36> = Field::new(0, 24);
const DSBR_BND: Field<36> = Field::new(1, 14);
const DSBR_U: Field<36> = Field::bit(19);
const DSBR_STACK: Field<36> = Field::new(24, 12);

impl Dsbr {
    /// Decode the operand of `ldbr`.
    pub fn from_word_pair(pair: Unsigned72Bit) -> Dsbr {
        let (even, odd) = split_pair(pair);
        Dsbr {
            addr: AbsoluteAddress::from_truncated(even.get(DSBR_ADDR) as u32),
            bound: Unsigned14Bit::from_truncated(odd.get(DSBR_BND) as u16),
            unpaged: odd.flag(DSBR_U),
            stack: odd.get(DSBR_STACK) as u16,
        }
    }

    /// Encode the register as `sdbr` stores it.
    pub fn to_word_pair(&self) -> Unsigned72Bit {
        let even = Unsigned36Bit::ZERO.with(DSBR_ADDR, u64::from(self.addr));
        let odd = Unsigned36Bit::ZERO
            .with(DSBR_BND, u64::from(self.bound))
            .with_flag(DSBR_U, self.unpaged)
            .with(DSBR_STACK, u64::from(self.stack));
        join_pair(even, odd)
    }

    /// The number of words in the descriptor segment which its bound
    /// allows.
    pub fn size_words(&self) -> u32 {
        16 * (u32::from(self.bound) + 1)
    }
}

impl Display for Dsbr {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(
            f,
            "DSBR addr={:>08o} bound={:>05o} {} stack={:>04o}",
            self.addr,
            self.bound,
            if self.unpaged { "unpaged" } else { "paged" },
            self.stack
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dsbr_decode() {
        let even = u36!(0o01_234_567 << 12);
        // BND=0o12345 at bits 1-14, U at bit 19, STACK=0o4321.
        let odd = Unsigned36Bit::from_truncated(
            (0o12345_u64 << 21) | (1 << 16) | 0o4321,
        );
        let dsbr = Dsbr::from_word_pair(join_pair(even, odd));
        assert_eq!(dsbr.addr, u24!(0o01_234_567));
        assert_eq!(u16::from(dsbr.bound), 0o12345);
        assert!(dsbr.unpaged);
        assert_eq!(dsbr.stack, 0o4321);
        assert_eq!(dsbr.to_word_pair(), join_pair(even, odd));
    }

    #[test]
    fn dsbr_size() {
        let dsbr = Dsbr::default();
        assert_eq!(dsbr.size_words(), 16);
        let dsbr = Dsbr {
            bound: Unsigned14Bit::MAX,
            ..Dsbr::default()
        };
        assert_eq!(dsbr.size_words(), 1 << 18);
    }

    #[test]
    fn dsbr_ignores_unused_bits() {
        let pair = join_pair(Unsigned36Bit::MAX, Unsigned36Bit::MAX);
        let dsbr = Dsbr::from_word_pair(pair);
        let even = u36!(0o777_777_770_000);
        let odd = u36!(0o377_770_207_777);
        assert_eq!(dsbr.to_word_pair(), join_pair(even, odd));
    }
}
