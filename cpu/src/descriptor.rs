//! Segment descriptor words (SDWs) and page table words (PTWs).
//!
//! An SDW occupies an even/odd word pair in the descriptor segment:
//!
//! | word | bits  | field                                     |
//! |------|-------|-------------------------------------------|
//! | even | 0-23  | `ADDR`: segment base, or page table base  |
//! | even | 24-32 | `R1`, `R2`, `R3`: ring brackets           |
//! | even | 33    | `F`: valid                                |
//! | even | 34-35 | `FC`: directed fault code when not valid  |
//! | odd  | 1-14  | `BOUND`: highest 16-word block            |
//! | odd  | 15-21 | `R` `E` `W` `P` `U` `G` `C`               |
//! | odd  | 22-35 | `CL`: call limiter (entry bound)          |
//!
//! A PTW is a single word:
//!
//! | bits  | field                                     |
//! |-------|-------------------------------------------|
//! | 0-17  | `ADDR`: page frame, in units of 64 words  |
//! | 26    | `U`: used                                 |
//! | 29    | `M`: modified                             |
//! | 33    | `F`: valid                                |
//! | 34-35 | `FC`: directed fault code when not valid  |
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use base::prelude::*;

const SDW_ADDR: Field<36> = Field::new(0, 24);
const SDW_R1: Field<36> = Field::new(24, 3);
const SDW_R2: Field<36> = Field::new(27, 3);
const SDW_R3: Field<36> = Field::new(30, 3);
const SDW_F: Field<36> = Field::bit(33);
const SDW_FC: Field<36> = Field::new(34, 2);

const SDW_BOUND: Field<36> = Field::new(1, 14);
const SDW_R: Field<36> = Field::bit(15);
const SDW_E: Field<36> = Field::bit(16);
const SDW_W: Field<36> = Field::bit(17);
const SDW_P: Field<36> = Field::bit(18);
const SDW_U: Field<36> = Field::bit(19);
const SDW_G: Field<36> = Field::bit(20);
const SDW_C: Field<36> = Field::bit(21);
const SDW_CL: Field<36> = Field::new(22, 14);

const PTW_ADDR: Field<36> = Field::new(0, 18);
const PTW_U: Field<36> = Field::bit(26);
const PTW_M: Field<36> = Field::bit(29);
const PTW_F: Field<36> = Field::bit(33);
const PTW_FC: Field<36> = Field::new(34, 2);

/// A segment descriptor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Sdw {
    pub addr: AbsoluteAddress,
    pub r1: Ring,
    pub r2: Ring,
    pub r3: Ring,
    pub f: bool,
    pub fc: u8,
    pub bound: Unsigned14Bit,
    pub r: bool,
    pub e: bool,
    pub w: bool,
    pub p: bool,
    /// Set when the segment is not paged.
    pub u: bool,
    pub g: bool,
    pub c: bool,
    pub cl: Unsigned14Bit,
}

fn ring(word: Unsigned36Bit, field: Field<36>) -> Ring {
    Ring::from_truncated(word.get(field) as u8)
}

impl Sdw {
    pub fn from_word_pair(pair: Unsigned72Bit) -> Sdw {
        let (even, odd) = split_pair(pair);
        Sdw {
            addr: AbsoluteAddress::from_truncated(even.get(SDW_ADDR) as u32),
            r1: ring(even, SDW_R1),
            r2: ring(even, SDW_R2),
            r3: ring(even, SDW_R3),
            f: even.flag(SDW_F),
            fc: even.get(SDW_FC) as u8,
            bound: Unsigned14Bit::from_truncated(odd.get(SDW_BOUND) as u16),
            r: odd.flag(SDW_R),
            e: odd.flag(SDW_E),
            w: odd.flag(SDW_W),
            p: odd.flag(SDW_P),
            u: odd.flag(SDW_U),
            g: odd.flag(SDW_G),
            c: odd.flag(SDW_C),
            cl: Unsigned14Bit::from_truncated(odd.get(SDW_CL) as u16),
        }
    }

    pub fn to_word_pair(&self) -> Unsigned72Bit {
        let even = Unsigned36Bit::ZERO
            .with(SDW_ADDR, u64::from(self.addr))
            .with(SDW_R1, u64::from(self.r1))
            .with(SDW_R2, u64::from(self.r2))
            .with(SDW_R3, u64::from(self.r3))
            .with_flag(SDW_F, self.f)
            .with(SDW_FC, u64::from(self.fc));
        let odd = Unsigned36Bit::ZERO
            .with(SDW_BOUND, u64::from(self.bound))
            .with_flag(SDW_R, self.r)
            .with_flag(SDW_E, self.e)
            .with_flag(SDW_W, self.w)
            .with_flag(SDW_P, self.p)
            .with_flag(SDW_U, self.u)
            .with_flag(SDW_G, self.g)
            .with_flag(SDW_C, self.c)
            .with(SDW_CL, u64::from(self.cl));
        join_pair(even, odd)
    }

    /// Are the ring brackets in order (`R1 <= R2 <= R3`)?
    pub fn rings_in_order(&self) -> bool {
        self.r1 <= self.r2 && self.r2 <= self.r3
    }
}

impl Display for Sdw {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        let flags: String = [
            (self.r, 'R'),
            (self.e, 'E'),
            (self.w, 'W'),
            (self.p, 'P'),
            (self.u, 'U'),
            (self.g, 'G'),
            (self.c, 'C'),
        ]
        .iter()
        .map(|(on, ch)| if *on { *ch } else { '-' })
        .collect();
        write!(
            f,
            "SDW addr={:>08o} rings={},{},{} bound={:>05o} cl={:>05o} {} {}",
            self.addr,
            self.r1,
            self.r2,
            self.r3,
            self.bound,
            self.cl,
            flags,
            if self.f {
                "valid".to_string()
            } else {
                format!("fc={}", self.fc)
            }
        )
    }
}

/// A page table word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Ptw {
    /// The page frame, in units of 64 words.
    pub addr: WordOffset,
    pub u: bool,
    pub m: bool,
    pub f: bool,
    pub fc: u8,
}

impl Ptw {
    pub fn from_word(word: Unsigned36Bit) -> Ptw {
        Ptw {
            addr: WordOffset::from_truncated(word.get(PTW_ADDR) as u32),
            u: word.flag(PTW_U),
            m: word.flag(PTW_M),
            f: word.flag(PTW_F),
            fc: word.get(PTW_FC) as u8,
        }
    }

    pub fn to_word(&self) -> Unsigned36Bit {
        Unsigned36Bit::ZERO
            .with(PTW_ADDR, u64::from(self.addr))
            .with_flag(PTW_U, self.u)
            .with_flag(PTW_M, self.m)
            .with_flag(PTW_F, self.f)
            .with(PTW_FC, u64::from(self.fc))
    }

    /// The absolute address of the first word of the page frame.
    pub fn frame_address(&self) -> AbsoluteAddress {
        AbsoluteAddress::from_truncated(u32::from(self.addr) << 6)
    }

    /// The bit to set in memory to mark a page as used.
    pub fn used_mask() -> Unsigned36Bit {
        Unsigned36Bit::ZERO.with_flag(PTW_U, true)
    }

    /// The bit to set in memory to mark a page as modified.
    pub fn modified_mask() -> Unsigned36Bit {
        Unsigned36Bit::ZERO.with_flag(PTW_M, true)
    }
}

impl Display for Ptw {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(
            f,
            "PTW frame={:>08o}{}{} {}",
            self.frame_address(),
            if self.u { " used" } else { "" },
            if self.m { " modified" } else { "" },
            if self.f {
                "valid".to_string()
            } else {
                format!("fc={}", self.fc)
            }
        )
    }
}
