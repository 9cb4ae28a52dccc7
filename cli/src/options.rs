//! Parsing of the `--segment` and `--translate` arguments.
//!
//! Numbers are written in octal, as they are in DPS8/M listings.
use std::error::Error;
use std::fmt::{self, Display, Formatter};

use base::prelude::*;
use cpu::{CycleType, Sdw};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadArgument(String);

impl Display for BadArgument {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(&self.0)
    }
}

impl Error for BadArgument {}

fn octal<T: TryFrom<u32>>(what: &str, s: &str) -> Result<T, BadArgument> {
    let n = u32::from_str_radix(s, 8)
        .map_err(|e| BadArgument(format!("{what} '{s}' is not an octal number: {e}")))?;
    T::try_from(n).map_err(|_| BadArgument(format!("{what} {s} is out of range")))
}

/// A segment to lay out, given as `SEGNO:BOUND:R1,R2,R3:FLAGS[:paged]`.
///
/// `BOUND` counts 16-word blocks, less one, as in an SDW.  `FLAGS`
/// is drawn from `REWPG` (read, execute, write, privileged, gate) and
/// may be `-` for none.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentSpec {
    pub segno: SegmentNumber,
    pub sdw: Sdw,
    pub paged: bool,
}

pub fn parse_segment(s: &str) -> Result<SegmentSpec, BadArgument> {
    let fields: Vec<&str> = s.split(':').collect();
    let (segno, bound, rings, flags, paged) = match fields.as_slice() {
        [segno, bound, rings, flags] => (segno, bound, rings, flags, false),
        [segno, bound, rings, flags, "paged"] => (segno, bound, rings, flags, true),
        [_, _, _, _, other] => {
            return Err(BadArgument(format!(
                "segment layout should be 'paged' or omitted, not '{other}'"
            )));
        }
        _ => {
            return Err(BadArgument(format!(
                "'{s}' should have the form SEGNO:BOUND:R1,R2,R3:FLAGS[:paged]"
            )));
        }
    };
    let rings: Vec<Ring> = rings
        .split(',')
        .map(|r| octal::<Ring>("ring", r))
        .collect::<Result<_, _>>()?;
    let [r1, r2, r3] = rings.as_slice() else {
        return Err(BadArgument(format!(
            "'{s}' should give exactly three ring numbers"
        )));
    };
    if let Some(bad) = flags.chars().find(|ch| !"REWPG-".contains(*ch)) {
        return Err(BadArgument(format!("unknown segment access flag '{bad}'")));
    }
    Ok(SegmentSpec {
        segno: octal("segment number", segno)?,
        paged,
        sdw: Sdw {
            r1: *r1,
            r2: *r2,
            r3: *r3,
            f: true,
            bound: octal("bound", bound)?,
            r: flags.contains('R'),
            e: flags.contains('E'),
            w: flags.contains('W'),
            p: flags.contains('P'),
            g: flags.contains('G'),
            ..Sdw::default()
        },
    })
}

/// An address to translate, given as `SEGNO|OFFSET[:CYCLE]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TranslateRequest {
    pub segno: SegmentNumber,
    pub offset: WordOffset,
    pub cycle: CycleType,
}

fn parse_cycle(s: &str) -> Result<CycleType, BadArgument> {
    match s {
        "if" => Ok(CycleType::InstructionFetch),
        "rd" => Ok(CycleType::OperandRead),
        "st" => Ok(CycleType::OperandStore),
        "ind" => Ok(CycleType::IndirectWordFetch),
        "rtcd" => Ok(CycleType::RtcdOperandFetch),
        other => Err(BadArgument(format!(
            "unknown cycle '{other}' (expected one of if, rd, st, ind, rtcd)"
        ))),
    }
}

pub fn parse_translate(s: &str) -> Result<TranslateRequest, BadArgument> {
    let (address, cycle) = match s.split_once(':') {
        Some((address, cycle)) => (address, parse_cycle(cycle)?),
        None => (s, CycleType::OperandRead),
    };
    let Some((segno, offset)) = address.split_once('|') else {
        return Err(BadArgument(format!(
            "'{s}' should have the form SEGNO|OFFSET[:CYCLE]"
        )));
    };
    Ok(TranslateRequest {
        segno: octal("segment number", segno)?,
        offset: octal("offset", offset)?,
        cycle,
    })
}
