//! Resolution of `PRn|offset` operand addresses.
//!
//! When an instruction uses a pointer register, the address field of
//! the instruction word holds the register number in bits 0-2 and a
//! signed 15-bit offset in bits 3-17.
use serde::Serialize;
use tracing::{event, Level};

use base::prelude::*;

use super::AppendingUnit;

const PR_NUMBER: Field<36> = Field::new(0, 3);
const PR_OFFSET: Field<36> = Field::new(3, 15);

/// The pointer register operand of an instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PointerReference {
    pub pr: Unsigned3Bit,
    pub offset: Unsigned15Bit,
}

impl PointerReference {
    pub fn from_instruction(instruction: Unsigned36Bit) -> PointerReference {
        PointerReference {
            pr: Unsigned3Bit::from_truncated(instruction.get(PR_NUMBER) as u8),
            offset: Unsigned15Bit::from_truncated(instruction.get(PR_OFFSET) as u16),
        }
    }
}

/// The target of a pointer register reference, as loaded into TPR.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PointerResolution {
    pub segment: SegmentNumber,
    pub ring: Ring,
    pub offset: WordOffset,
}

impl AppendingUnit {
    /// Load TPR from the pointer register named by the current
    /// instruction.
    ///
    /// The target ring is the largest (least privileged) of the
    /// pointer register's ring, the current target ring and the
    /// procedure's ring.  The word offset wraps modulo 2^18.
    pub fn resolve_pointer_register(&mut self) -> PointerResolution {
        let reference = PointerReference::from_instruction(self.diagnostics.instruction);
        let pr = self.regs.par[usize::from(reference.pr)];
        let tpr = &mut self.regs.tpr;
        tpr.tsr = pr.snr;
        tpr.trr = pr.rnr.max(tpr.trr).max(self.regs.ppr.prr);
        tpr.ca = pr.wordno.wrapping_add(sign_extend_15_to_18(reference.offset));
        tpr.tbr = pr.bitno;
        self.went_appending = true;
        event!(
            Level::DEBUG,
            "PR{}|{:o} resolves to {}",
            reference.pr,
            reference.offset,
            tpr
        );
        PointerResolution {
            segment: tpr.tsr,
            ring: tpr.trr,
            offset: tpr.ca,
        }
    }
}
