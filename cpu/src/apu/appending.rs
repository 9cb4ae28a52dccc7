//! The appending cycle.
//!
//! The hardware documentation describes the appending cycle as a
//! flowchart whose boxes are labelled A to L.  The names of the
//! phases here follow those labels:
//!
//! | Phase | Action                                                    |
//! |-------|-----------------------------------------------------------|
//! | A     | Find the SDW of the target segment                        |
//! | B     | Check the ring brackets; choose the kind of check to make  |
//! | E, E1 | `call6` operand: gate and call bracket checks              |
//! | F     | Instruction fetch or transfer operand: execute bracket     |
//! | D     | Ring alarm check                                          |
//! | B     | Otherwise, read or write bracket checks                   |
//! | G     | Segment bound check, then raise any access violation;     |
//! |       | for a paged segment, find the PTW                         |
//! | H     | Final address of an unpaged segment                       |
//! | I     | Final address of a paged segment; set the PTW's `M` bit   |
//! | HI    | Decide whether the reference changes the procedure        |
//! | KL    | Set `PPR.P` for the new procedure                         |
//!
//! Most access violations are collected as they are found and raised
//! together in phase G, so that the fault handler sees every reason
//! the reference failed.  Ring order violations and call limiter
//! violations are raised at once.
use tracing::{event, span, Level};

use base::prelude::*;

use super::AppendingUnit;
use crate::am::PtwKey;
use crate::cycle::{CycleType, InstructionClass};
use crate::descriptor::{Ptw, Sdw};
use crate::fault::{AcvFaults, AcvSubfault, DescriptorKind, Fault, FaultDetails, FaultKind};
use crate::memory::MainMemory;

/// The three ways in which phase B can continue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ReferenceKind {
    /// The operand of `call6` (phase E).
    Call,
    /// An instruction fetch or the operand of a transfer (phase F).
    Transfer,
    /// Reading or writing data.
    Data { store: bool },
}

fn classify(class: InstructionClass, cycle: CycleType) -> ReferenceKind {
    if class == InstructionClass::Call6 && cycle == CycleType::OperandRead {
        ReferenceKind::Call
    } else if cycle == CycleType::InstructionFetch
        || (class == InstructionClass::Transfer && cycle == CycleType::OperandRead)
    {
        ReferenceKind::Transfer
    } else {
        ReferenceKind::Data {
            store: cycle.is_store(),
        }
    }
}

/// Does the reference make the target segment the current procedure
/// (so that `PPR.P` must be recomputed)?
fn changes_procedure(class: InstructionClass, cycle: CycleType) -> bool {
    match cycle {
        CycleType::InstructionFetch | CycleType::RtcdOperandFetch => true,
        CycleType::OperandRead => class != InstructionClass::Ordinary,
        _ => false,
    }
}

impl AppendingUnit {
    /// Translate `address`, an offset within segment `TPR.TSR`
    /// referenced from ring `TPR.TRR`, into an absolute address.
    ///
    /// A fault abandons the translation; the caller should abandon
    /// the current instruction too.
    pub fn translate<M: MainMemory>(
        &mut self,
        mem: &mut M,
        address: WordOffset,
        cycle: CycleType,
    ) -> Result<AbsoluteAddress, Fault> {
        let span = span!(Level::TRACE,
                         "append",
                         segment=%self.regs.tpr.tsr,
                         offset=%address,
                         cycle=%cycle);
        let _enter = span.enter();
        let mut acv = AcvFaults::default();
        let tsr = self.regs.tpr.tsr;

        // A: find the SDW.
        let sdw = self.acquire_sdw(mem, tsr)?;
        self.rsdwh_r1 = sdw.r1;
        event!(Level::TRACE, "A: {}", sdw);

        // B: the ring brackets must be consistent.
        if !sdw.rings_in_order() {
            acv.set(
                AcvSubfault::IllegalRingOrder,
                "SDW ring brackets are not in order",
            );
            return Err(self.access_violation(acv));
        }
        let kind = classify(self.instruction_class, cycle);
        event!(Level::TRACE, "B: {:?} reference", kind);
        match kind {
            ReferenceKind::Call => self.check_call(&sdw, address, &mut acv)?,
            ReferenceKind::Transfer => {
                self.check_transfer(&sdw, &mut acv);
                self.check_ring_alarm(cycle, &mut acv);
            }
            ReferenceKind::Data { store } => self.check_data(&sdw, store, &mut acv),
        }

        // G: the offset must be within the segment.
        let block = (u32::from(address) >> 4) & 0o37777;
        if block > u32::from(sdw.bound) {
            acv.set(
                AcvSubfault::OutOfSegmentBounds,
                "offset is beyond the bound of the segment",
            );
        }
        if !acv.is_empty() {
            event!(Level::TRACE, "G: access violation {}", acv);
            return Err(self.access_violation(acv));
        }

        let final_address = if sdw.u {
            // H: unpaged.
            let a = sdw.addr.wrapping_add(AbsoluteAddress::from(address));
            event!(Level::TRACE, "H: final address {:>08o}", a);
            a
        } else {
            let (ptw, ptw_address) = self.acquire_ptw(mem, &sdw, tsr, address)?;
            // I: paged.
            if cycle.is_store() && !ptw.m {
                self.modify_ptw(mem, tsr, address, ptw, ptw_address)?;
            }
            let a = AbsoluteAddress::from_truncated(
                ((u32::from(ptw.addr) & 0o777_777) << 6) + (u32::from(address) % PAGE_SIZE),
            );
            event!(Level::TRACE, "I: final address {:>08o}", a);
            a
        };

        // HI
        if cycle == CycleType::IndirectWordFetch {
            return Ok(final_address);
        }
        if changes_procedure(self.instruction_class, cycle) {
            // KL: only ring 0 code may be privileged.
            self.regs.ppr.p = if self.regs.tpr.trr.is_zero() {
                sdw.p
            } else {
                false
            };
            event!(Level::TRACE, "KL: PPR.P={}", self.regs.ppr.p);
        }
        Ok(final_address)
    }

    /// Phases E and E1: the operand of `call6`.  `address` is the
    /// entry point being called.
    fn check_call(
        &mut self,
        sdw: &Sdw,
        address: WordOffset,
        acv: &mut AcvFaults,
    ) -> Result<(), Fault> {
        if !sdw.e {
            acv.set(AcvSubfault::NoExecute, "call6 target is not executable");
        }
        let ppr = self.regs.ppr;
        if !sdw.g && ppr.psr != self.regs.tpr.tsr {
            // The call limiter bounds the low 14 bits of the entry
            // offset.
            let entry = u32::from(address) & 0o37777;
            if entry >= u32::from(sdw.cl) {
                acv.set(
                    AcvSubfault::NotAGate,
                    "call6 entry is beyond the call limiter",
                );
                return Err(self.access_violation(*acv));
            }
        }
        // E1
        let tpr = &mut self.regs.tpr;
        if tpr.trr > sdw.r3 {
            acv.set(
                AcvSubfault::OutsideCallBracket,
                "caller is outside the call bracket",
            );
        }
        if tpr.trr < sdw.r1 {
            acv.set(AcvSubfault::OutwardCall, "call6 would be an outward call");
        }
        if tpr.trr > ppr.prr && ppr.prr < sdw.r2 {
            acv.set(AcvSubfault::BadOutwardCall, "bad outward call");
        }
        if tpr.trr > sdw.r2 {
            tpr.trr = sdw.r2;
        }
        event!(Level::TRACE, "E: call to ring {}", tpr.trr);
        Ok(())
    }

    /// Phase F: instruction fetch or transfer of control.
    fn check_transfer(&self, sdw: &Sdw, acv: &mut AcvFaults) {
        let trr = self.regs.tpr.trr;
        if trr < sdw.r1 || trr > sdw.r2 {
            acv.set(
                AcvSubfault::OutsideExecuteBracket,
                "ring is outside the execute bracket",
            );
        }
        if !sdw.e {
            acv.set(AcvSubfault::NoExecute, "segment is not executable");
        }
        if self.regs.ppr.prr != trr {
            acv.set(
                AcvSubfault::CrossRingTransfer,
                "transfer would change ring",
            );
        }
    }

    /// Phase D: the ring alarm.
    fn check_ring_alarm(&self, cycle: CycleType, acv: &mut AcvFaults) {
        let ralr = self.regs.ralr;
        if cycle != CycleType::InstructionFetch && !ralr.is_zero() && self.regs.ppr.prr >= ralr {
            acv.set(AcvSubfault::RingAlarm, "ring alarm");
        }
    }

    /// The read and write bracket checks for data references.
    fn check_data(&self, sdw: &Sdw, store: bool, acv: &mut AcvFaults) {
        let tpr = self.regs.tpr;
        if store {
            if tpr.trr > sdw.r2 {
                acv.set(
                    AcvSubfault::OutsideWriteBracket,
                    "ring is outside the write bracket",
                );
            }
            if !sdw.w {
                acv.set(AcvSubfault::NoWrite, "segment is not writable");
            }
        } else {
            if tpr.trr > sdw.r2 {
                acv.set(
                    AcvSubfault::OutsideReadBracket,
                    "ring is outside the read bracket",
                );
            }
            if !sdw.r && self.regs.ppr.psr != tpr.tsr {
                acv.set(AcvSubfault::NoRead, "segment is not readable");
            }
        }
    }

    /// Find the PTW for the page of `segno` containing `address`,
    /// from the PTW associative memory if possible.  Also returns the
    /// absolute address of the PTW.
    fn acquire_ptw<M: MainMemory>(
        &mut self,
        mem: &mut M,
        sdw: &Sdw,
        segno: SegmentNumber,
        address: WordOffset,
    ) -> Result<(Ptw, AbsoluteAddress), Fault> {
        let ptw_address = sdw
            .addr
            .wrapping_add(AbsoluteAddress::from_truncated(u32::from(address) / PAGE_SIZE));
        let key = PtwKey::new(segno, address);
        if let Some(ptw) = self.ptwam.lookup(&key) {
            return Ok((ptw, ptw_address));
        }
        let ptw = self.fetch_ptw(mem, segno, ptw_address)?;
        self.ptwam.load(key, ptw);
        Ok((ptw, ptw_address))
    }

    fn fetch_ptw<M: MainMemory>(
        &mut self,
        mem: &mut M,
        segno: SegmentNumber,
        address: AbsoluteAddress,
    ) -> Result<Ptw, Fault> {
        let word = mem.read_word(address).map_err(|e| self.store_fault(e))?;
        let ptw = Ptw::from_word(word);
        event!(Level::DEBUG, "fetched {} from {:>08o}", ptw, address);
        if !ptw.f {
            return Err(self.raise(FaultDetails::Directed {
                kind: FaultKind::directed(ptw.fc),
                descriptor: DescriptorKind::Ptw,
                segment: segno,
                address,
            }));
        }
        Ok(ptw)
    }

    /// Mark a page as modified, both in main memory and in the PTW
    /// associative memory.
    fn modify_ptw<M: MainMemory>(
        &mut self,
        mem: &mut M,
        segno: SegmentNumber,
        address: WordOffset,
        mut ptw: Ptw,
        ptw_address: AbsoluteAddress,
    ) -> Result<(), Fault> {
        event!(Level::TRACE, "setting M in PTW at {:>08o}", ptw_address);
        mem.set_bits(ptw_address, Ptw::modified_mask())
            .map_err(|e| self.store_fault(e))?;
        ptw.m = true;
        self.ptwam.update(&PtwKey::new(segno, address), ptw);
        Ok(())
    }
}
