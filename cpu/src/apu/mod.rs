//! Emulates the appending unit of the DPS8/M processor.
//!
//! The appending unit converts a segmented address (a segment number
//! and a word offset, qualified by the ring from which the reference
//! is made) into a 24-bit absolute address.  On the way it enforces
//! the ring protection of the segment and, for paged segments, walks
//! the page table.  Within this emulator the appending unit performs
//! the following functions:
//!
//! - Locating segment descriptors in the descriptor segment
//!   (`descseg.rs`), whether or not the descriptor segment is paged
//! - Resolving `PRn|offset` operand addresses (`ptrreg.rs`)
//! - The appending cycle proper, with its access checks (`appending.rs`)
//! - Managing the SDW and PTW associative memories, which the `ldbr`,
//!   `cams` and `camp` instructions clear
//!
//! Main memory is shared between processors, so it is not owned by
//! the appending unit; each operation which needs it is passed a
//! [`MainMemory`](crate::memory::MainMemory) implementation.  The
//! associative memories and the DSBR belong to one processor.
use tracing::{event, Level};

use base::prelude::*;

mod appending;
mod descseg;
mod ptrreg;

#[cfg(test)]
mod tests;

pub use ptrreg::{PointerReference, PointerResolution};

use crate::am::{AmEntryStatus, AssociativeMemoryConfiguration, PtwAm, PtwKey, SdwAm};
use crate::cycle::InstructionClass;
use crate::diagnostics::CurrentInstructionDiagnostics;
use crate::fault::{AcvFaults, Fault, FaultDetails, Faulter};
use crate::faultunit::{FaultUnit, PanicOnFault};
use crate::memory::MemoryOpFailure;
use crate::registers::{Dsbr, Registers};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendingUnitConfiguration {
    pub sdwam: AssociativeMemoryConfiguration,
    pub ptwam: AssociativeMemoryConfiguration,
    pub panic_on_fault: PanicOnFault,
}

#[derive(Debug)]
pub struct AppendingUnit {
    pub regs: Registers,
    dsbr: Dsbr,
    sdwam: SdwAm,
    ptwam: PtwAm,
    /// `R1` of the SDW used by the most recent appending cycle; the
    /// `call6` and `rtcd` instructions consult it.
    rsdwh_r1: Ring,
    /// Set when the operand address came from a pointer register, so
    /// that the operand is fetched in append mode even if the
    /// processor is in absolute mode.
    went_appending: bool,
    instruction_class: InstructionClass,
    diagnostics: CurrentInstructionDiagnostics,
    faults: FaultUnit,
}

impl AppendingUnit {
    pub fn new(config: &AppendingUnitConfiguration) -> AppendingUnit {
        AppendingUnit {
            regs: Registers::default(),
            dsbr: Dsbr::default(),
            sdwam: SdwAm::new(&config.sdwam),
            ptwam: PtwAm::new(&config.ptwam),
            rsdwh_r1: Ring::ZERO,
            went_appending: false,
            instruction_class: InstructionClass::default(),
            diagnostics: CurrentInstructionDiagnostics::default(),
            faults: FaultUnit::new_with_panic(config.panic_on_fault),
        }
    }

    /// Processor reset (initialize): clears the registers, the DSBR
    /// and both associative memories.  The fault history is kept.
    pub fn reset(&mut self) {
        event!(Level::INFO, "resetting the appending unit");
        self.regs = Registers::default();
        self.dsbr = Dsbr::default();
        self.sdwam.invalidate_all();
        self.ptwam.invalidate_all();
        self.rsdwh_r1 = Ring::ZERO;
        self.went_appending = false;
        self.instruction_class = InstructionClass::default();
        self.diagnostics = CurrentInstructionDiagnostics::default();
    }

    /// Record the start of a new instruction.  `instruction` is the
    /// instruction word, fetched from `PPR.PSR|PPR.IC`.
    pub fn begin_instruction(&mut self, instruction: Unsigned36Bit, class: InstructionClass) {
        self.diagnostics = CurrentInstructionDiagnostics {
            instruction,
            segment: self.regs.ppr.psr,
            instruction_address: self.regs.ppr.ic,
        };
        self.instruction_class = class;
        self.went_appending = false;
    }

    /// The `ldbr` instruction: load the DSBR and clear both
    /// associative memories.
    pub fn load_dsbr(&mut self, pair: Unsigned72Bit) {
        self.dsbr = Dsbr::from_word_pair(pair);
        event!(Level::DEBUG, "ldbr: {}", self.dsbr);
        self.sdwam.invalidate_all();
        self.ptwam.invalidate_all();
    }

    /// The `sdbr` instruction.
    pub fn store_dsbr(&self) -> Unsigned72Bit {
        self.dsbr.to_word_pair()
    }

    /// The `cams` instruction: clear the SDW associative memory.
    pub fn invalidate_segment_cache(&mut self) {
        event!(Level::DEBUG, "cams: clearing the SDW associative memory");
        self.sdwam.invalidate_all();
    }

    /// The `camp` instruction: clear the PTW associative memory.
    pub fn invalidate_page_cache(&mut self) {
        event!(Level::DEBUG, "camp: clearing the PTW associative memory");
        self.ptwam.invalidate_all();
    }

    pub fn dsbr(&self) -> &Dsbr {
        &self.dsbr
    }

    pub fn rsdwh_r1(&self) -> Ring {
        self.rsdwh_r1
    }

    pub fn went_appending(&self) -> bool {
        self.went_appending
    }

    pub fn instruction_class(&self) -> InstructionClass {
        self.instruction_class
    }

    pub fn diagnostics(&self) -> &CurrentInstructionDiagnostics {
        &self.diagnostics
    }

    pub fn fault_unit(&self) -> &FaultUnit {
        &self.faults
    }

    pub fn fault_unit_mut(&mut self) -> &mut FaultUnit {
        &mut self.faults
    }

    pub fn sdwam_entries(&self) -> Vec<AmEntryStatus<SegmentNumber>> {
        self.sdwam.entries()
    }

    pub fn ptwam_entries(&self) -> Vec<AmEntryStatus<PtwKey>> {
        self.ptwam.entries()
    }

    fn raise(&mut self, details: FaultDetails) -> Fault {
        self.faults.fire(Fault {
            details,
            diagnostics: self.diagnostics,
        })
    }

    fn access_violation(&mut self, subfaults: AcvFaults) -> Fault {
        self.raise(FaultDetails::AccessViolation { subfaults })
    }

    fn store_fault(&mut self, failure: MemoryOpFailure) -> Fault {
        self.raise(FaultDetails::Store { failure })
    }
}
