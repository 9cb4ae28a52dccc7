//! This crate emulates the appending unit of the DPS8/M processor:
//! the associative memories, the descriptor segment walk and the
//! access checks of the appending cycle.
#![crate_name = "cpu"]

pub mod am;
pub mod apu;
pub mod cycle;
pub mod descriptor;
pub mod diagnostics;
pub mod fault;
pub mod faultunit;
pub mod layout;
pub mod memory;
pub mod registers;

pub use am::{AmEntryStatus, AssociativeMemoryConfiguration, PtwKey, AM_SLOTS};
pub use apu::{AppendingUnit, AppendingUnitConfiguration, PointerReference, PointerResolution};
pub use cycle::{CycleType, InstructionClass};
pub use descriptor::{Ptw, Sdw};
pub use diagnostics::CurrentInstructionDiagnostics;
pub use fault::{AcvFaults, AcvSubfault, DescriptorKind, Fault, FaultDetails, FaultKind};
pub use faultunit::{FaultStatus, FaultUnit, PanicOnFault};
pub use layout::{DescriptorSegmentBuilder, LayoutError};
pub use memory::{MainMemory, MemoryConfiguration, MemoryOpFailure, MemoryUnit, SharedMemory};
pub use registers::{Dsbr, PointerRegister, Ppr, Registers, Tpr};
