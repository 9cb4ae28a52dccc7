//! The vocabulary which the instruction-execution logic uses to tell
//! the appending unit what kind of memory reference it is making.
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

#[cfg(test)]
use test_strategy::Arbitrary;

/// The processor cycle during which an address is being translated.
#[cfg_attr(test, derive(Arbitrary))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum CycleType {
    InstructionFetch,
    OperandRead,
    OperandStore,
    IndirectWordFetch,
    /// Fetch of the pointer pair operand of an `rtcd` instruction.
    RtcdOperandFetch,
    EisOperandRead,
    EisOperandStore,
    DivideExecution,
    AbortCycle,
    FaultCycle,
    ApuDataRead,
    ApuDataStore,
}

impl CycleType {
    /// Does this cycle write to memory?
    #[must_use]
    pub fn is_store(&self) -> bool {
        matches!(
            self,
            CycleType::OperandStore | CycleType::EisOperandStore | CycleType::ApuDataStore
        )
    }

    #[must_use]
    pub const fn all_cycle_types() -> [CycleType; 12] {
        [
            CycleType::InstructionFetch,
            CycleType::OperandRead,
            CycleType::OperandStore,
            CycleType::IndirectWordFetch,
            CycleType::RtcdOperandFetch,
            CycleType::EisOperandRead,
            CycleType::EisOperandStore,
            CycleType::DivideExecution,
            CycleType::AbortCycle,
            CycleType::FaultCycle,
            CycleType::ApuDataRead,
            CycleType::ApuDataStore,
        ]
    }
}

impl Display for CycleType {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(match self {
            CycleType::InstructionFetch => "instruction fetch",
            CycleType::OperandRead => "operand read",
            CycleType::OperandStore => "operand store",
            CycleType::IndirectWordFetch => "indirect word fetch",
            CycleType::RtcdOperandFetch => "rtcd operand fetch",
            CycleType::EisOperandRead => "EIS operand read",
            CycleType::EisOperandStore => "EIS operand store",
            CycleType::DivideExecution => "divide execution",
            CycleType::AbortCycle => "abort cycle",
            CycleType::FaultCycle => "fault cycle",
            CycleType::ApuDataRead => "APU data read",
            CycleType::ApuDataStore => "APU data store",
        })
    }
}

/// The properties of the current instruction which change the way
/// its operand reference is checked.
#[cfg_attr(test, derive(Arbitrary))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum InstructionClass {
    #[default]
    Ordinary,
    /// The instruction transfers control to its operand address
    /// (e.g. `tra`), so the operand is checked as an instruction
    /// fetch would be.
    Transfer,
    /// The `call6` instruction, whose operand is checked against the
    /// target segment's gate and call brackets.
    Call6,
}
