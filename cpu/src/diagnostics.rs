//! Diagnostic information for log messages and faults.
//!
//! The real processor recorded only the fault number and (for access
//! violations) the subfault bits, but the emulator also describes
//! what was going on.
use std::fmt::{Display, Formatter};

use serde::Serialize;

use base::prelude::*;

/// CurrentInstructionDiagnostics is only for generating debug
/// information.  It must not be used for control/execution purposes.
///
/// Every fault carries a clone of this, so a clone of it needs to
/// remain cheap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CurrentInstructionDiagnostics {
    pub instruction: Unsigned36Bit,
    pub segment: SegmentNumber,
    pub instruction_address: WordOffset,
}

impl Display for CurrentInstructionDiagnostics {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), std::fmt::Error> {
        write!(
            f,
            "instruction {:>012o} at {:>05o}|{:>06o}",
            self.instruction, self.segment, self.instruction_address
        )
    }
}

#[test]
fn test_diagnostics_display() {
    let diags = CurrentInstructionDiagnostics {
        instruction: u36!(0o000_100_235_000),
        segment: u15!(0o12),
        instruction_address: u18!(0o1234),
    };
    assert_eq!(
        diags.to_string(),
        "instruction 000100235000 at 00012|001234"
    );
}
