//! Faults raised by the DPS8/M appending unit.
use std::error::Error;
use std::fmt::{self, Display, Formatter};

use serde::Serialize;

use base::prelude::*;

use super::diagnostics::CurrentInstructionDiagnostics;
use super::memory::MemoryOpFailure;

/// Describes the kinds of fault that the appending unit can raise.
///
/// These acronyms are upper case to follow the names in the DPS8/M
/// documentation (AL39).
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord, Serialize)]
pub enum FaultKind {
    /// Store fault; main memory did not respond at the given address.
    STR,
    /// Directed faults 0-3; a descriptor or page table word was not
    /// valid.  Its fault code selects which of the four is raised.
    DF0,
    DF1,
    DF2,
    DF3,
    /// Access violation.
    ACV,
}

impl Display for FaultKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(match self {
            FaultKind::STR => "STR",
            FaultKind::DF0 => "DF0",
            FaultKind::DF1 => "DF1",
            FaultKind::DF2 => "DF2",
            FaultKind::DF3 => "DF3",
            FaultKind::ACV => "ACV",
        })
    }
}

impl FaultKind {
    /// The fault number, which selects the fault vector.
    #[must_use]
    pub fn number(&self) -> u8 {
        match self {
            FaultKind::STR => 1,
            FaultKind::DF0 => 16,
            FaultKind::DF1 => 17,
            FaultKind::DF2 => 18,
            FaultKind::DF3 => 19,
            FaultKind::ACV => 20,
        }
    }

    /// The directed fault selected by the 2-bit fault code of an
    /// invalid descriptor.
    #[must_use]
    pub fn directed(fault_code: u8) -> FaultKind {
        match fault_code & 3 {
            0 => FaultKind::DF0,
            1 => FaultKind::DF1,
            2 => FaultKind::DF2,
            _ => FaultKind::DF3,
        }
    }

    #[must_use]
    pub const fn all_fault_kinds() -> [FaultKind; 6] {
        [
            FaultKind::STR,
            FaultKind::DF0,
            FaultKind::DF1,
            FaultKind::DF2,
            FaultKind::DF3,
            FaultKind::ACV,
        ]
    }
}

#[derive(Debug)]
pub struct UnknownFaultName(String);

impl Display for UnknownFaultName {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "unknown fault name '{}'", self.0)
    }
}

impl Error for UnknownFaultName {}

impl TryFrom<&str> for FaultKind {
    type Error = UnknownFaultName;
    fn try_from(s: &str) -> Result<FaultKind, UnknownFaultName> {
        match s {
            "STR" => Ok(FaultKind::STR),
            "DF0" => Ok(FaultKind::DF0),
            "DF1" => Ok(FaultKind::DF1),
            "DF2" => Ok(FaultKind::DF2),
            "DF3" => Ok(FaultKind::DF3),
            "ACV" => Ok(FaultKind::ACV),
            _ => Err(UnknownFaultName(s.to_owned())),
        }
    }
}

#[test]
fn test_fault_kind_round_trip() {
    for orig_kind in FaultKind::all_fault_kinds() {
        let name = orig_kind.to_string();
        match FaultKind::try_from(name.as_str()) {
            Ok(k) => {
                assert_eq!(k, orig_kind);
            }
            Err(_) => {
                panic!("unable to round-trip fault kind {orig_kind:?}");
            }
        }
    }
    assert!(FaultKind::try_from("this is not a fault name").is_err());
}

/// The access violation subfaults.  The discriminant is the subfault
/// number; ACVn occupies bit `1 << (15 - n)` of the fault register,
/// so ACV0 is the most significant of the 16 bits.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, PartialOrd, Ord, Serialize)]
pub enum AcvSubfault {
    /// ACV0 (IRO): SDW ring numbers are not in order.
    IllegalRingOrder = 0,
    /// ACV1 (OEB): not in execute bracket.
    OutsideExecuteBracket = 1,
    /// ACV2 (E-OFF): no execute permission.
    NoExecute = 2,
    /// ACV3 (ORB): not in read bracket.
    OutsideReadBracket = 3,
    /// ACV4 (R-OFF): no read permission.
    NoRead = 4,
    /// ACV5 (OWB): not in write bracket.
    OutsideWriteBracket = 5,
    /// ACV6 (W-OFF): no write permission.
    NoWrite = 6,
    /// ACV7 (NO GA): the call is beyond the gate (call limiter).
    NotAGate = 7,
    /// ACV8 (OCB): not in call bracket.
    OutsideCallBracket = 8,
    /// ACV9 (OCALL): outward call.
    OutwardCall = 9,
    /// ACV10 (BOC): bad outward call.
    BadOutwardCall = 10,
    /// ACV11 (INRET): inward return.  Not generated here.
    InwardReturn = 11,
    /// ACV12 (CRT): invalid ring crossing.
    CrossRingTransfer = 12,
    /// ACV13 (RALR): ring alarm.
    RingAlarm = 13,
    /// ACV14 (AME): associative memory error.  Not generated here.
    AssociativeMemoryError = 14,
    /// ACV15 (OOSB): out of segment bounds.
    OutOfSegmentBounds = 15,
}

impl AcvSubfault {
    #[must_use]
    pub const fn all_subfaults() -> [AcvSubfault; 16] {
        [
            AcvSubfault::IllegalRingOrder,
            AcvSubfault::OutsideExecuteBracket,
            AcvSubfault::NoExecute,
            AcvSubfault::OutsideReadBracket,
            AcvSubfault::NoRead,
            AcvSubfault::OutsideWriteBracket,
            AcvSubfault::NoWrite,
            AcvSubfault::NotAGate,
            AcvSubfault::OutsideCallBracket,
            AcvSubfault::OutwardCall,
            AcvSubfault::BadOutwardCall,
            AcvSubfault::InwardReturn,
            AcvSubfault::CrossRingTransfer,
            AcvSubfault::RingAlarm,
            AcvSubfault::AssociativeMemoryError,
            AcvSubfault::OutOfSegmentBounds,
        ]
    }

    #[must_use]
    pub const fn number(&self) -> u8 {
        *self as u8
    }

    /// The bit which represents this subfault in the fault register.
    #[must_use]
    pub const fn bit(&self) -> u16 {
        1 << (15 - *self as u16)
    }

    #[must_use]
    pub fn mnemonic(&self) -> &'static str {
        match self {
            AcvSubfault::IllegalRingOrder => "IRO",
            AcvSubfault::OutsideExecuteBracket => "OEB",
            AcvSubfault::NoExecute => "E-OFF",
            AcvSubfault::OutsideReadBracket => "ORB",
            AcvSubfault::NoRead => "R-OFF",
            AcvSubfault::OutsideWriteBracket => "OWB",
            AcvSubfault::NoWrite => "W-OFF",
            AcvSubfault::NotAGate => "NO GA",
            AcvSubfault::OutsideCallBracket => "OCB",
            AcvSubfault::OutwardCall => "OCALL",
            AcvSubfault::BadOutwardCall => "BOC",
            AcvSubfault::InwardReturn => "INRET",
            AcvSubfault::CrossRingTransfer => "CRT",
            AcvSubfault::RingAlarm => "RALR",
            AcvSubfault::AssociativeMemoryError => "AME",
            AcvSubfault::OutOfSegmentBounds => "OOSB",
        }
    }
}

impl Display for AcvSubfault {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "ACV{} ({})", self.number(), self.mnemonic())
    }
}

/// Access violation subfaults accumulated during one appending
/// cycle.
///
/// The bits of every subfault which triggers are kept, but only the
/// message of the most recent one survives.  The fault handler of the
/// guest operating system uses only the bits.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AcvFaults {
    bits: u16,
    message: Option<&'static str>,
}

impl AcvFaults {
    pub fn set(&mut self, subfault: AcvSubfault, message: &'static str) {
        self.bits |= subfault.bit();
        self.message = Some(message);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bits == 0
    }

    #[must_use]
    pub fn bits(&self) -> u16 {
        self.bits
    }

    #[must_use]
    pub fn contains(&self, subfault: AcvSubfault) -> bool {
        self.bits & subfault.bit() != 0
    }

    /// The subfaults which are set, in order of subfault number.
    #[must_use]
    pub fn subfaults(&self) -> Vec<AcvSubfault> {
        AcvSubfault::all_subfaults()
            .into_iter()
            .filter(|s| self.contains(*s))
            .collect()
    }

    /// The message of the most recently set subfault.
    #[must_use]
    pub fn message(&self) -> Option<&'static str> {
        self.message
    }
}

impl Display for AcvFaults {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        let names: Vec<&'static str> = self.subfaults().iter().map(|s| s.mnemonic()).collect();
        write!(f, "{:06o} [{}]", self.bits, names.join(","))
    }
}

#[test]
fn test_acv_bits() {
    assert_eq!(AcvSubfault::IllegalRingOrder.bit(), 0o100_000);
    assert_eq!(AcvSubfault::OutOfSegmentBounds.bit(), 0o000_001);
    let mut acv = AcvFaults::default();
    assert!(acv.is_empty());
    acv.set(AcvSubfault::OutsideReadBracket, "first");
    acv.set(AcvSubfault::OutOfSegmentBounds, "second");
    assert_eq!(acv.bits(), 0o010_001);
    assert_eq!(
        acv.subfaults(),
        vec![
            AcvSubfault::OutsideReadBracket,
            AcvSubfault::OutOfSegmentBounds
        ]
    );
    // Only the message of the last subfault survives.
    assert_eq!(acv.message(), Some("second"));
    assert_eq!(acv.to_string(), "010001 [ORB,OOSB]");
}

/// Which kind of table entry was found to be invalid when a directed
/// fault is raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DescriptorKind {
    /// A segment descriptor word.
    Sdw,
    /// A page table word of the descriptor segment.
    DescriptorSegmentPtw,
    /// A page table word of the segment being referenced.
    Ptw,
}

impl Display for DescriptorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.write_str(match self {
            DescriptorKind::Sdw => "SDW",
            DescriptorKind::DescriptorSegmentPtw => "descriptor segment PTW",
            DescriptorKind::Ptw => "PTW",
        })
    }
}

/// The details of a fault.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FaultDetails {
    /// One or more access violation subfaults.
    AccessViolation { subfaults: AcvFaults },

    /// An SDW or PTW had its `F` bit clear.  The operating system is
    /// expected to make the segment or page available and restart
    /// the instruction.
    Directed {
        kind: FaultKind,
        descriptor: DescriptorKind,
        segment: SegmentNumber,
        address: AbsoluteAddress,
    },

    /// Main memory failed to respond while the appending unit was
    /// fetching or updating a table entry.
    Store { failure: MemoryOpFailure },
}

impl FaultDetails {
    #[must_use]
    pub fn kind(&self) -> FaultKind {
        match self {
            FaultDetails::AccessViolation { .. } => FaultKind::ACV,
            FaultDetails::Directed { kind, .. } => *kind,
            FaultDetails::Store { .. } => FaultKind::STR,
        }
    }
}

impl Display for FaultDetails {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            FaultDetails::AccessViolation { subfaults } => {
                write!(f, "ACV: access violation {subfaults}")?;
                if let Some(msg) = subfaults.message() {
                    write!(f, ": {msg}")?;
                }
                Ok(())
            }
            FaultDetails::Directed {
                kind,
                descriptor,
                segment,
                address,
            } => write!(
                f,
                "{kind}: {descriptor} at {address:>08o} for segment {segment:>05o} is not valid"
            ),
            FaultDetails::Store { failure } => write!(f, "STR: {failure}"),
        }
    }
}

/// A fault.  Raising a fault abandons the current instruction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fault {
    pub details: FaultDetails,
    pub diagnostics: CurrentInstructionDiagnostics,
}

impl Fault {
    #[must_use]
    pub fn kind(&self) -> FaultKind {
        self.details.kind()
    }

    /// The access violation subfaults carried by this fault, if it
    /// is an access violation.
    #[must_use]
    pub fn acv_subfaults(&self) -> Option<AcvFaults> {
        match &self.details {
            FaultDetails::AccessViolation { subfaults } => Some(*subfaults),
            _ => None,
        }
    }

    /// Is this an access violation which includes `subfault`?
    #[must_use]
    pub fn has_subfault(&self, subfault: AcvSubfault) -> bool {
        self.acv_subfaults()
            .is_some_and(|acv| acv.contains(subfault))
    }
}

impl Display for Fault {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{} during {}", self.details, self.diagnostics)
    }
}

impl Error for Fault {}

/// A trait for objects which receive the faults the appending unit
/// raises.
pub trait Faulter {
    /// Record that `fault` is being raised, and return it so that
    /// the caller can abandon the current instruction with it.
    fn fire(&mut self, fault: Fault) -> Fault;
}
