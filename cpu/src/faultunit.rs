//! The FaultUnit keeps track of the faults raised by the appending
//! unit, and holds the fault register in which access violation
//! subfaults are reported to the operating system.
use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{event, Level};

use super::fault::{Fault, FaultKind, Faulter};

#[derive(Debug, Serialize)]
pub struct FaultStatus {
    pub name: String,
    pub number: u8,
    pub count: u64,
    pub message: String,
}

/// Controls whether raising a fault panics.  Panicing is useful when
/// fuzzing or testing code which is not supposed to fault at all.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum PanicOnFault {
    #[default]
    No,
    Yes,
}

#[derive(Debug, Default)]
pub struct FaultUnit {
    panic_on_fault: PanicOnFault,
    counts: BTreeMap<FaultKind, u64>,
    last: BTreeMap<FaultKind, Fault>,
    most_recent: Option<Fault>,
    fault_register: u16,
}

impl FaultUnit {
    pub fn new() -> FaultUnit {
        FaultUnit::default()
    }

    pub fn new_with_panic(panic: PanicOnFault) -> FaultUnit {
        FaultUnit {
            panic_on_fault: panic,
            ..FaultUnit::new()
        }
    }

    fn status_for_fault_kind(&self, kind: &FaultKind) -> FaultStatus {
        FaultStatus {
            name: kind.to_string(),
            number: kind.number(),
            count: self.counts.get(kind).copied().unwrap_or(0),
            message: match self.last.get(kind) {
                Some(f) => f.to_string(),
                None => String::new(),
            },
        }
    }

    pub fn get_fault_statuses(&self) -> Vec<FaultStatus> {
        FaultKind::all_fault_kinds()
            .iter()
            .map(|kind| self.status_for_fault_kind(kind))
            .collect()
    }

    pub fn get_status_of_fault(&self, name: &str) -> Option<FaultStatus> {
        FaultKind::try_from(name)
            .map(|k| self.status_for_fault_kind(&k))
            .ok()
    }

    /// The OR of the access violation bits of every ACV fault since
    /// the register was last read with
    /// [`take_fault_register`](FaultUnit::take_fault_register).  ACV0
    /// is the most significant bit.
    pub fn fault_register(&self) -> u16 {
        self.fault_register
    }

    /// Read and clear the fault register.
    pub fn take_fault_register(&mut self) -> u16 {
        std::mem::take(&mut self.fault_register)
    }

    pub fn last_fault(&self) -> Option<&Fault> {
        self.most_recent.as_ref()
    }

    pub fn fault_count(&self, kind: FaultKind) -> u64 {
        self.counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn clear(&mut self) {
        event!(Level::INFO, "clearing fault history");
        self.counts.clear();
        self.last.clear();
        self.most_recent = None;
        self.fault_register = 0;
    }

    fn maybe_panic(&self, fault: &Fault) {
        if self.panic_on_fault == PanicOnFault::Yes {
            // The current tracing span identifies the reference
            // being translated, so log before panicing.
            event!(Level::ERROR, "panicing with fault {}", fault);
            panic!("fault raised and panic_on_fault is set: {fault}");
        }
    }
}

impl Faulter for FaultUnit {
    fn fire(&mut self, fault: Fault) -> Fault {
        let kind = fault.kind();
        event!(Level::WARN, fault = %kind, "raising fault: {}", fault);
        *self.counts.entry(kind).or_insert(0) += 1;
        if let Some(acv) = fault.acv_subfaults() {
            self.fault_register |= acv.bits();
        }
        self.last.insert(kind, fault.clone());
        self.most_recent = Some(fault.clone());
        self.maybe_panic(&fault);
        fault
    }
}
