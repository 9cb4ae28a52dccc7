use std::thread;

use test_strategy::proptest;

use base::prelude::*;

use super::{AppendingUnit, AppendingUnitConfiguration};
use crate::am::AssociativeMemoryConfiguration;
use crate::cycle::{CycleType, InstructionClass};
use crate::descriptor::{Ptw, Sdw};
use crate::fault::{AcvSubfault, DescriptorKind, Fault, FaultDetails, FaultKind};
use crate::faultunit::PanicOnFault;
use crate::layout::DescriptorSegmentBuilder;
use crate::memory::{MainMemory, MemoryConfiguration, MemoryUnit, SharedMemory};

const MEMORY_WORDS: u32 = 0o400_000;
const DS_BASE: AbsoluteAddress = u24!(0o1000);
const COMPLAIN: &str = "test layout should fit in memory";

fn seg(n: u16) -> SegmentNumber {
    SegmentNumber::try_from(n).expect("test segment numbers are in range")
}

fn ring(n: u8) -> Ring {
    Ring::try_from(n).expect("test ring numbers are in range")
}

fn offset(n: u32) -> WordOffset {
    WordOffset::try_from(n).expect("test offsets are in range")
}

fn bound(n: u16) -> Unsigned14Bit {
    Unsigned14Bit::try_from(n).expect("test bounds are in range")
}

/// A valid SDW with the given ring brackets, bound and access flags
/// (drawn from "REWPGC").
fn sdw(r1: u8, r2: u8, r3: u8, bound_blocks: u16, flags: &str) -> Sdw {
    Sdw {
        r1: ring(r1),
        r2: ring(r2),
        r3: ring(r3),
        f: true,
        bound: bound(bound_blocks),
        r: flags.contains('R'),
        e: flags.contains('E'),
        w: flags.contains('W'),
        p: flags.contains('P'),
        g: flags.contains('G'),
        c: flags.contains('C'),
        ..Sdw::default()
    }
}

struct Machine {
    apu: AppendingUnit,
    mem: MemoryUnit,
    layout: DescriptorSegmentBuilder,
}

impl Machine {
    fn with_config(paged_ds: bool, segments: u32, config: &AppendingUnitConfiguration) -> Machine {
        let mut mem = MemoryUnit::new(&MemoryConfiguration {
            size_words: MEMORY_WORDS,
        });
        let layout =
            DescriptorSegmentBuilder::new(&mut mem, paged_ds, DS_BASE, segments).expect(COMPLAIN);
        let mut apu = AppendingUnit::new(config);
        apu.load_dsbr(layout.dsbr_pair());
        Machine { apu, mem, layout }
    }

    fn new(paged_ds: bool) -> Machine {
        Machine::with_config(
            paged_ds,
            64,
            &AppendingUnitConfiguration {
                panic_on_fault: PanicOnFault::No,
                ..AppendingUnitConfiguration::default()
            },
        )
    }

    fn add(&mut self, segno: u16, template: &Sdw, paged: bool) -> Sdw {
        if paged {
            self.layout
                .add_paged_segment(&mut self.mem, seg(segno), template)
                .expect(COMPLAIN)
        } else {
            self.layout
                .add_unpaged_segment(&mut self.mem, seg(segno), template)
                .expect(COMPLAIN)
        }
    }

    fn install(&mut self, segno: u16, sdw: &Sdw) {
        self.layout
            .install_sdw(&mut self.mem, seg(segno), sdw)
            .expect(COMPLAIN);
    }

    /// Set the procedure's segment and ring and the target ring.
    fn set_rings(&mut self, psr: u16, prr: u8, trr: u8) {
        self.apu.regs.ppr.psr = seg(psr);
        self.apu.regs.ppr.prr = ring(prr);
        self.apu.regs.tpr.trr = ring(trr);
    }

    fn reference(
        &mut self,
        segno: u16,
        address: u32,
        cycle: CycleType,
    ) -> Result<AbsoluteAddress, Fault> {
        self.apu.regs.tpr.tsr = seg(segno);
        self.apu.translate(&mut self.mem, offset(address), cycle)
    }
}

fn assert_acv(result: Result<AbsoluteAddress, Fault>, expected: &[AcvSubfault]) {
    match result {
        Ok(a) => panic!("expected access violation {expected:?}, got address {a:o}"),
        Err(fault) => {
            let acv = fault
                .acv_subfaults()
                .unwrap_or_else(|| panic!("expected an access violation, got {fault}"));
            assert_eq!(acv.subfaults(), expected, "unexpected subfaults in {fault}");
        }
    }
}

#[test]
fn scenario_1_instruction_fetch() {
    let mut mem = MemoryUnit::new(&MemoryConfiguration {
        size_words: MEMORY_WORDS,
    });
    // Room for 8 segments gives a descriptor segment bound of 0.
    let layout = DescriptorSegmentBuilder::new(&mut mem, false, DS_BASE, 8).expect(COMPLAIN);
    assert_eq!(layout.dsbr().bound, Unsigned14Bit::ZERO);
    let descriptor = Sdw {
        addr: u24!(0o100_000),
        u: true,
        ..sdw(0, 0, 0, 0o377, "REW")
    };
    layout
        .install_sdw(&mut mem, seg(0), &descriptor)
        .expect(COMPLAIN);
    let mut apu = AppendingUnit::new(&AppendingUnitConfiguration::default());
    apu.load_dsbr(layout.dsbr_pair());
    apu.begin_instruction(Unsigned36Bit::ZERO, InstructionClass::Ordinary);
    assert_eq!(
        apu.translate(&mut mem, offset(0), CycleType::InstructionFetch),
        Ok(u24!(0o100_000))
    );
    assert_eq!(apu.fault_unit().last_fault(), None);
}

#[test]
fn scenario_2_read_bracket() {
    let mut m = Machine::new(false);
    let s = m.add(1, &sdw(2, 2, 2, 0o377, "REW"), false);
    m.set_rings(1, 5, 5);
    assert_acv(
        m.reference(1, 0o100, CycleType::OperandRead),
        &[AcvSubfault::OutsideReadBracket],
    );
    m.set_rings(1, 1, 1);
    assert_eq!(
        m.reference(1, 0o100, CycleType::OperandRead),
        Ok(s.addr.wrapping_add(u24!(0o100)))
    );
}

#[test]
fn scenario_3_out_of_bounds() {
    let mut m = Machine::new(false);
    let s = m.add(1, &sdw(0, 0, 0, 0, "REW"), false);
    m.set_rings(1, 0, 0);
    assert_acv(
        m.reference(1, 0o20, CycleType::OperandRead),
        &[AcvSubfault::OutOfSegmentBounds],
    );
    // The last word of the first 16-word block is within bounds.
    assert_eq!(
        m.reference(1, 0o17, CycleType::OperandRead),
        Ok(s.addr.wrapping_add(u24!(0o17)))
    );
}

#[test]
fn scenario_4_call_limiter() {
    let mut m = Machine::new(false);
    let gate = Sdw {
        cl: bound(0o100),
        ..sdw(0, 4, 5, 0o377, "RE")
    };
    let s = m.add(2, &gate, false);

    m.set_rings(1, 4, 4);
    m.apu
        .begin_instruction(Unsigned36Bit::ZERO, InstructionClass::Call6);
    assert_acv(
        m.reference(2, 0o100, CycleType::OperandRead),
        &[AcvSubfault::NotAGate],
    );
    assert_acv(
        m.reference(2, 0o200, CycleType::OperandRead),
        &[AcvSubfault::NotAGate],
    );

    m.set_rings(1, 4, 4);
    assert_eq!(
        m.reference(2, 0o77, CycleType::OperandRead),
        Ok(s.addr.wrapping_add(u24!(0o77)))
    );
}

#[test]
fn call_limiter_checks_the_pointer_register_offset() {
    let mut m = Machine::new(false);
    let gate = Sdw {
        cl: bound(0o100),
        ..sdw(0, 4, 5, 0o377, "RE")
    };
    m.add(2, &gate, false);
    m.set_rings(1, 4, 4);
    m.apu.regs.par[1] = crate::registers::PointerRegister {
        snr: seg(2),
        rnr: ring(4),
        wordno: offset(0o200),
        bitno: 0,
    };
    // call6 pr1|0: the instruction's own offset is within the limit,
    // but the entry point is not.
    m.apu
        .begin_instruction(pointer_instruction(1, 0), InstructionClass::Call6);
    let target = m.apu.resolve_pointer_register();
    assert_eq!(target.offset, offset(0o200));
    let result = m
        .apu
        .translate(&mut m.mem, target.offset, CycleType::OperandRead);
    assert_acv(result, &[AcvSubfault::NotAGate]);
}

#[test]
fn call_limiter_does_not_apply_to_gates_or_the_same_segment() {
    let mut m = Machine::new(false);
    let gated = Sdw {
        cl: bound(0o10),
        ..sdw(0, 4, 5, 0o377, "REG")
    };
    m.add(2, &gated, false);
    m.set_rings(1, 4, 4);
    m.apu
        .begin_instruction(Unsigned36Bit::ZERO, InstructionClass::Call6);
    assert!(m.reference(2, 0o200, CycleType::OperandRead).is_ok());

    let ungated = Sdw {
        cl: bound(0o10),
        ..sdw(0, 4, 5, 0o377, "RE")
    };
    m.add(3, &ungated, false);
    m.set_rings(3, 4, 4);
    assert!(m.reference(3, 0o200, CycleType::OperandRead).is_ok());
}

#[test]
fn call6_bracket_checks() {
    let mut m = Machine::new(false);
    m.add(2, &sdw(2, 4, 5, 0o377, "REG"), false);
    m.apu
        .begin_instruction(Unsigned36Bit::ZERO, InstructionClass::Call6);

    // Outside the call bracket.
    m.set_rings(1, 6, 6);
    assert_acv(
        m.reference(2, 0, CycleType::OperandRead),
        &[AcvSubfault::OutsideCallBracket],
    );

    // Outward call.
    m.set_rings(1, 1, 1);
    assert_acv(
        m.reference(2, 0, CycleType::OperandRead),
        &[AcvSubfault::OutwardCall],
    );

    // Bad outward call.
    m.set_rings(1, 2, 3);
    assert_acv(
        m.reference(2, 0, CycleType::OperandRead),
        &[AcvSubfault::BadOutwardCall],
    );

    // A call from ring 5 is made into ring R2.
    m.set_rings(1, 5, 5);
    assert!(m.reference(2, 0, CycleType::OperandRead).is_ok());
    assert_eq!(m.apu.regs.tpr.trr, ring(4));
}

#[test]
fn call6_to_non_executable_segment() {
    let mut m = Machine::new(false);
    m.add(2, &sdw(0, 4, 5, 0o377, "RG"), false);
    m.apu
        .begin_instruction(Unsigned36Bit::ZERO, InstructionClass::Call6);
    m.set_rings(1, 4, 4);
    assert_acv(
        m.reference(2, 0, CycleType::OperandRead),
        &[AcvSubfault::NoExecute],
    );
}

#[test]
fn transfer_checks() {
    let mut m = Machine::new(false);
    m.add(1, &sdw(1, 3, 5, 0o377, "RE"), false);
    m.add(2, &sdw(1, 3, 5, 0o377, "R"), false);
    m.apu
        .begin_instruction(Unsigned36Bit::ZERO, InstructionClass::Ordinary);

    m.set_rings(1, 2, 2);
    assert!(m.reference(1, 0, CycleType::InstructionFetch).is_ok());

    // Above and below the execute bracket.
    m.set_rings(1, 4, 4);
    assert_acv(
        m.reference(1, 0, CycleType::InstructionFetch),
        &[AcvSubfault::OutsideExecuteBracket],
    );
    m.set_rings(1, 0, 0);
    assert_acv(
        m.reference(1, 0, CycleType::InstructionFetch),
        &[AcvSubfault::OutsideExecuteBracket],
    );

    // A transfer may not change the ring.
    m.set_rings(1, 2, 3);
    assert_acv(
        m.reference(1, 0, CycleType::InstructionFetch),
        &[AcvSubfault::CrossRingTransfer],
    );

    m.set_rings(1, 2, 2);
    assert_acv(
        m.reference(2, 0, CycleType::InstructionFetch),
        &[AcvSubfault::NoExecute],
    );

    // The operand of a transfer instruction is checked the same way.
    m.apu
        .begin_instruction(Unsigned36Bit::ZERO, InstructionClass::Transfer);
    m.set_rings(1, 2, 2);
    assert_acv(
        m.reference(2, 0, CycleType::OperandRead),
        &[AcvSubfault::NoExecute],
    );
    assert!(m.reference(1, 0, CycleType::OperandRead).is_ok());
}

#[test]
fn ring_alarm() {
    let mut m = Machine::new(false);
    m.add(1, &sdw(0, 3, 5, 0o377, "RE"), false);
    m.set_rings(1, 2, 2);
    m.apu.regs.ralr = ring(2);

    m.apu
        .begin_instruction(Unsigned36Bit::ZERO, InstructionClass::Transfer);
    assert_acv(
        m.reference(1, 0, CycleType::OperandRead),
        &[AcvSubfault::RingAlarm],
    );
    // Instruction fetches are not checked.
    assert!(m.reference(1, 0, CycleType::InstructionFetch).is_ok());

    m.apu.regs.ralr = ring(3);
    assert!(m.reference(1, 0, CycleType::OperandRead).is_ok());
    m.apu.regs.ralr = Ring::ZERO;
    assert!(m.reference(1, 0, CycleType::OperandRead).is_ok());
}

#[test]
fn write_checks() {
    let mut m = Machine::new(false);
    m.add(1, &sdw(0, 2, 4, 0o377, "RW"), false);
    m.add(2, &sdw(0, 2, 4, 0o377, "R"), false);
    m.set_rings(1, 2, 2);
    for cycle in [
        CycleType::OperandStore,
        CycleType::EisOperandStore,
        CycleType::ApuDataStore,
    ] {
        assert!(m.reference(1, 0, cycle).is_ok());
        assert_acv(m.reference(2, 0, cycle), &[AcvSubfault::NoWrite]);
    }
    m.set_rings(1, 3, 3);
    assert_acv(
        m.reference(1, 0, CycleType::OperandStore),
        &[AcvSubfault::OutsideWriteBracket],
    );
    assert_acv(
        m.reference(2, 0, CycleType::OperandStore),
        &[AcvSubfault::OutsideWriteBracket, AcvSubfault::NoWrite],
    );
}

#[test]
fn read_permission_only_checked_for_other_segments() {
    let mut m = Machine::new(false);
    m.add(1, &sdw(0, 2, 4, 0o377, "E"), false);
    m.set_rings(1, 2, 2);
    // A procedure may read its own segment even without R.
    assert!(m.reference(1, 0, CycleType::OperandRead).is_ok());
    m.set_rings(3, 2, 2);
    assert_acv(
        m.reference(1, 0, CycleType::OperandRead),
        &[AcvSubfault::NoRead],
    );
}

#[test]
fn subfaults_accumulate_but_keep_the_last_message() {
    let mut m = Machine::new(false);
    m.add(1, &sdw(0, 2, 4, 0, "R"), false);
    m.set_rings(1, 3, 3);
    let fault = m
        .reference(1, 0o20, CycleType::OperandStore)
        .expect_err("reference should fault");
    let acv = fault.acv_subfaults().expect("fault should be ACV");
    assert_eq!(
        acv.subfaults(),
        vec![
            AcvSubfault::OutsideWriteBracket,
            AcvSubfault::NoWrite,
            AcvSubfault::OutOfSegmentBounds
        ]
    );
    assert_eq!(
        acv.message(),
        Some("offset is beyond the bound of the segment")
    );
    assert_eq!(
        m.apu.fault_unit().fault_register(),
        AcvSubfault::OutsideWriteBracket.bit()
            | AcvSubfault::NoWrite.bit()
            | AcvSubfault::OutOfSegmentBounds.bit()
    );
}

#[proptest]
fn ring_order_is_always_checked(
    #[strategy(0..8_u8)] r1: u8,
    #[strategy(0..8_u8)] r2: u8,
    #[strategy(0..8_u8)] r3: u8,
    cycle: CycleType,
    class: InstructionClass,
    paged: bool,
) {
    proptest::prop_assume!(r1 > r2 || r2 > r3);
    let mut m = Machine::new(false);
    // The bound is deliberately exceeded too; the ring order fault is
    // raised before the bound is checked.
    m.add(1, &sdw(r1, r2, r3, 0, "REWG"), paged);
    m.apu.begin_instruction(Unsigned36Bit::ZERO, class);
    m.set_rings(1, 0, 0);
    assert_acv(
        m.reference(1, 0o777_777, cycle),
        &[AcvSubfault::IllegalRingOrder],
    );
}

#[proptest]
fn bound_is_enforced(
    #[strategy(0..=0o377_u16)] bound_blocks: u16,
    #[strategy(0..=0o777_777_u32)] address: u32,
    paged: bool,
) {
    let mut m = Machine::new(false);
    m.add(1, &sdw(0, 0, 0, bound_blocks, "REW"), paged);
    m.set_rings(1, 0, 0);
    let result = m.reference(1, address, CycleType::OperandRead);
    if (address >> 4) <= u32::from(bound_blocks) {
        assert!(result.is_ok(), "{result:?}");
    } else {
        assert_acv(result, &[AcvSubfault::OutOfSegmentBounds]);
    }
}

#[proptest]
fn paging_is_transparent(
    #[strategy(0..0o4000_u32)] address: u32,
    store: bool,
    paged_ds: bool,
) {
    let mut m = Machine::new(paged_ds);
    let template = sdw(0, 0, 0, 0o377, "REW");
    let unpaged = m.add(1, &template, false);
    // Segment 2 uses the same storage as segment 1, through a page
    // table.
    let page_table = m.layout.allocate(4).expect(COMPLAIN);
    m.layout
        .map_pages(&mut m.mem, page_table, unpaged.addr, 4)
        .expect(COMPLAIN);
    m.install(
        2,
        &Sdw {
            addr: page_table,
            u: false,
            ..template
        },
    );
    m.set_rings(1, 0, 0);
    let cycle = if store {
        CycleType::OperandStore
    } else {
        CycleType::OperandRead
    };
    let direct = m.reference(1, address, cycle).expect("reference is valid");
    let via_pages = m.reference(2, address, cycle).expect("reference is valid");
    assert_eq!(direct, via_pages);
    assert_eq!(direct, unpaged.addr.wrapping_add(AbsoluteAddress::from(offset(address))));
}

#[test]
fn translation_is_idempotent() {
    let mut m = Machine::new(false);
    m.add(1, &sdw(0, 0, 0, 0o377, "REW"), true);
    m.add(2, &sdw(0, 0, 0, 0o377, "REW"), false);
    m.set_rings(1, 0, 0);
    let first = m.reference(1, 0o1234, CycleType::OperandRead);
    // Something else becomes the most recently used in between.
    m.reference(2, 0, CycleType::OperandRead)
        .expect("reference is valid");
    let before = m.apu.sdwam.peek(&seg(1));
    let second = m.reference(1, 0o1234, CycleType::OperandRead);
    assert!(first.is_ok());
    assert_eq!(first, second);
    assert_eq!(m.apu.sdwam.peek(&seg(1)), before);
    let entry = m
        .apu
        .sdwam_entries()
        .into_iter()
        .find(|e| e.valid && e.key == seg(1))
        .expect("segment 1 should be resident");
    assert_eq!(entry.use_count, 63);
}

#[test]
fn invalid_sdw_is_a_directed_fault() {
    let mut m = Machine::new(false);
    let missing = Sdw {
        f: false,
        fc: 2,
        ..sdw(0, 0, 0, 0o377, "REW")
    };
    m.install(5, &missing);
    m.set_rings(1, 0, 0);
    let fault = m
        .reference(5, 0, CycleType::OperandRead)
        .expect_err("SDW is not valid");
    assert_eq!(fault.kind(), FaultKind::DF2);
    assert!(matches!(
        fault.details,
        FaultDetails::Directed {
            descriptor: DescriptorKind::Sdw,
            ..
        }
    ));
    // An invalid SDW is not cached.
    assert_eq!(m.apu.sdwam.peek(&seg(5)), None);
}

#[test]
fn invalid_ptw_is_a_directed_fault() {
    let mut m = Machine::new(false);
    let s = m.add(1, &sdw(0, 0, 0, 0o3777, "REW"), true);
    // Invalidate page 1.
    let ptw_address = s.addr.wrapping_add(AbsoluteAddress::ONE);
    let missing = Ptw {
        f: false,
        fc: 1,
        ..Ptw::default()
    };
    m.mem
        .write_word(ptw_address, missing.to_word())
        .expect("address is mapped");
    m.set_rings(1, 0, 0);
    assert!(m.reference(1, 0o1777, CycleType::OperandRead).is_ok());
    let fault = m
        .reference(1, 0o2000, CycleType::OperandRead)
        .expect_err("PTW is not valid");
    assert_eq!(fault.kind(), FaultKind::DF1);
    assert!(matches!(
        fault.details,
        FaultDetails::Directed {
            descriptor: DescriptorKind::Ptw,
            ..
        }
    ));
}

#[test]
fn invalid_dsptw_is_a_directed_fault() {
    let mut m = Machine::new(true);
    m.add(1, &sdw(0, 0, 0, 0o377, "REW"), false);
    let missing = Ptw {
        f: false,
        fc: 3,
        ..Ptw::default()
    };
    m.mem
        .write_word(DS_BASE, missing.to_word())
        .expect("address is mapped");
    m.set_rings(1, 0, 0);
    let fault = m
        .reference(1, 0, CycleType::OperandRead)
        .expect_err("DSPTW is not valid");
    assert_eq!(fault.kind(), FaultKind::DF3);
    assert!(matches!(
        fault.details,
        FaultDetails::Directed {
            descriptor: DescriptorKind::DescriptorSegmentPtw,
            ..
        }
    ));
}

#[test]
fn dsptw_used_bit_is_set() {
    let mut m = Machine::new(true);
    m.add(1, &sdw(0, 0, 0, 0o377, "REW"), false);
    let dsptw = Ptw::from_word(m.mem.read_word(DS_BASE).expect("address is mapped"));
    assert!(!dsptw.u);
    m.set_rings(1, 0, 0);
    assert!(m.reference(1, 0, CycleType::OperandRead).is_ok());
    let dsptw = Ptw::from_word(m.mem.read_word(DS_BASE).expect("address is mapped"));
    assert!(dsptw.u);
    assert!(dsptw.f);
}

#[test]
fn ptw_modified_bit_is_set_by_stores() {
    let mut m = Machine::new(false);
    let s = m.add(1, &sdw(0, 0, 0, 0o377, "REW"), true);
    m.set_rings(1, 0, 0);
    let read_ptw = |m: &mut Machine| {
        Ptw::from_word(m.mem.read_word(s.addr).expect("address is mapped"))
    };

    assert!(m.reference(1, 0o10, CycleType::OperandRead).is_ok());
    assert!(!read_ptw(&mut m).m);
    assert!(m.reference(1, 0o10, CycleType::OperandStore).is_ok());
    assert!(read_ptw(&mut m).m);
    let key = crate::am::PtwKey::new(seg(1), offset(0o10));
    assert!(m.apu.ptwam.peek(&key).is_some_and(|ptw| ptw.m));

    // Once M is set in the cached PTW, memory is not written again.
    m.mem
        .write_word(s.addr, Ptw::default().to_word())
        .expect("address is mapped");
    assert!(m.reference(1, 0o10, CycleType::OperandStore).is_ok());
    assert_eq!(read_ptw(&mut m), Ptw::default());
}

#[test]
fn descriptor_segment_bound_is_checked() {
    let mut m = Machine::with_config(false, 8, &AppendingUnitConfiguration::default());
    m.set_rings(1, 0, 0);
    assert_acv(
        m.reference(8, 0, CycleType::OperandRead),
        &[AcvSubfault::OutOfSegmentBounds],
    );
}

#[test]
fn missing_memory_is_a_store_fault() {
    let mut m = Machine::new(false);
    let dsbr = crate::registers::Dsbr {
        addr: u24!(0o70_000_000),
        bound: bound(0o17),
        unpaged: true,
        stack: 0,
    };
    m.apu.load_dsbr(dsbr.to_word_pair());
    m.set_rings(1, 0, 0);
    let fault = m
        .reference(1, 0, CycleType::OperandRead)
        .expect_err("descriptor segment is not in memory");
    assert_eq!(fault.kind(), FaultKind::STR);
    assert_eq!(m.apu.fault_unit().fault_count(FaultKind::STR), 1);
}

#[test]
fn privilege_is_only_inherited_in_ring_0() {
    let mut m = Machine::new(false);
    m.add(1, &sdw(0, 4, 4, 0o377, "REP"), false);
    m.set_rings(1, 0, 0);
    assert!(m.reference(1, 0, CycleType::InstructionFetch).is_ok());
    assert!(m.apu.regs.ppr.p);
    m.set_rings(1, 1, 1);
    assert!(m.reference(1, 0, CycleType::InstructionFetch).is_ok());
    assert!(!m.apu.regs.ppr.p);

    // Indirect word fetches and data references leave PPR.P alone.
    m.apu.regs.ppr.p = true;
    assert!(m.reference(1, 0, CycleType::IndirectWordFetch).is_ok());
    assert!(m.reference(1, 0, CycleType::OperandRead).is_ok());
    assert!(m.apu.regs.ppr.p);

    // RTCD does change it.
    assert!(m.reference(1, 0, CycleType::RtcdOperandFetch).is_ok());
    assert!(!m.apu.regs.ppr.p);
}

#[test]
fn rsdwh_r1_is_recorded() {
    let mut m = Machine::new(false);
    m.add(1, &sdw(3, 4, 5, 0o377, "REW"), false);
    m.set_rings(1, 4, 4);
    assert!(m.reference(1, 0, CycleType::OperandRead).is_ok());
    assert_eq!(m.apu.rsdwh_r1(), ring(3));
}

#[test]
fn ldbr_and_cams_clear_the_associative_memories() {
    let mut m = Machine::new(false);
    m.add(1, &sdw(0, 0, 0, 0o377, "REW"), true);
    m.set_rings(1, 0, 0);
    assert!(m.reference(1, 0, CycleType::OperandRead).is_ok());
    assert!(m.apu.sdwam_entries().iter().any(|e| e.valid));
    assert!(m.apu.ptwam_entries().iter().any(|e| e.valid));

    m.apu.invalidate_page_cache();
    assert!(m.apu.ptwam_entries().iter().all(|e| !e.valid));
    assert!(m.apu.sdwam_entries().iter().any(|e| e.valid));
    m.apu.invalidate_segment_cache();
    assert!(m.apu.sdwam_entries().iter().all(|e| !e.valid));

    assert!(m.reference(1, 0, CycleType::OperandRead).is_ok());
    let pair = m.apu.store_dsbr();
    assert_eq!(pair, m.layout.dsbr_pair());
    m.apu.load_dsbr(pair);
    assert!(m.apu.sdwam_entries().iter().all(|e| !e.valid));
    assert!(m.apu.ptwam_entries().iter().all(|e| !e.valid));
}

#[test]
fn cams_makes_descriptor_changes_visible() {
    let mut m = Machine::new(false);
    let s = m.add(1, &sdw(0, 0, 0, 0o377, "REW"), false);
    m.set_rings(1, 0, 0);
    assert_eq!(m.reference(1, 0, CycleType::OperandRead), Ok(s.addr));
    let moved = Sdw {
        addr: s.addr.wrapping_add(u24!(0o10_000)),
        ..s
    };
    m.install(1, &moved);
    // The associative memory still holds the old descriptor.
    assert_eq!(m.reference(1, 0, CycleType::OperandRead), Ok(s.addr));
    m.apu.invalidate_segment_cache();
    assert_eq!(m.reference(1, 0, CycleType::OperandRead), Ok(moved.addr));
}

#[test]
fn disabled_associative_memories() {
    let config = AppendingUnitConfiguration {
        sdwam: AssociativeMemoryConfiguration { enabled: false },
        ptwam: AssociativeMemoryConfiguration { enabled: false },
        panic_on_fault: PanicOnFault::No,
    };
    let mut m = Machine::with_config(true, 64, &config);
    let a = m.add(1, &sdw(0, 0, 0, 0o377, "REW"), true);
    let b = m.add(2, &sdw(0, 0, 0, 0o377, "REW"), true);
    m.set_rings(1, 0, 0);
    let first_a = m.reference(1, 0o2345, CycleType::OperandRead);
    let first_b = m.reference(2, 0o2345, CycleType::OperandRead);
    assert_eq!(first_a, m.reference(1, 0o2345, CycleType::OperandRead));
    assert_ne!(first_a, first_b);
    assert!(first_a.is_ok() && first_b.is_ok());
    // Only slot 0 is ever used.
    assert!(m.apu.sdwam_entries()[1..].iter().all(|e| !e.valid));
    assert!(m.apu.ptwam_entries()[1..].iter().all(|e| !e.valid));
    assert_ne!(a.addr, b.addr);
}

#[test]
fn faults_carry_instruction_diagnostics() {
    let mut m = Machine::new(false);
    m.add(1, &sdw(0, 0, 0, 0, "REW"), false);
    m.apu.regs.ppr.ic = offset(0o4321);
    m.set_rings(1, 0, 0);
    m.apu
        .begin_instruction(u36!(0o123_456_000_000), InstructionClass::Ordinary);
    let fault = m
        .reference(1, 0o1000, CycleType::OperandRead)
        .expect_err("reference is out of bounds");
    assert_eq!(fault.diagnostics.instruction, u36!(0o123_456_000_000));
    assert_eq!(fault.diagnostics.segment, seg(1));
    assert_eq!(fault.diagnostics.instruction_address, offset(0o4321));
    assert_eq!(m.apu.fault_unit().last_fault(), Some(&fault));
    assert_eq!(m.apu.fault_unit().fault_count(FaultKind::ACV), 1);

    // Reset keeps the fault history; clearing it is separate.
    m.apu.reset();
    assert_eq!(m.apu.fault_unit().fault_count(FaultKind::ACV), 1);
    m.apu.fault_unit_mut().clear();
    assert_eq!(m.apu.fault_unit().last_fault(), None);
}

#[test]
fn reset_clears_state() {
    let mut m = Machine::new(false);
    m.add(1, &sdw(0, 3, 3, 0o377, "REW"), false);
    m.set_rings(1, 3, 3);
    assert!(m.reference(1, 0, CycleType::OperandRead).is_ok());
    assert_ne!(m.apu.regs, crate::registers::Registers::default());
    assert_ne!(m.apu.dsbr(), &crate::registers::Dsbr::default());
    assert!(m.apu.sdwam_entries().iter().any(|e| e.valid));
    m.apu.reset();
    assert_eq!(m.apu.regs, crate::registers::Registers::default());
    assert_eq!(m.apu.dsbr(), &crate::registers::Dsbr::default());
    assert!(m.apu.sdwam_entries().iter().all(|e| !e.valid));
}

fn pointer_instruction(pr: u8, pr_offset: u16) -> Unsigned36Bit {
    Unsigned36Bit::from_truncated((u64::from(pr) << 33) | (u64::from(pr_offset) << 18))
}

#[test]
fn pointer_register_offset_wraps() {
    let mut m = Machine::new(false);
    m.apu.regs.par[3] = crate::registers::PointerRegister {
        snr: seg(0o12),
        rnr: ring(2),
        wordno: offset(0o777_770),
        bitno: 5,
    };
    m.apu
        .begin_instruction(pointer_instruction(3, 0o20), InstructionClass::Ordinary);
    assert!(!m.apu.went_appending());
    let target = m.apu.resolve_pointer_register();
    assert_eq!(target.segment, seg(0o12));
    assert_eq!(target.offset, offset(0o10));
    assert_eq!(m.apu.regs.tpr.tbr, 5);
    assert!(m.apu.went_appending());

    // A negative offset.
    m.apu.regs.par[0].wordno = offset(0o100);
    m.apu
        .begin_instruction(pointer_instruction(0, 0o77_777), InstructionClass::Ordinary);
    assert!(!m.apu.went_appending());
    let target = m.apu.resolve_pointer_register();
    assert_eq!(target.offset, offset(0o77));
}

#[proptest]
fn pointer_register_ring_is_the_maximum(
    #[strategy(0..8_u8)] rnr: u8,
    #[strategy(0..8_u8)] trr: u8,
    #[strategy(0..8_u8)] prr: u8,
    #[strategy(0..8_u8)] pr: u8,
) {
    let mut apu = AppendingUnit::new(&AppendingUnitConfiguration::default());
    apu.regs.par[usize::from(pr)].rnr = ring(rnr);
    apu.regs.tpr.trr = ring(trr);
    apu.regs.ppr.prr = ring(prr);
    apu.begin_instruction(pointer_instruction(pr, 0), InstructionClass::Ordinary);
    let target = apu.resolve_pointer_register();
    let expected = ring(rnr.max(trr).max(prr));
    assert_eq!(target.ring, expected);
    assert_eq!(apu.regs.tpr.trr, expected);
}

#[test]
fn processors_have_separate_associative_memories() {
    let mut mem = MemoryUnit::new(&MemoryConfiguration {
        size_words: MEMORY_WORDS,
    });
    let mut layout = DescriptorSegmentBuilder::new(&mut mem, false, DS_BASE, 64).expect(COMPLAIN);
    let s = layout
        .add_unpaged_segment(&mut mem, seg(1), &sdw(0, 0, 0, 0o377, "REW"))
        .expect(COMPLAIN);
    let dsbr = layout.dsbr_pair();
    let shared = SharedMemory::new(mem);

    let translate_on_new_cpu = move |mut mem: SharedMemory| -> Result<AbsoluteAddress, Fault> {
        let mut apu = AppendingUnit::new(&AppendingUnitConfiguration::default());
        apu.load_dsbr(dsbr);
        apu.regs.tpr.tsr = seg(1);
        apu.translate(&mut mem, offset(0), CycleType::OperandRead)
    };

    // CPU A caches the descriptor.
    let mut mem_a = shared.clone();
    let mut cpu_a = AppendingUnit::new(&AppendingUnitConfiguration::default());
    cpu_a.load_dsbr(dsbr);
    cpu_a.regs.tpr.tsr = seg(1);
    assert_eq!(
        cpu_a.translate(&mut mem_a, offset(0), CycleType::OperandRead),
        Ok(s.addr)
    );

    // The segment moves.
    let moved = Sdw {
        addr: s.addr.wrapping_add(u24!(0o20_000)),
        ..s
    };
    shared
        .with_memory(|m| {
            layout
                .install_sdw(m, seg(1), &moved)
                .map_err(|_| crate::memory::MemoryOpFailure::NotMapped(DS_BASE))
        })
        .expect(COMPLAIN);

    // CPU B, on another thread, has nothing cached and sees the move.
    let mem_b = shared.clone();
    let b = thread::spawn(move || translate_on_new_cpu(mem_b))
        .join()
        .expect("thread should not panic");
    assert_eq!(b, Ok(moved.addr));

    // CPU A still uses its cached descriptor until it executes cams.
    assert_eq!(
        cpu_a.translate(&mut mem_a, offset(0), CycleType::OperandRead),
        Ok(s.addr)
    );
    cpu_a.invalidate_segment_cache();
    assert_eq!(
        cpu_a.translate(&mut mem_a, offset(0), CycleType::OperandRead),
        Ok(moved.addr)
    );
}
