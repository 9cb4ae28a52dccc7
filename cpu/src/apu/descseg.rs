//! Fetching segment descriptors from the descriptor segment.
//!
//! When the DSBR says the descriptor segment is unpaged, the SDW for
//! segment `n` is the word pair at `DSBR.ADDR + 2n`.  Otherwise
//! `DSBR.ADDR` locates the page table of the descriptor segment, and
//! the SDW is found in two steps: first the page table word for the
//! page holding the SDW (the DSPTW), then the SDW within that page
//! (the PSDW).
use tracing::{event, Level};

use base::prelude::*;

use super::AppendingUnit;
use crate::descriptor::{Ptw, Sdw};
use crate::fault::{AcvFaults, AcvSubfault, DescriptorKind, Fault, FaultDetails, FaultKind};
use crate::memory::MainMemory;

fn offset_by(base: AbsoluteAddress, offset: u32) -> AbsoluteAddress {
    base.wrapping_add(AbsoluteAddress::from_truncated(offset))
}

impl AppendingUnit {
    /// Find the SDW for `segno`, from the SDW associative memory if
    /// possible and otherwise from the descriptor segment.  A
    /// descriptor fetched from memory is loaded into the SDW
    /// associative memory.
    pub(super) fn acquire_sdw<M: MainMemory>(
        &mut self,
        mem: &mut M,
        segno: SegmentNumber,
    ) -> Result<Sdw, Fault> {
        if let Some(sdw) = self.sdwam.lookup(&segno) {
            return Ok(sdw);
        }
        let sdw = self.fetch_sdw(mem, segno)?;
        self.sdwam.load(segno, sdw);
        Ok(sdw)
    }

    fn fetch_sdw<M: MainMemory>(&mut self, mem: &mut M, segno: SegmentNumber) -> Result<Sdw, Fault> {
        self.check_descriptor_segment_bound(segno)?;
        let (sdw, address) = if self.dsbr.unpaged {
            self.fetch_nsdw(mem, segno)?
        } else {
            let dsptw = self.fetch_dsptw(mem, segno)?;
            self.fetch_psdw(mem, &dsptw, segno)?
        };
        event!(
            Level::DEBUG,
            "fetched SDW for segment {:>05o} from {:>08o}: {}",
            segno,
            address,
            sdw
        );
        if !sdw.f {
            return Err(self.raise(FaultDetails::Directed {
                kind: FaultKind::directed(sdw.fc),
                descriptor: DescriptorKind::Sdw,
                segment: segno,
                address,
            }));
        }
        Ok(sdw)
    }

    /// The SDW of `segno` must lie within the bound of the descriptor
    /// segment.
    fn check_descriptor_segment_bound(&mut self, segno: SegmentNumber) -> Result<(), Fault> {
        let sdw_offset = 2 * u32::from(segno);
        if sdw_offset < self.dsbr.size_words() {
            Ok(())
        } else {
            let mut acv = AcvFaults::default();
            acv.set(
                AcvSubfault::OutOfSegmentBounds,
                "segment number is beyond the bound of the descriptor segment",
            );
            Err(self.access_violation(acv))
        }
    }

    /// Fetch an SDW from an unpaged descriptor segment.
    fn fetch_nsdw<M: MainMemory>(
        &mut self,
        mem: &mut M,
        segno: SegmentNumber,
    ) -> Result<(Sdw, AbsoluteAddress), Fault> {
        let address = offset_by(self.dsbr.addr, 2 * u32::from(segno));
        let pair = mem
            .read_word_pair(address)
            .map_err(|e| self.store_fault(e))?;
        Ok((Sdw::from_word_pair(pair), address))
    }

    /// Fetch the page table word of the descriptor segment which
    /// describes the page holding the SDW of `segno`.  The first use
    /// of the page sets its `U` bit.
    fn fetch_dsptw<M: MainMemory>(&mut self, mem: &mut M, segno: SegmentNumber) -> Result<Ptw, Fault> {
        let address = offset_by(self.dsbr.addr, (2 * u32::from(segno)) / PAGE_SIZE);
        let word = mem.read_word(address).map_err(|e| self.store_fault(e))?;
        let mut ptw = Ptw::from_word(word);
        event!(
            Level::DEBUG,
            "fetched descriptor segment {} from {:>08o}",
            ptw,
            address
        );
        if !ptw.f {
            return Err(self.raise(FaultDetails::Directed {
                kind: FaultKind::directed(ptw.fc),
                descriptor: DescriptorKind::DescriptorSegmentPtw,
                segment: segno,
                address,
            }));
        }
        if !ptw.u {
            self.modify_dsptw(mem, address)?;
            ptw.u = true;
        }
        Ok(ptw)
    }

    fn modify_dsptw<M: MainMemory>(
        &mut self,
        mem: &mut M,
        address: AbsoluteAddress,
    ) -> Result<(), Fault> {
        event!(Level::TRACE, "setting U in descriptor segment PTW at {:>08o}", address);
        mem.set_bits(address, Ptw::used_mask())
            .map(|_| ())
            .map_err(|e| self.store_fault(e))
    }

    /// Fetch an SDW from a page of a paged descriptor segment.
    fn fetch_psdw<M: MainMemory>(
        &mut self,
        mem: &mut M,
        dsptw: &Ptw,
        segno: SegmentNumber,
    ) -> Result<(Sdw, AbsoluteAddress), Fault> {
        let address = offset_by(dsptw.frame_address(), (2 * u32::from(segno)) % PAGE_SIZE);
        let pair = mem
            .read_word_pair(address)
            .map_err(|e| self.store_fault(e))?;
        Ok((Sdw::from_word_pair(pair), address))
    }
}
