//! Building descriptor segments and page tables in main memory.
//!
//! The operating system normally does this.  The emulator needs to do
//! it for the probe program and for tests, which is why this lives in
//! the library.
use std::error;
use std::fmt::{self, Display, Formatter};

use tracing::{event, Level};

use base::prelude::*;

use super::descriptor::{Ptw, Sdw};
use super::memory::{MainMemory, MemoryOpFailure};
use super::registers::Dsbr;

/// Page frames and page tables are aligned to this many words.
const FRAME_ALIGNMENT: u32 = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutError {
    /// The descriptor segment has no room for this segment number.
    SegmentOutOfRange(SegmentNumber),
    /// There is not enough address space for the allocation.
    AddressSpaceExhausted { words: u32 },
    Memory(MemoryOpFailure),
}

impl Display for LayoutError {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            LayoutError::SegmentOutOfRange(segno) => {
                write!(f, "segment {segno:>05o} is beyond the end of the descriptor segment")
            }
            LayoutError::AddressSpaceExhausted { words } => {
                write!(f, "no room for {words:o} more words in absolute memory")
            }
            LayoutError::Memory(e) => write!(f, "{e}"),
        }
    }
}

impl error::Error for LayoutError {}

impl From<MemoryOpFailure> for LayoutError {
    fn from(e: MemoryOpFailure) -> LayoutError {
        LayoutError::Memory(e)
    }
}

/// Lays out a descriptor segment, and the segments it describes, in
/// main memory.  Storage is allocated upwards from the base address
/// given to [`DescriptorSegmentBuilder::new`].
#[derive(Debug)]
pub struct DescriptorSegmentBuilder {
    dsbr: Dsbr,
    /// When the descriptor segment is paged, the address of each of
    /// its pages.
    ds_pages: Vec<AbsoluteAddress>,
    next_free: u32,
}

fn round_up(n: u32, multiple: u32) -> u32 {
    n.div_ceil(multiple) * multiple
}

impl DescriptorSegmentBuilder {
    /// Create a descriptor segment with room for segments
    /// `0..segments`.  When `paged` is set, the descriptor segment
    /// itself is paged.  The DSPTWs are created with `U` clear.
    pub fn new<M: MainMemory>(
        mem: &mut M,
        paged: bool,
        base: AbsoluteAddress,
        segments: u32,
    ) -> Result<DescriptorSegmentBuilder, LayoutError> {
        let ds_words = round_up(2 * segments.max(1), 16);
        let bound = Unsigned14Bit::try_from(ds_words / 16 - 1)
            .map_err(|_| LayoutError::AddressSpaceExhausted { words: ds_words })?;
        let mut builder = DescriptorSegmentBuilder {
            dsbr: Dsbr {
                addr: base,
                bound,
                unpaged: !paged,
                stack: 0,
            },
            ds_pages: Vec::new(),
            next_free: u32::from(base),
        };
        if paged {
            let pages = ds_words.div_ceil(PAGE_SIZE);
            let page_table = builder.allocate(pages)?;
            for page in 0..pages {
                let frame = builder.allocate(PAGE_SIZE)?;
                let dsptw = Ptw {
                    addr: WordOffset::from_truncated(u32::from(frame) / FRAME_ALIGNMENT),
                    f: true,
                    ..Ptw::default()
                };
                mem.write_word(
                    page_table.wrapping_add(AbsoluteAddress::from_truncated(page)),
                    dsptw.to_word(),
                )?;
                builder.ds_pages.push(frame);
            }
        } else {
            builder.allocate(ds_words)?;
        }
        event!(
            Level::DEBUG,
            "laid out descriptor segment for {} segments: {}",
            segments,
            builder.dsbr
        );
        Ok(builder)
    }

    pub fn dsbr(&self) -> &Dsbr {
        &self.dsbr
    }

    /// The operand for `ldbr` which selects this descriptor segment.
    pub fn dsbr_pair(&self) -> Unsigned72Bit {
        self.dsbr.to_word_pair()
    }

    /// Allocate `words` words of absolute memory, aligned for use as
    /// a page frame or page table.
    pub fn allocate(&mut self, words: u32) -> Result<AbsoluteAddress, LayoutError> {
        let start = round_up(self.next_free, FRAME_ALIGNMENT);
        let end = start
            .checked_add(words)
            .filter(|end| *end <= 1 << 24)
            .ok_or(LayoutError::AddressSpaceExhausted { words })?;
        self.next_free = end;
        Ok(AbsoluteAddress::from_truncated(start))
    }

    /// The absolute address at which the SDW of `segno` is stored.
    pub fn sdw_address(&self, segno: SegmentNumber) -> Result<AbsoluteAddress, LayoutError> {
        let offset = 2 * u32::from(segno);
        if offset >= self.dsbr.size_words() {
            return Err(LayoutError::SegmentOutOfRange(segno));
        }
        if self.dsbr.unpaged {
            Ok(self
                .dsbr
                .addr
                .wrapping_add(AbsoluteAddress::from_truncated(offset)))
        } else {
            let page = (offset / PAGE_SIZE) as usize;
            self.ds_pages
                .get(page)
                .map(|frame| {
                    frame.wrapping_add(AbsoluteAddress::from_truncated(offset % PAGE_SIZE))
                })
                .ok_or(LayoutError::SegmentOutOfRange(segno))
        }
    }

    /// Store `sdw` as the descriptor of `segno`, exactly as given.
    pub fn install_sdw<M: MainMemory>(
        &self,
        mem: &mut M,
        segno: SegmentNumber,
        sdw: &Sdw,
    ) -> Result<(), LayoutError> {
        let (even, odd) = split_pair(sdw.to_word_pair());
        let address = self.sdw_address(segno)?;
        mem.write_word(address, even)?;
        mem.write_word(address.wrapping_add(AbsoluteAddress::ONE), odd)?;
        Ok(())
    }

    /// The number of words a segment with this SDW's bound occupies.
    fn segment_words(sdw: &Sdw) -> u32 {
        16 * (u32::from(sdw.bound) + 1)
    }

    /// Allocate storage for an unpaged segment and install its SDW,
    /// which is returned.  The `ADDR` and `U` fields of `template`
    /// are replaced.
    pub fn add_unpaged_segment<M: MainMemory>(
        &mut self,
        mem: &mut M,
        segno: SegmentNumber,
        template: &Sdw,
    ) -> Result<Sdw, LayoutError> {
        let base = self.allocate(Self::segment_words(template))?;
        let sdw = Sdw {
            addr: base,
            u: true,
            ..*template
        };
        self.install_sdw(mem, segno, &sdw)?;
        Ok(sdw)
    }

    /// Allocate a page table and contiguous page frames for a paged
    /// segment and install its SDW, which is returned.  The `ADDR`
    /// and `U` fields of `template` are replaced.
    pub fn add_paged_segment<M: MainMemory>(
        &mut self,
        mem: &mut M,
        segno: SegmentNumber,
        template: &Sdw,
    ) -> Result<Sdw, LayoutError> {
        let words = Self::segment_words(template);
        let pages = words.div_ceil(PAGE_SIZE);
        let page_table = self.allocate(pages)?;
        let storage = self.allocate(pages * PAGE_SIZE)?;
        self.map_pages(mem, page_table, storage, pages)?;
        let sdw = Sdw {
            addr: page_table,
            u: false,
            ..*template
        };
        self.install_sdw(mem, segno, &sdw)?;
        Ok(sdw)
    }

    /// Write a page table at `page_table` mapping `pages` pages onto
    /// the contiguous storage at `storage`, which must be aligned to
    /// 64 words.
    pub fn map_pages<M: MainMemory>(
        &self,
        mem: &mut M,
        page_table: AbsoluteAddress,
        storage: AbsoluteAddress,
        pages: u32,
    ) -> Result<(), LayoutError> {
        for page in 0..pages {
            let frame = u32::from(storage) + page * PAGE_SIZE;
            let ptw = Ptw {
                addr: WordOffset::from_truncated(frame / FRAME_ALIGNMENT),
                f: true,
                ..Ptw::default()
            };
            mem.write_word(
                page_table.wrapping_add(AbsoluteAddress::from_truncated(page)),
                ptw.to_word(),
            )?;
        }
        Ok(())
    }
}
