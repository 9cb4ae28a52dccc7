//! Main memory as seen by the appending unit.
//!
//! Descriptor segments, page tables and the segments themselves all
//! live in main memory, which is addressed by 24-bit absolute
//! addresses.  The appending unit reads descriptors from it and
//! updates the "used" and "modified" bits of page table words in
//! place.
//!
//! In a multi-processor configuration main memory is shared while
//! each processor has its own associative memories.  [`SharedMemory`]
//! provides that sharing; each operation on it is atomic with respect
//! to the other processors.
use std::error;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{event, Level};

use base::prelude::*;

/// The largest main memory a 24-bit absolute address can reach.
pub const MAX_MEMORY_WORDS: u32 = 1 << 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemoryOpFailure {
    /// There is no memory at this absolute address.
    NotMapped(AbsoluteAddress),

    /// The memory could not be used at all (for example because
    /// another processor panicked while holding it).
    Unavailable(String),
}

impl Display for MemoryOpFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            MemoryOpFailure::NotMapped(addr) => {
                write!(f, "address {addr:>08o} is not mapped to functioning memory")
            }
            MemoryOpFailure::Unavailable(why) => {
                write!(f, "memory is unavailable: {why}")
            }
        }
    }
}

impl error::Error for MemoryOpFailure {}

/// Operations the appending unit performs on main memory.
pub trait MainMemory {
    /// Fetch a word.
    fn read_word(&mut self, addr: AbsoluteAddress) -> Result<Unsigned36Bit, MemoryOpFailure>;

    /// Fetch the even/odd word pair containing `addr`.  The even
    /// word is the more significant half of the result.
    fn read_word_pair(&mut self, addr: AbsoluteAddress) -> Result<Unsigned72Bit, MemoryOpFailure> {
        let even = addr.and(!1);
        let odd = even.wrapping_add(AbsoluteAddress::ONE);
        let e = self.read_word(even)?;
        let o = self.read_word(odd)?;
        Ok(join_pair(e, o))
    }

    /// Store a word.
    fn write_word(
        &mut self,
        addr: AbsoluteAddress,
        value: Unsigned36Bit,
    ) -> Result<(), MemoryOpFailure>;

    /// Set the bits of `mask` in the word at `addr` as a single
    /// read-modify-write operation, returning the previous value.
    fn set_bits(
        &mut self,
        addr: AbsoluteAddress,
        mask: Unsigned36Bit,
    ) -> Result<Unsigned36Bit, MemoryOpFailure> {
        let previous = self.read_word(addr)?;
        self.write_word(addr, previous | mask)?;
        Ok(previous)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryConfiguration {
    /// The number of words of main memory, starting at absolute
    /// address 0.
    pub size_words: u32,
}

impl Default for MemoryConfiguration {
    fn default() -> MemoryConfiguration {
        MemoryConfiguration {
            size_words: MAX_MEMORY_WORDS,
        }
    }
}

pub struct MemoryUnit {
    words: Vec<Unsigned36Bit>,
}

impl Debug for MemoryUnit {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        f.debug_struct("MemoryUnit")
            .field("size_words", &self.words.len())
            .finish()
    }
}

impl MemoryUnit {
    /// Create a memory unit with all words zero.  Sizes above
    /// [`MAX_MEMORY_WORDS`] are reduced to that.
    pub fn new(config: &MemoryConfiguration) -> MemoryUnit {
        let size = config.size_words.min(MAX_MEMORY_WORDS);
        event!(Level::DEBUG, "creating main memory of {size:o} words");
        MemoryUnit {
            words: vec![Unsigned36Bit::ZERO; size as usize],
        }
    }

    pub fn size_words(&self) -> u32 {
        // Cannot truncate, since new() limits the size.
        self.words.len() as u32
    }

    fn index(&self, addr: AbsoluteAddress) -> Result<usize, MemoryOpFailure> {
        let i = usize::from(addr);
        if i < self.words.len() {
            Ok(i)
        } else {
            Err(MemoryOpFailure::NotMapped(addr))
        }
    }

    /// Store consecutive words starting at `start`.
    pub fn load(
        &mut self,
        start: AbsoluteAddress,
        words: &[Unsigned36Bit],
    ) -> Result<(), MemoryOpFailure> {
        let mut addr = start;
        for w in words {
            self.write_word(addr, *w)?;
            addr = addr.wrapping_add(AbsoluteAddress::ONE);
        }
        Ok(())
    }
}

impl MainMemory for MemoryUnit {
    fn read_word(&mut self, addr: AbsoluteAddress) -> Result<Unsigned36Bit, MemoryOpFailure> {
        let i = self.index(addr)?;
        Ok(self.words[i])
    }

    fn write_word(
        &mut self,
        addr: AbsoluteAddress,
        value: Unsigned36Bit,
    ) -> Result<(), MemoryOpFailure> {
        let i = self.index(addr)?;
        self.words[i] = value;
        Ok(())
    }
}

/// A handle on main memory which several processors (threads) can
/// use at once.  Cloning the handle does not copy the memory.
#[derive(Debug, Clone)]
pub struct SharedMemory {
    inner: Arc<Mutex<MemoryUnit>>,
}

impl SharedMemory {
    pub fn new(memory: MemoryUnit) -> SharedMemory {
        SharedMemory {
            inner: Arc::new(Mutex::new(memory)),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryUnit>, MemoryOpFailure> {
        self.inner
            .lock()
            .map_err(|e| MemoryOpFailure::Unavailable(e.to_string()))
    }

    /// Run `f` with exclusive access to the memory.
    pub fn with_memory<T, F>(&self, f: F) -> Result<T, MemoryOpFailure>
    where
        F: FnOnce(&mut MemoryUnit) -> Result<T, MemoryOpFailure>,
    {
        let mut guard = self.lock()?;
        f(&mut guard)
    }
}

impl MainMemory for SharedMemory {
    fn read_word(&mut self, addr: AbsoluteAddress) -> Result<Unsigned36Bit, MemoryOpFailure> {
        self.lock()?.read_word(addr)
    }

    // The pair is read under one lock so that another processor
    // cannot update it between the two halves.
    fn read_word_pair(&mut self, addr: AbsoluteAddress) -> Result<Unsigned72Bit, MemoryOpFailure> {
        self.lock()?.read_word_pair(addr)
    }

    fn write_word(
        &mut self,
        addr: AbsoluteAddress,
        value: Unsigned36Bit,
    ) -> Result<(), MemoryOpFailure> {
        self.lock()?.write_word(addr, value)
    }

    fn set_bits(
        &mut self,
        addr: AbsoluteAddress,
        mask: Unsigned36Bit,
    ) -> Result<Unsigned36Bit, MemoryOpFailure> {
        self.lock()?.set_bits(addr, mask)
    }
}
