//! The associative memories (SDWAM and PTWAM).
//!
//! Each processor has one 64-slot associative memory holding
//! recently used segment descriptors and another holding recently
//! used page table words.  Replacement is true LRU: the `USE` fields
//! of the 64 slots always hold a permutation of 0..=63, with 63
//! marking the most recently used slot and 0 the next victim.
use std::fmt::Debug;

use serde::Serialize;
use tracing::{event, Level};

use base::prelude::*;

use super::descriptor::{Ptw, Sdw};

/// The number of slots in each associative memory.
pub const AM_SLOTS: usize = 64;

const MOST_RECENT: u8 = (AM_SLOTS - 1) as u8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssociativeMemoryConfiguration {
    /// When false the associative memory is switched off: lookups
    /// always miss and every fill uses slot 0.
    pub enabled: bool,
}

impl Default for AssociativeMemoryConfiguration {
    fn default() -> AssociativeMemoryConfiguration {
        AssociativeMemoryConfiguration { enabled: true }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Slot<K, E> {
    valid: bool,
    key: K,
    entry: E,
    use_count: u8,
}

/// A report of the state of one slot, for diagnostic displays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AmEntryStatus<K> {
    pub slot: usize,
    pub key: K,
    pub use_count: u8,
    pub valid: bool,
}

/// A 64-slot associative memory mapping keys of type `K` to entries
/// of type `E`.
#[derive(Debug, Clone)]
pub struct AssociativeMemory<K, E> {
    enabled: bool,
    slots: [Slot<K, E>; AM_SLOTS],
}

impl<K, E> AssociativeMemory<K, E>
where
    K: Copy + Default + PartialEq + Debug,
    E: Copy + Default,
{
    pub fn new(config: &AssociativeMemoryConfiguration) -> AssociativeMemory<K, E> {
        let mut am = AssociativeMemory {
            enabled: config.enabled,
            slots: [Slot::default(); AM_SLOTS],
        };
        am.invalidate_all();
        am
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Switch the associative memory on or off.  The contents are
    /// invalidated either way.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        self.invalidate_all();
    }

    /// Mark every slot invalid and reset the LRU order so that slot
    /// `i` has `USE == i`.
    pub fn invalidate_all(&mut self) {
        for (i, slot) in self.slots.iter_mut().enumerate() {
            slot.valid = false;
            // AM_SLOTS fits in a u8.
            slot.use_count = i as u8;
        }
    }

    fn find(&self, key: &K) -> Option<usize> {
        self.slots
            .iter()
            .position(|slot| slot.valid && slot.key == *key)
    }

    /// Look up `key`.  A hit makes the entry the most recently used.
    pub fn lookup(&mut self, key: &K) -> Option<E> {
        if !self.enabled {
            return None;
        }
        match self.find(key) {
            Some(hit) => {
                let hit_use = self.slots[hit].use_count;
                for slot in self.slots.iter_mut() {
                    if slot.use_count > hit_use {
                        slot.use_count -= 1;
                    }
                }
                self.slots[hit].use_count = MOST_RECENT;
                event!(Level::TRACE, "associative memory hit for {key:?} in slot {hit}");
                Some(self.slots[hit].entry)
            }
            None => {
                event!(Level::TRACE, "associative memory miss for {key:?}");
                None
            }
        }
    }

    /// Return the entry for `key`, if present, without changing the
    /// LRU order.
    pub fn peek(&self, key: &K) -> Option<E> {
        if !self.enabled {
            return None;
        }
        self.find(key).map(|i| self.slots[i].entry)
    }

    /// Install `entry` for `key` in the least recently used slot,
    /// which then becomes the most recently used.  Returns the slot
    /// used.
    pub fn load(&mut self, key: K, entry: E) -> usize {
        if !self.enabled {
            self.slots[0] = Slot {
                valid: true,
                key,
                entry,
                use_count: 0,
            };
            return 0;
        }
        // At most one valid slot per key.
        for slot in self.slots.iter_mut() {
            if slot.valid && slot.key == key {
                slot.valid = false;
            }
        }
        let victim = self
            .slots
            .iter()
            .position(|slot| slot.use_count == 0)
            .unwrap_or_else(|| unreachable!("USE fields are always a permutation of 0..=63"));
        self.slots[victim] = Slot {
            valid: true,
            key,
            entry,
            use_count: 0,
        };
        for slot in self.slots.iter_mut() {
            slot.use_count = slot.use_count.wrapping_sub(1) & MOST_RECENT;
        }
        event!(Level::TRACE, "associative memory loaded {key:?} into slot {victim}");
        victim
    }

    /// Replace the entry for `key` if it is resident, without
    /// changing the LRU order.  Returns whether it was resident.
    pub fn update(&mut self, key: &K, entry: E) -> bool {
        match self.find(key) {
            Some(i) => {
                self.slots[i].entry = entry;
                true
            }
            None => false,
        }
    }

    pub fn entries(&self) -> Vec<AmEntryStatus<K>> {
        self.slots
            .iter()
            .enumerate()
            .map(|(i, slot)| AmEntryStatus {
                slot: i,
                key: slot.key,
                use_count: slot.use_count,
                valid: slot.valid,
            })
            .collect()
    }
}

/// The SDW associative memory, keyed on segment number.
pub type SdwAm = AssociativeMemory<SegmentNumber, Sdw>;

/// The key of the PTW associative memory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct PtwKey {
    pub segment: SegmentNumber,
    /// Page number within the segment (the offset divided by 1024).
    pub page: u8,
}

impl PtwKey {
    pub fn new(segment: SegmentNumber, offset: WordOffset) -> PtwKey {
        PtwKey {
            segment,
            // An 18-bit offset has an 8-bit page number.
            page: (u32::from(offset) / PAGE_SIZE) as u8,
        }
    }
}

/// The PTW associative memory, keyed on segment and page number.
pub type PtwAm = AssociativeMemory<PtwKey, Ptw>;

#[cfg(test)]
mod tests {
    use super::*;
    use test_strategy::proptest;

    fn seg(n: u16) -> SegmentNumber {
        SegmentNumber::try_from(n).expect("test segment numbers are in range")
    }

    fn sdw_with_bound(n: u16) -> Sdw {
        Sdw {
            bound: Unsigned14Bit::try_from(n).expect("test bounds are in range"),
            f: true,
            ..Sdw::default()
        }
    }

    fn enabled_am() -> SdwAm {
        SdwAm::new(&AssociativeMemoryConfiguration::default())
    }

    fn use_counts_are_a_permutation(am: &SdwAm) -> bool {
        let mut seen = [false; AM_SLOTS];
        for e in am.entries() {
            let u = usize::from(e.use_count);
            if u >= AM_SLOTS || seen[u] {
                return false;
            }
            seen[u] = true;
        }
        true
    }

    #[test]
    fn empty_am_misses() {
        let mut am = enabled_am();
        assert_eq!(am.lookup(&seg(0)), None);
        assert!(am.entries().iter().all(|e| !e.valid));
        assert!(am
            .entries()
            .iter()
            .all(|e| usize::from(e.use_count) == e.slot));
    }

    #[test]
    fn load_then_hit() {
        let mut am = enabled_am();
        let slot = am.load(seg(5), sdw_with_bound(5));
        assert_eq!(slot, 0);
        assert_eq!(am.entries()[0].use_count, MOST_RECENT);
        assert_eq!(am.lookup(&seg(5)), Some(sdw_with_bound(5)));
        assert_eq!(am.lookup(&seg(6)), None);
        assert!(use_counts_are_a_permutation(&am));
    }

    #[test]
    fn reloading_a_key_leaves_one_valid_entry() {
        let mut am = enabled_am();
        am.load(seg(5), sdw_with_bound(1));
        am.load(seg(5), sdw_with_bound(2));
        let valid: Vec<_> = am
            .entries()
            .into_iter()
            .filter(|e| e.valid && e.key == seg(5))
            .collect();
        assert_eq!(valid.len(), 1);
        assert_eq!(am.lookup(&seg(5)), Some(sdw_with_bound(2)));
    }

    #[test]
    fn lru_victim_after_64_loads() {
        let mut am = enabled_am();
        for n in 0..64 {
            am.load(seg(n), sdw_with_bound(n));
        }
        assert!(use_counts_are_a_permutation(&am));
        // Segment 0 was loaded first, so it is the next victim unless
        // referenced again.
        assert!(am.lookup(&seg(0)).is_some());
        am.load(seg(100), sdw_with_bound(100));
        assert!(am.peek(&seg(0)).is_some());
        assert!(am.peek(&seg(1)).is_none());
        assert!(am.peek(&seg(100)).is_some());
        assert!(use_counts_are_a_permutation(&am));
    }

    #[proptest]
    fn hit_entry_is_never_evicted(#[strategy(0..64_u16)] hit: u16) {
        let mut am = enabled_am();
        for n in 0..64 {
            am.load(seg(n), sdw_with_bound(n));
        }
        assert!(am.lookup(&seg(hit)).is_some());
        am.load(seg(1000), sdw_with_bound(1000));
        // The least recently referenced entry is segment 0, unless
        // that was the one just hit, in which case it is segment 1.
        let expected_victim = if hit == 0 { 1 } else { 0 };
        assert!(am.peek(&seg(hit)).is_some());
        assert!(am.peek(&seg(expected_victim)).is_none());
        for n in 0..64 {
            if n != expected_victim {
                assert!(am.peek(&seg(n)).is_some(), "segment {n} was evicted");
            }
        }
        assert!(use_counts_are_a_permutation(&am));
    }

    #[proptest]
    fn use_counts_stay_a_permutation(
        #[strategy(proptest::collection::vec((0..80_u16, proptest::bool::ANY), 0..200))]
        ops: Vec<(u16, bool)>,
    ) {
        let mut am = enabled_am();
        for (n, is_load) in ops {
            if is_load {
                am.load(seg(n), sdw_with_bound(n));
            } else {
                am.lookup(&seg(n));
            }
            assert!(use_counts_are_a_permutation(&am));
        }
    }

    #[test]
    fn invalidate_all_resets() {
        let mut am = enabled_am();
        for n in 0..10 {
            am.load(seg(n), sdw_with_bound(n));
        }
        am.invalidate_all();
        for n in 0..10 {
            assert_eq!(am.lookup(&seg(n)), None);
        }
        assert!(am
            .entries()
            .iter()
            .all(|e| !e.valid && usize::from(e.use_count) == e.slot));
    }

    #[test]
    fn disabled_am_always_misses() {
        let mut am = SdwAm::new(&AssociativeMemoryConfiguration { enabled: false });
        assert_eq!(am.load(seg(3), sdw_with_bound(3)), 0);
        assert_eq!(am.load(seg(4), sdw_with_bound(4)), 0);
        assert_eq!(am.lookup(&seg(4)), None);
        assert_eq!(am.entries()[0].key, seg(4));
        am.set_enabled(true);
        assert!(am.is_enabled());
        assert_eq!(am.lookup(&seg(4)), None);
    }

    #[test]
    fn update_keeps_order() {
        let mut am = enabled_am();
        am.load(seg(1), sdw_with_bound(1));
        am.load(seg(2), sdw_with_bound(2));
        let before: Vec<u8> = am.entries().iter().map(|e| e.use_count).collect();
        assert!(am.update(&seg(1), sdw_with_bound(7)));
        assert!(!am.update(&seg(3), sdw_with_bound(7)));
        let after: Vec<u8> = am.entries().iter().map(|e| e.use_count).collect();
        assert_eq!(before, after);
        assert_eq!(am.peek(&seg(1)), Some(sdw_with_bound(7)));
    }

    #[test]
    fn ptw_key_page() {
        let key = PtwKey::new(seg(3), u18!(0o777_777));
        assert_eq!(key.page, 255);
        let key = PtwKey::new(seg(3), u18!(1023));
        assert_eq!(key.page, 0);
        let key = PtwKey::new(seg(3), u18!(1024));
        assert_eq!(key.page, 1);
    }
}
