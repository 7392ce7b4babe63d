//! The sector map: a manually managed linked list over `u16` slot indices.
//!
//! One slot per media sector. A slot holds the next sector of the owning
//! file's chain, its own index while it is the chain tail, or `SECTOR_FREE`.
//! A sector belongs to at most one file; chains only grow from their tail, so
//! cycles cannot form under normal allocation.

use crate::layout::MAX_MAP_SLOTS;
use crate::{Error, SECTOR_SIZE};

pub(crate) const SECTOR_FREE: u16 = 0xffff;

pub(crate) struct SectorMap {
    slots: [u16; MAX_MAP_SLOTS],
    count: usize,
}

impl SectorMap {
    pub(crate) fn new(count: usize) -> Self {
        Self {
            slots: [SECTOR_FREE; MAX_MAP_SLOTS],
            count: count.min(MAX_MAP_SLOTS),
        }
    }

    /// Deserializes one region chunk read at `byte_offset` within the map
    /// region, the mirror image of [`SectorMap::store`].
    pub(crate) fn load(&mut self, byte_offset: usize, raw: &[u8]) {
        let first = byte_offset / 2;
        for idx in first..(first + raw.len() / 2).min(self.count) {
            let at = idx * 2 - byte_offset;
            self.slots[idx] = u16::from_le_bytes([raw[at], raw[at + 1]]);
        }
    }

    /// Serializes slots overlapping `out`, one region sector at a time.
    /// `byte_offset` is the position of `out` within the map region; slots
    /// past `count` encode as erased bytes.
    pub(crate) fn store(&self, byte_offset: usize, out: &mut [u8]) {
        out.fill(0xff);
        let first = byte_offset / 2;
        for idx in first..(first + out.len() / 2).min(self.count) {
            let at = idx * 2 - byte_offset;
            out[at..at + 2].copy_from_slice(&self.slots[idx].to_le_bytes());
        }
    }

    pub(crate) fn clear(&mut self) {
        self.slots = [SECTOR_FREE; MAX_MAP_SLOTS];
    }

    pub(crate) fn next(&self, sector: u16) -> u16 {
        self.slots[sector as usize]
    }

    pub(crate) fn set(&mut self, sector: u16, value: u16) {
        self.slots[sector as usize] = value;
    }

    /// Circular first-free scan starting at `hint`. Spreads allocations
    /// round-robin across the device without an explicit wear policy.
    pub(crate) fn allocate_next(&self, hint: u16) -> Result<u16, Error> {
        let hint = (hint as usize).min(self.count);
        for idx in (hint..self.count).chain(0..hint) {
            if self.slots[idx] == SECTOR_FREE {
                return Ok(idx as u16);
            }
        }
        Err(Error::NoSpace)
    }

    /// Links `tail -> new` and marks `new` as the new tail.
    pub(crate) fn extend_chain(&mut self, tail: u16, new: u16) {
        self.slots[tail as usize] = new;
        self.slots[new as usize] = new;
    }

    /// Starts a fresh chain at `sector`.
    pub(crate) fn start_chain(&mut self, sector: u16) {
        self.slots[sector as usize] = sector;
    }

    /// Frees the chain holding `size` bytes, walking from `head`.
    pub(crate) fn free_chain(&mut self, head: u16, size: u32) {
        let sectors = size.div_ceil(SECTOR_SIZE as u32);
        let mut sector = head;
        for _ in 0..sectors {
            if sector as usize >= self.count {
                break;
            }
            let next = self.slots[sector as usize];
            self.slots[sector as usize] = SECTOR_FREE;
            sector = next;
        }
    }

    pub(crate) fn free_sectors(&self) -> u32 {
        self.slots[..self.count]
            .iter()
            .filter(|&&slot| slot == SECTOR_FREE)
            .count() as u32
    }
}
