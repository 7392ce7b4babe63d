//! The entry table: fixed 64-byte directory-entry records.
//!
//! A live record's first name byte is never one of the two sentinels below.
//! `NAME_EMPTY` (erased flash) terminates table scans; `NAME_DELETED` marks a
//! tombstoned, reusable slot. Deletion never compacts the table.

use bitflags::bitflags;

use crate::layout::MAX_ENTRIES;
use crate::{Error, MAX_NAME_LEN, SECTOR_SIZE};

pub(crate) const ENTRY_BYTES: usize = 64;
pub(crate) const START_NONE: u16 = 0xffff;

const NAME_EMPTY: u8 = 0xff;
const NAME_DELETED: u8 = 0x00;

// Packed attribute word, independent of native layout:
// bits 0-2 mode, 3-7 type, 8-11 parent dir id, 12-15 own dir id.
const ATTR_MODE_MASK: u16 = 0x0007;
const ATTR_TYPE_SHIFT: u16 = 3;
const ATTR_TYPE_MASK: u16 = 0x001f;
const ATTR_PARENT_SHIFT: u16 = 8;
const ATTR_DIR_ID_SHIFT: u16 = 12;
const ATTR_NIBBLE_MASK: u16 = 0x000f;

bitflags! {
    /// 3-bit entry mode. Empty means read-write.
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct Mode: u8 {
        const READ_ONLY = 1 << 0;
        const SYSTEM = 1 << 1;
        const RESERVED = 1 << 2;
    }
}

/// 5-bit entry type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FileType {
    Firmware,
    FlashList,
    FlashMap,
    Directory,
    Misc,
}

impl FileType {
    fn to_bits(self) -> u16 {
        match self {
            FileType::Firmware => 0x00,
            FileType::FlashList => 0x01,
            FileType::FlashMap => 0x02,
            FileType::Directory => 0x03,
            FileType::Misc => 0x1f,
        }
    }

    fn from_bits(bits: u16) -> Self {
        match bits {
            0x00 => FileType::Firmware,
            0x01 => FileType::FlashList,
            0x02 => FileType::FlashMap,
            0x03 => FileType::Directory,
            _ => FileType::Misc,
        }
    }
}

/// One directory-entry record.
///
/// `size` is the exact byte length, not rounded to sectors; `start` is the
/// first sector of the data chain or [`START_NONE`] while nothing has been
/// allocated (which implies size 0).
#[derive(Clone, Copy)]
pub struct Entry {
    name: [u8; MAX_NAME_LEN],
    pub(crate) mode: Mode,
    pub(crate) ftype: FileType,
    pub(crate) parent: u8,
    pub(crate) dir_id: u8,
    pub(crate) start: u16,
    pub(crate) size: u32,
}

impl Entry {
    pub(crate) fn new(
        name: &str,
        mode: Mode,
        ftype: FileType,
        parent: u8,
    ) -> Result<Self, Error> {
        let mut entry = Entry {
            name: [0; MAX_NAME_LEN],
            mode,
            ftype,
            parent,
            dir_id: 0,
            start: START_NONE,
            size: 0,
        };
        entry.set_name(name)?;
        Ok(entry)
    }

    pub(crate) fn set_name(&mut self, name: &str) -> Result<(), Error> {
        let bytes = name.as_bytes();
        if bytes.is_empty() || bytes.contains(&b'/') || bytes.contains(&0) {
            return Err(Error::InvalidOp);
        }
        if bytes.len() >= MAX_NAME_LEN {
            return Err(Error::TooBig);
        }
        self.name = [0; MAX_NAME_LEN];
        self.name[..bytes.len()].copy_from_slice(bytes);
        Ok(())
    }

    pub fn name(&self) -> &str {
        let end = self
            .name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(MAX_NAME_LEN);
        core::str::from_utf8(&self.name[..end]).unwrap_or("")
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn file_type(&self) -> FileType {
        self.ftype
    }

    pub fn size(&self) -> u32 {
        self.size
    }

    pub fn is_dir(&self) -> bool {
        self.ftype == FileType::Directory
    }

    pub fn is_system(&self) -> bool {
        self.mode.contains(Mode::SYSTEM)
    }

    /// Sectors the data chain occupies.
    pub fn sectors(&self) -> u32 {
        self.size.div_ceil(SECTOR_SIZE as u32)
    }

    fn encode(&self, out: &mut [u8]) {
        out[..MAX_NAME_LEN].copy_from_slice(&self.name);
        let attr = (self.mode.bits() as u16 & ATTR_MODE_MASK)
            | ((self.ftype.to_bits() & ATTR_TYPE_MASK) << ATTR_TYPE_SHIFT)
            | ((self.parent as u16 & ATTR_NIBBLE_MASK) << ATTR_PARENT_SHIFT)
            | ((self.dir_id as u16 & ATTR_NIBBLE_MASK) << ATTR_DIR_ID_SHIFT);
        out[54..56].copy_from_slice(&attr.to_le_bytes());
        out[56..58].copy_from_slice(&self.start.to_le_bytes());
        out[58..62].copy_from_slice(&self.size.to_le_bytes());
        out[62] = 0xff;
        out[63] = 0xff;
    }

    fn decode(raw: &[u8]) -> Self {
        let mut name = [0u8; MAX_NAME_LEN];
        name.copy_from_slice(&raw[..MAX_NAME_LEN]);
        let attr = u16::from_le_bytes([raw[54], raw[55]]);
        Entry {
            name,
            mode: Mode::from_bits_truncate((attr & ATTR_MODE_MASK) as u8),
            ftype: FileType::from_bits((attr >> ATTR_TYPE_SHIFT) & ATTR_TYPE_MASK),
            parent: ((attr >> ATTR_PARENT_SHIFT) & ATTR_NIBBLE_MASK) as u8,
            dir_id: ((attr >> ATTR_DIR_ID_SHIFT) & ATTR_NIBBLE_MASK) as u8,
            start: u16::from_le_bytes([raw[56], raw[57]]),
            size: u32::from_le_bytes([raw[58], raw[59], raw[60], raw[61]]),
        }
    }
}

/// Tagged slot state, the RAM form of the sentinel bytes.
#[derive(Clone, Copy)]
pub(crate) enum Slot {
    Empty,
    Tombstone,
    Live(Entry),
}

/// RAM mirror of the entry-table region.
pub(crate) struct EntryTable {
    slots: [Slot; MAX_ENTRIES],
    count: usize,
}

impl EntryTable {
    pub(crate) fn new(count: usize) -> Self {
        Self {
            slots: [Slot::Empty; MAX_ENTRIES],
            count: count.min(MAX_ENTRIES),
        }
    }

    pub(crate) fn load(&mut self, raw: &[u8]) {
        for (idx, slot) in self.slots.iter_mut().enumerate().take(self.count) {
            let rec = &raw[idx * ENTRY_BYTES..(idx + 1) * ENTRY_BYTES];
            *slot = match rec[0] {
                NAME_EMPTY => Slot::Empty,
                NAME_DELETED => Slot::Tombstone,
                _ => Slot::Live(Entry::decode(rec)),
            };
        }
    }

    pub(crate) fn store(&self, out: &mut [u8]) {
        out.fill(0xff);
        for (idx, slot) in self.slots.iter().enumerate().take(self.count) {
            let rec = &mut out[idx * ENTRY_BYTES..(idx + 1) * ENTRY_BYTES];
            match slot {
                Slot::Empty => {}
                Slot::Tombstone => rec[0] = NAME_DELETED,
                Slot::Live(entry) => entry.encode(rec),
            }
        }
    }

    pub(crate) fn clear(&mut self) {
        self.slots = [Slot::Empty; MAX_ENTRIES];
    }

    /// Live entries in physical-slot order. Empty terminates the scan; new
    /// slots are only ever claimed at the first empty-or-tombstoned index, so
    /// nothing live follows an empty slot.
    pub(crate) fn iter_live(&self) -> impl Iterator<Item = (usize, &Entry)> {
        self.slots[..self.count]
            .iter()
            .enumerate()
            .take_while(|(_, slot)| !matches!(slot, Slot::Empty))
            .filter_map(|(idx, slot)| match slot {
                Slot::Live(entry) => Some((idx, entry)),
                _ => None,
            })
    }

    pub(crate) fn find(&self, dir: u8, name: &str) -> Option<(usize, &Entry)> {
        self.iter_live()
            .find(|(_, e)| e.parent == dir && e.name() == name)
    }

    pub(crate) fn free_slot(&self) -> Option<usize> {
        self.slots[..self.count]
            .iter()
            .position(|slot| matches!(slot, Slot::Empty | Slot::Tombstone))
    }

    pub(crate) fn live(&self, idx: usize) -> Option<&Entry> {
        match self.slots.get(idx) {
            Some(Slot::Live(entry)) => Some(entry),
            _ => None,
        }
    }

    pub(crate) fn set_live(&mut self, idx: usize, entry: Entry) {
        self.slots[idx] = Slot::Live(entry);
    }

    pub(crate) fn tombstone(&mut self, idx: usize) {
        self.slots[idx] = Slot::Tombstone;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attr_word_packs_all_four_groups() {
        let mut entry = Entry::new("d", Mode::READ_ONLY | Mode::SYSTEM, FileType::Directory, 5)
            .unwrap();
        entry.dir_id = 9;
        entry.start = 0x1234;
        entry.size = 0xdeadbeef;

        let mut raw = [0u8; ENTRY_BYTES];
        entry.encode(&mut raw);
        // mode 0b011, type 0b00011 -> 0b0001_1011 in the low byte.
        assert_eq!(raw[54], 0x1b);
        // parent 5 in the low nibble, own id 9 in the high nibble.
        assert_eq!(raw[55], 0x95);
        assert_eq!(&raw[56..58], &[0x34, 0x12]);
        assert_eq!(&raw[58..62], &[0xef, 0xbe, 0xad, 0xde]);

        let back = Entry::decode(&raw);
        assert_eq!(back.name(), "d");
        assert_eq!(back.mode, Mode::READ_ONLY | Mode::SYSTEM);
        assert_eq!(back.ftype, FileType::Directory);
        assert_eq!(back.parent, 5);
        assert_eq!(back.dir_id, 9);
        assert_eq!(back.start, 0x1234);
        assert_eq!(back.size, 0xdeadbeef);
    }

    #[test]
    fn name_validation() {
        assert_eq!(
            Entry::new("", Mode::empty(), FileType::Misc, 0).err(),
            Some(Error::InvalidOp)
        );
        assert_eq!(
            Entry::new("a/b", Mode::empty(), FileType::Misc, 0).err(),
            Some(Error::InvalidOp)
        );
        let long = core::str::from_utf8(&[b'x'; MAX_NAME_LEN]).unwrap();
        assert_eq!(
            Entry::new(long, Mode::empty(), FileType::Misc, 0).err(),
            Some(Error::TooBig)
        );
        // 53 bytes plus the terminator is the longest that fits.
        let ok = core::str::from_utf8(&[b'x'; MAX_NAME_LEN - 1]).unwrap();
        assert_eq!(
            Entry::new(ok, Mode::empty(), FileType::Misc, 0)
                .unwrap()
                .name(),
            ok
        );
    }

    #[test]
    fn tombstones_are_skipped_and_reused() {
        let mut table = EntryTable::new(8);
        table.set_live(0, Entry::new("a", Mode::empty(), FileType::Misc, 0).unwrap());
        table.set_live(1, Entry::new("b", Mode::empty(), FileType::Misc, 0).unwrap());
        table.tombstone(0);

        assert!(table.find(0, "a").is_none());
        assert_eq!(table.find(0, "b").map(|(idx, _)| idx), Some(1));
        // First empty-or-deleted slot is the tombstone, not slot 2.
        assert_eq!(table.free_slot(), Some(0));

        let names: Vec<&str> = table.iter_live().map(|(_, e)| e.name()).collect();
        assert_eq!(names, ["b"]);
    }

    #[test]
    fn empty_slot_terminates_the_scan() {
        let mut table = EntryTable::new(8);
        table.set_live(0, Entry::new("a", Mode::empty(), FileType::Misc, 0).unwrap());
        // Slot 1 stays empty; a record at slot 2 would be unreachable, which
        // the allocation rule (first free slot) makes impossible to create.
        assert_eq!(table.iter_live().count(), 1);
    }

    #[test]
    fn store_load_round_trip_preserves_slot_states() {
        let mut table = EntryTable::new(4);
        table.set_live(0, Entry::new("keep", Mode::empty(), FileType::Misc, 2).unwrap());
        table.tombstone(1);
        table.set_live(2, Entry::new("also", Mode::SYSTEM, FileType::Firmware, 0).unwrap());
        table.tombstone(2);
        table.set_live(2, Entry::new("live", Mode::empty(), FileType::Misc, 1).unwrap());

        let mut raw = [0u8; 4 * ENTRY_BYTES];
        table.store(&mut raw);

        let mut back = EntryTable::new(4);
        back.load(&raw);
        assert_eq!(back.find(2, "keep").map(|(idx, _)| idx), Some(0));
        assert_eq!(back.find(1, "live").map(|(idx, _)| idx), Some(2));
        assert!(back.live(1).is_none());
        assert_eq!(back.free_slot(), Some(1));
    }
}
