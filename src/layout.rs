use crate::entry::ENTRY_BYTES;
use crate::{Error, SECTOR_SIZE};

// Fixed RAM mirror caps: one table sector of entries, 32 KiB of map slots
// (enough for 64 MiB of media at 4 KiB sectors).
pub(crate) const MAX_LIST_BYTES: usize = SECTOR_SIZE;
pub(crate) const MAX_MAP_BYTES: usize = 8 * SECTOR_SIZE;
pub(crate) const MAX_ENTRIES: usize = MAX_LIST_BYTES / ENTRY_BYTES;
pub(crate) const MAX_MAP_SLOTS: usize = MAX_MAP_BYTES / 2;

/// On-flash region geometry, a pure function of the media size.
///
/// The device is `[firmware][entry table][sector map][data sectors...]`;
/// `base` is the byte size of the reserved firmware region and therefore the
/// offset of the entry table. Region sizes are rounded up to sector multiples
/// and capped at the fixed mirror maxima.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Layout {
    pub base: u32,
    pub media_size: u32,
    pub list_bytes: u32,
    pub map_bytes: u32,
}

fn round_to_sector(bytes: u32) -> u32 {
    let mask = SECTOR_SIZE as u32 - 1;
    (bytes + mask) & !mask
}

impl Layout {
    pub fn new(base: u32, media_size: u32) -> Result<Self, Error> {
        if base % SECTOR_SIZE as u32 != 0 || media_size % SECTOR_SIZE as u32 != 0 {
            return Err(Error::InvalidOp);
        }

        let entries = media_size / (1024 * 1024) * ENTRY_BYTES as u32;
        let list_bytes = round_to_sector(entries).min(MAX_LIST_BYTES as u32);
        let slots = media_size / SECTOR_SIZE as u32 * 2;
        let map_bytes = round_to_sector(slots).min(MAX_MAP_BYTES as u32);

        if list_bytes == 0 || map_bytes == 0 {
            return Err(Error::NoSpace);
        }
        if base + list_bytes + map_bytes >= media_size {
            return Err(Error::NoSpace);
        }

        Ok(Self {
            base,
            media_size,
            list_bytes,
            map_bytes,
        })
    }

    pub fn list_offset(&self) -> u32 {
        self.base
    }

    pub fn map_offset(&self) -> u32 {
        self.base + self.list_bytes
    }

    /// Entry slots the table region can hold.
    pub fn entry_count(&self) -> usize {
        (self.list_bytes as usize / ENTRY_BYTES).min(MAX_ENTRIES)
    }

    /// Map slots actually backed by media sectors. The map region may round
    /// up past the device end; those slots must never be handed out.
    pub fn map_slots(&self) -> usize {
        (self.map_bytes as usize / 2).min(self.total_sectors())
    }

    pub fn total_sectors(&self) -> usize {
        self.media_size as usize / SECTOR_SIZE
    }

    /// First sector the allocator may hand to a file.
    pub fn first_data_sector(&self) -> u16 {
        ((self.base + self.list_bytes + self.map_bytes) / SECTOR_SIZE as u32) as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u32 = 1024 * 1024;

    #[test]
    fn sixteen_mib_geometry() {
        let layout = Layout::new(0x10000, 16 * MIB).unwrap();
        // 16 entries of 64 B round up to one table sector.
        assert_eq!(layout.list_bytes, 4096);
        // 4096 sectors, two map bytes each.
        assert_eq!(layout.map_bytes, 8192);
        assert_eq!(layout.entry_count(), 64);
        assert_eq!(layout.map_slots(), 4096);
        assert_eq!(layout.first_data_sector(), 16 + 1 + 2);
    }

    #[test]
    fn map_region_caps_at_64_mib_of_media() {
        let layout = Layout::new(0x10000, 256 * MIB).unwrap();
        assert_eq!(layout.map_bytes, MAX_MAP_BYTES as u32);
        // Slots beyond the mirror cap stay unmanaged.
        assert_eq!(layout.map_slots(), MAX_MAP_SLOTS);
    }

    #[test]
    fn map_rounding_never_exceeds_real_sectors() {
        let layout = Layout::new(0x10000, 10 * MIB).unwrap();
        // 2560 slots round up to two map sectors, but only 2560 sectors exist.
        assert_eq!(layout.map_bytes, 8192);
        assert_eq!(layout.map_slots(), 2560);
    }

    #[test]
    fn tiny_media_is_rejected() {
        assert_eq!(Layout::new(0, 512 * 1024), Err(Error::NoSpace));
        assert_eq!(Layout::new(100, 16 * MIB), Err(Error::InvalidOp));
    }
}
