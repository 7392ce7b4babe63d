//! The only seam through which physical flash is touched.

use crate::SECTOR_SIZE;

/// Caller-supplied flash primitives.
///
/// Erase and program work on whole sectors at sector-aligned byte offsets;
/// reads are unaligned and of arbitrary length. Implementations block for the
/// physical duration of the operation (milliseconds for erase). The seam is
/// infallible: device-level retry and fault policy belongs below it, the
/// filesystem has no I/O fault state to surface.
pub trait SectorFlash {
    fn erase_sector(&mut self, offset: u32);
    fn write_sector(&mut self, offset: u32, data: &[u8; SECTOR_SIZE]);
    fn read(&mut self, offset: u32, out: &mut [u8]);
}

/// RAM-image flash over a borrowed byte slice.
///
/// Erased state is 0xFF, like NOR. Used by the host tool for flash image
/// files and by the test suite for in-memory images.
pub struct SliceFlash<'a> {
    mem: &'a mut [u8],
}

impl<'a> SliceFlash<'a> {
    pub fn new(mem: &'a mut [u8]) -> Self {
        Self { mem }
    }

    pub fn capacity(&self) -> usize {
        self.mem.len()
    }
}

impl SectorFlash for SliceFlash<'_> {
    fn erase_sector(&mut self, offset: u32) {
        log::trace!("flash erase {offset:#010x}");
        let offset = offset as usize;
        self.mem[offset..offset + SECTOR_SIZE].fill(0xff);
    }

    fn write_sector(&mut self, offset: u32, data: &[u8; SECTOR_SIZE]) {
        log::trace!("flash write {offset:#010x}");
        let offset = offset as usize;
        self.mem[offset..offset + SECTOR_SIZE].copy_from_slice(data);
    }

    fn read(&mut self, offset: u32, out: &mut [u8]) {
        let offset = offset as usize;
        out.copy_from_slice(&self.mem[offset..offset + out.len()]);
    }
}
