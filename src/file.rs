//! Per-open-file cursor state and the buffered stream operations.

use crate::entry::Entry;
use crate::flash::SectorFlash;
use crate::fs::Romfs;
use crate::{Error, SECTOR_SIZE};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Op {
    Read,
    Write,
}

/// Seek origin for [`Romfs::seek`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekFrom {
    Start(u32),
    Current(i32),
    End(i32),
}

/// An open file.
///
/// Owns a one-sector scratch buffer; the filesystem holds no reference to the
/// handle, dropping it without [`Romfs::close`] simply discards any unflushed
/// residual. Writers accumulate into the buffer and bind a fresh sector each
/// time it fills, so a single write call of any length is fine.
pub struct File {
    pub(crate) entry: Entry,
    pub(crate) slot: usize,
    pub(crate) op: Op,
    /// Current sector: the chain tail for writers, the read cursor's sector
    /// for readers.
    pub(crate) pos: u16,
    /// Intra-sector offset: buffer fill level for writers, consume offset
    /// for readers.
    pub(crate) offset: usize,
    /// Cumulative read position in bytes.
    pub(crate) transferred: u32,
    /// The buffer holds a reloaded partial tail sector that must be
    /// reprogrammed in place rather than freshly allocated.
    pub(crate) tail_bound: bool,
    pub(crate) err: Option<Error>,
    pub(crate) buf: [u8; SECTOR_SIZE],
}

impl File {
    pub(crate) fn writer(entry: Entry, slot: usize) -> Self {
        Self {
            entry,
            slot,
            op: Op::Write,
            pos: entry.start,
            offset: 0,
            transferred: 0,
            tail_bound: false,
            err: None,
            buf: [0; SECTOR_SIZE],
        }
    }

    pub(crate) fn reader(entry: Entry, slot: usize) -> Self {
        Self {
            entry,
            slot,
            op: Op::Read,
            pos: entry.start,
            offset: 0,
            transferred: 0,
            tail_bound: false,
            err: None,
            buf: [0; SECTOR_SIZE],
        }
    }

    /// Cached copy of the directory entry. For writers, `size` reflects only
    /// what has been flushed so far.
    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    pub fn name(&self) -> &str {
        self.entry.name()
    }

    pub fn size(&self) -> u32 {
        self.entry.size
    }

    /// Status of the most recent read or write: `NoSpace` after a short
    /// write, `Eof` once the read cursor has nothing left.
    pub fn last_error(&self) -> Option<Error> {
        self.err
    }
}

impl<F: SectorFlash> Romfs<F> {
    /// Appends `data` to a writer.
    ///
    /// Returns the number of bytes accepted. When storage runs out this is a
    /// short count and the handle status is `NoSpace`: whole sectors flushed
    /// so far stay intact, bytes still in the scratch buffer are retained for
    /// a later flush, and the rest of `data` is refused.
    pub fn write(&mut self, file: &mut File, data: &[u8]) -> Result<usize, Error> {
        if file.op != Op::Write {
            return Err(Error::InvalidOp);
        }
        file.err = None;

        let mut done = 0;
        while done < data.len() {
            // A previous short write may have left the buffer full and
            // pending; space can have been freed since.
            if file.offset == SECTOR_SIZE {
                if let Err(e) = self.program_buffer(file) {
                    file.err = Some(e);
                    return Ok(done);
                }
            }

            let n = (data.len() - done).min(SECTOR_SIZE - file.offset);
            file.buf[file.offset..file.offset + n].copy_from_slice(&data[done..done + n]);
            file.offset += n;
            done += n;

            if file.offset == SECTOR_SIZE {
                if let Err(e) = self.program_buffer(file) {
                    file.err = Some(e);
                    return Ok(done);
                }
            }
        }
        Ok(done)
    }

    /// Reads from the cursor, clamped to the bytes remaining. Returns
    /// `Ok(0)` with an `Eof` status when nothing is left; a read that
    /// consumes the final byte leaves the same status behind.
    pub fn read(&mut self, file: &mut File, out: &mut [u8]) -> Result<usize, Error> {
        if file.op != Op::Read {
            return Err(Error::InvalidOp);
        }
        file.err = None;
        if out.is_empty() {
            return Ok(0);
        }
        if file.transferred >= file.entry.size {
            file.err = Some(Error::Eof);
            return Ok(0);
        }

        let remaining = file.entry.size - file.transferred;
        let want = (out.len() as u32).min(remaining) as usize;
        let mut done = 0;
        while done < want {
            let n = (want - done).min(SECTOR_SIZE - file.offset);
            let off = file.pos as u32 * SECTOR_SIZE as u32 + file.offset as u32;
            self.flash_mut().read(off, &mut out[done..done + n]);
            file.offset += n;
            file.transferred += n as u32;
            done += n;
            if file.offset == SECTOR_SIZE {
                file.offset = 0;
                file.pos = self.map.next(file.pos);
            }
        }

        if file.transferred >= file.entry.size {
            file.err = Some(Error::Eof);
        }
        Ok(done)
    }

    /// Moves the read cursor to an absolute byte position in `[0, size]`.
    ///
    /// The sector map only links forward, so the physical sector is
    /// recomputed by re-walking the chain from the file's first sector.
    /// Out-of-range targets fail without altering the cursor.
    pub fn seek(&mut self, file: &mut File, from: SeekFrom) -> Result<u32, Error> {
        if file.op != Op::Read {
            return Err(Error::InvalidOp);
        }
        let size = file.entry.size as i64;
        let target = match from {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::Current(delta) => file.transferred as i64 + delta as i64,
            SeekFrom::End(delta) => size + delta as i64,
        };
        if target < 0 || target > size {
            return Err(Error::InvalidOp);
        }

        let target = target as u32;
        let mut pos = file.entry.start;
        for _ in 0..target / SECTOR_SIZE as u32 {
            pos = self.map.next(pos);
        }
        file.pos = pos;
        file.offset = (target % SECTOR_SIZE as u32) as usize;
        file.transferred = target;
        file.err = None;
        Ok(target)
    }

    /// Current read position in bytes.
    pub fn tell(&self, file: &File) -> u32 {
        file.transferred
    }

    /// Releases the handle. For writers this flushes any residual partial
    /// sector (growing the size by exactly the residual count), stores the
    /// entry back into its slot and persists both tables; a reader closes
    /// without touching flash.
    ///
    /// If the residual cannot be bound because storage is exhausted, the
    /// flushed prefix is still persisted and `NoSpace` is returned.
    pub fn close(&mut self, mut file: File) -> Result<(), Error> {
        if file.op != Op::Write {
            return Ok(());
        }

        let mut result = Ok(());
        if file.offset > 0 {
            if let Err(e) = self.program_buffer(&mut file) {
                result = Err(e);
            }
        }
        self.entries.set_live(file.slot, file.entry);
        self.flush();
        result
    }
}
