use crate::dir::Dir;
use crate::entry::{Entry, EntryTable, FileType, Mode, START_NONE};
use crate::file::{File, Op};
use crate::flash::SectorFlash;
use crate::layout::{Layout, MAX_LIST_BYTES};
use crate::map::SectorMap;
use crate::{Error, SECTOR_SIZE};

/// One mounted filesystem image.
///
/// Owns the flash handle and the RAM mirrors of both tables, so independent
/// images can coexist (one per instance). All operations are synchronous and
/// blocking; a mutation completes, and typically flushes, before the next one
/// may begin.
pub struct Romfs<F: SectorFlash> {
    flash: F,
    layout: Layout,
    pub(crate) entries: EntryTable,
    pub(crate) map: SectorMap,
}

impl<F: SectorFlash> Romfs<F> {
    /// Mounts the filesystem, loading both table mirrors from flash.
    ///
    /// `base` is the byte size of the reserved firmware region, `media_size`
    /// the total device size; both must be sector multiples.
    pub fn start(flash: F, base: u32, media_size: u32) -> Result<Self, Error> {
        let layout = Layout::new(base, media_size)?;
        let mut fs = Self {
            flash,
            layout,
            entries: EntryTable::new(layout.entry_count()),
            map: SectorMap::new(layout.map_slots()),
        };

        let mut raw = [0u8; MAX_LIST_BYTES];
        fs.flash.read(layout.list_offset(), &mut raw);
        fs.entries.load(&raw);

        let mut chunk = [0u8; SECTOR_SIZE];
        for i in 0..layout.map_bytes as usize / SECTOR_SIZE {
            fs.flash
                .read(layout.map_offset() + (i * SECTOR_SIZE) as u32, &mut chunk);
            fs.map.load(i * SECTOR_SIZE, &chunk);
        }

        log::info!(
            "romfs: {} media bytes, {} list bytes, {} map bytes",
            layout.media_size,
            layout.list_bytes,
            layout.map_bytes
        );
        Ok(fs)
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Resets both tables and persists them.
    ///
    /// Three synthetic system entries describe the filesystem's own geometry;
    /// every sector below the first data sector is marked allocated in a
    /// consecutive chain, so the `firmware` entry reads back through the
    /// ordinary chain walk.
    pub fn format(&mut self) -> Result<(), Error> {
        self.entries.clear();

        let mut firmware = Entry::new(
            "firmware",
            Mode::READ_ONLY | Mode::SYSTEM,
            FileType::Firmware,
            0,
        )?;
        firmware.start = 0;
        firmware.size = self.layout.base;
        self.entries.set_live(0, firmware);

        let mut list = Entry::new(
            "flashlist",
            Mode::READ_ONLY | Mode::SYSTEM,
            FileType::FlashList,
            0,
        )?;
        list.start = (self.layout.list_offset() / SECTOR_SIZE as u32) as u16;
        list.size = self.layout.list_bytes;
        self.entries.set_live(1, list);

        let mut map = Entry::new(
            "flashmap",
            Mode::READ_ONLY | Mode::SYSTEM,
            FileType::FlashMap,
            0,
        )?;
        map.start = (self.layout.map_offset() / SECTOR_SIZE as u32) as u16;
        map.size = self.layout.map_bytes;
        self.entries.set_live(2, map);

        self.map.clear();
        for sector in 0..self.layout.first_data_sector() {
            self.map.set(sector, sector + 1);
        }

        log::debug!("romfs: format, {} data sectors", self.map.free_sectors());
        self.flush();
        Ok(())
    }

    /// Erases and reprograms both table regions in full. Not incremental; a
    /// flush interrupted by power loss can leave the two regions inconsistent
    /// with each other.
    pub fn flush(&mut self) {
        let mut buf = [0u8; SECTOR_SIZE];

        self.entries.store(&mut buf);
        let off = self.layout.list_offset();
        self.flash.erase_sector(off);
        self.flash.write_sector(off, &buf);

        for i in 0..self.layout.map_bytes as usize / SECTOR_SIZE {
            self.map.store(i * SECTOR_SIZE, &mut buf);
            let off = self.layout.map_offset() + (i * SECTOR_SIZE) as u32;
            self.flash.erase_sector(off);
            self.flash.write_sector(off, &buf);
        }
    }

    /// Exact free space in bytes.
    pub fn free_bytes(&self) -> u32 {
        self.map.free_sectors() * SECTOR_SIZE as u32
    }

    // ---- directory-scoped operations ----

    pub fn create_in(
        &mut self,
        dir: &Dir,
        name: &str,
        mode: Mode,
        ftype: FileType,
    ) -> Result<File, Error> {
        if ftype == FileType::Directory {
            return Err(Error::DirInvalid);
        }
        if self.entries.find(dir.id, name).is_some() {
            return Err(Error::FileExists);
        }
        let slot = self.entries.free_slot().ok_or(Error::NoFreeEntries)?;
        let entry = Entry::new(name, mode, ftype, dir.id)?;
        self.entries.set_live(slot, entry);
        Ok(File::writer(entry, slot))
    }

    pub fn open_in(&mut self, dir: &Dir, name: &str) -> Result<File, Error> {
        let (slot, entry) = self
            .entries
            .find(dir.id, name)
            .map(|(idx, e)| (idx, *e))
            .ok_or(Error::NoEntry)?;
        if entry.is_dir() {
            return Err(Error::DirInvalid);
        }
        Ok(File::reader(entry, slot))
    }

    /// Opens for append, re-deriving the tail sector and byte offset from the
    /// entry and reloading a partial final sector into the scratch buffer.
    /// With `create` set a missing target is created instead of failing.
    pub fn open_append_in(
        &mut self,
        dir: &Dir,
        name: &str,
        ftype: FileType,
        create: bool,
    ) -> Result<File, Error> {
        let found = self.entries.find(dir.id, name).map(|(idx, e)| (idx, *e));
        let (slot, entry) = match found {
            Some(hit) => hit,
            None if create => return self.create_in(dir, name, Mode::empty(), ftype),
            None => return Err(Error::NoEntry),
        };
        if entry.is_dir() {
            return Err(Error::DirInvalid);
        }

        let mut file = File::writer(entry, slot);
        if entry.start != START_NONE && entry.size > 0 {
            let steps = (entry.size - 1) / SECTOR_SIZE as u32;
            let mut pos = entry.start;
            for _ in 0..steps {
                pos = self.map.next(pos);
            }
            file.pos = pos;

            let residual = (entry.size % SECTOR_SIZE as u32) as usize;
            if residual > 0 {
                self.flash
                    .read(pos as u32 * SECTOR_SIZE as u32, &mut file.buf[..residual]);
                file.offset = residual;
                // The next program rewrites the tail in place; size grows
                // back as the buffer is flushed.
                file.entry.size -= residual as u32;
                file.tail_bound = true;
            }
        }
        Ok(file)
    }

    pub fn delete_in(&mut self, dir: &Dir, name: &str) -> Result<(), Error> {
        let (slot, entry) = self
            .entries
            .find(dir.id, name)
            .map(|(idx, e)| (idx, *e))
            .ok_or(Error::NoEntry)?;
        if entry.is_dir() {
            return Err(Error::DirInvalid);
        }
        if entry.is_system() {
            return Err(Error::InvalidOp);
        }
        self.entries.tombstone(slot);
        if entry.start != START_NONE {
            self.map.free_chain(entry.start, entry.size);
        }
        self.flush();
        Ok(())
    }

    /// Renames within or across directories. Moving a directory into itself
    /// or any of its descendants is rejected; the id/parent graph stays
    /// acyclic.
    pub fn rename_in(
        &mut self,
        src_dir: &Dir,
        old: &str,
        dst_dir: &Dir,
        new: &str,
    ) -> Result<(), Error> {
        let (slot, entry) = self
            .entries
            .find(src_dir.id, old)
            .map(|(idx, e)| (idx, *e))
            .ok_or(Error::NoEntry)?;
        if entry.is_system() {
            return Err(Error::InvalidOp);
        }
        if self.entries.find(dst_dir.id, new).is_some() {
            return Err(Error::FileExists);
        }
        if entry.is_dir()
            && src_dir.id != dst_dir.id
            && (dst_dir.id == entry.dir_id || self.is_descendant(dst_dir.id, entry.dir_id))
        {
            return Err(Error::DirInvalid);
        }

        let mut entry = entry;
        entry.set_name(new)?;
        entry.parent = dst_dir.id;
        self.entries.set_live(slot, entry);
        self.flush();
        Ok(())
    }

    /// Entry lookup without opening.
    pub fn stat_in(&self, dir: &Dir, name: &str) -> Result<Entry, Error> {
        self.entries
            .find(dir.id, name)
            .map(|(_, e)| *e)
            .ok_or(Error::NoEntry)
    }

    /// Live entries under `dir` in physical-slot order, system entries and
    /// tombstones skipped. Restartable by calling again.
    pub fn list<'a>(&'a self, dir: &Dir) -> impl Iterator<Item = &'a Entry> + 'a {
        let id = dir.id;
        self.entries
            .iter_live()
            .filter(move |(_, e)| e.parent == id && !e.is_system())
            .map(|(_, e)| e)
    }

    /// Like [`Romfs::list`], system entries included.
    pub fn list_with_system<'a>(&'a self, dir: &Dir) -> impl Iterator<Item = &'a Entry> + 'a {
        let id = dir.id;
        self.entries
            .iter_live()
            .filter(move |(_, e)| e.parent == id)
            .map(|(_, e)| e)
    }

    // ---- flat-namespace shorthands (root directory) ----

    pub fn create(&mut self, name: &str, mode: Mode, ftype: FileType) -> Result<File, Error> {
        self.create_in(&Dir::root(), name, mode, ftype)
    }

    pub fn open(&mut self, name: &str) -> Result<File, Error> {
        self.open_in(&Dir::root(), name)
    }

    pub fn open_append(&mut self, name: &str, ftype: FileType, create: bool) -> Result<File, Error> {
        self.open_append_in(&Dir::root(), name, ftype, create)
    }

    pub fn delete(&mut self, name: &str) -> Result<(), Error> {
        self.delete_in(&Dir::root(), name)
    }

    pub fn rename(&mut self, old: &str, new: &str) -> Result<(), Error> {
        self.rename_in(&Dir::root(), old, &Dir::root(), new)
    }

    pub fn stat(&self, name: &str) -> Result<Entry, Error> {
        self.stat_in(&Dir::root(), name)
    }

    // ---- internals shared with the stream layer ----

    /// Binds a data sector for the handle's full or residual buffer and
    /// programs it. Growth accounting uses the current fill level, so the
    /// same path serves mid-write full sectors and the close-time residual.
    pub(crate) fn program_buffer(&mut self, file: &mut File) -> Result<(), Error> {
        debug_assert!(file.op == Op::Write && file.offset > 0);

        let sector = if file.tail_bound {
            file.tail_bound = false;
            file.pos
        } else if file.entry.start == START_NONE {
            let sector = self.map.allocate_next(0)?;
            self.map.start_chain(sector);
            file.entry.start = sector;
            file.pos = sector;
            sector
        } else {
            let sector = self.map.allocate_next(file.pos)?;
            self.map.extend_chain(file.pos, sector);
            file.pos = sector;
            sector
        };

        let off = sector as u32 * SECTOR_SIZE as u32;
        self.flash.erase_sector(off);
        self.flash.write_sector(off, &file.buf);
        file.entry.size += file.offset as u32;
        file.offset = 0;
        Ok(())
    }

    pub(crate) fn flash_mut(&mut self) -> &mut F {
        &mut self.flash
    }
}
