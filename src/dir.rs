//! Shallow id-based directory tree over the flat entry table.
//!
//! Root is id 0 and always exists without a table slot. Subdirectories are
//! ordinary entries of type `Directory` whose attribute word carries the
//! parent id and their own id; files record their containing directory in the
//! same parent field. Ids are 4 bits, capping the tree at [`crate::DIR_MAX`]
//! directories including root.

use crate::entry::{Entry, FileType, Mode};
use crate::flash::SectorFlash;
use crate::fs::Romfs;
use crate::{Error, DIR_MAX};

/// An open directory: its own id plus its entry-table slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Dir {
    pub(crate) id: u8,
    pub(crate) slot: Option<usize>,
}

impl Dir {
    /// The synthetic root.
    pub const fn root() -> Self {
        Self { id: 0, slot: None }
    }

    pub fn id(&self) -> u8 {
        self.id
    }

    pub fn is_root(&self) -> bool {
        self.id == 0
    }
}

impl<F: SectorFlash> Romfs<F> {
    pub fn root(&self) -> Dir {
        Dir::root()
    }

    pub fn open_dir(&self, parent: &Dir, name: &str) -> Result<Dir, Error> {
        let (slot, entry) = self.entries.find(parent.id, name).ok_or(Error::NoEntry)?;
        if !entry.is_dir() {
            return Err(Error::DirInvalid);
        }
        Ok(Dir {
            id: entry.dir_id,
            slot: Some(slot),
        })
    }

    /// Creates a subdirectory, assigning it the lowest unused id.
    pub fn create_dir(&mut self, parent: &Dir, name: &str) -> Result<Dir, Error> {
        if self.entries.find(parent.id, name).is_some() {
            return Err(Error::FileExists);
        }
        let id = self.next_dir_id().ok_or(Error::DirLimit)?;
        let slot = self.entries.free_slot().ok_or(Error::NoFreeEntries)?;

        let mut entry = Entry::new(name, Mode::empty(), FileType::Directory, parent.id)?;
        entry.dir_id = id;
        self.entries.set_live(slot, entry);
        self.flush();
        Ok(Dir {
            id,
            slot: Some(slot),
        })
    }

    /// Removes a subdirectory, which must hold no live entries.
    pub fn remove_dir(&mut self, parent: &Dir, name: &str) -> Result<(), Error> {
        let (slot, entry) = self.entries.find(parent.id, name).ok_or(Error::NoEntry)?;
        if !entry.is_dir() {
            return Err(Error::DirInvalid);
        }
        let id = entry.dir_id;
        if self.entries.iter_live().any(|(_, e)| e.parent == id) {
            return Err(Error::DirNotEmpty);
        }
        self.entries.tombstone(slot);
        self.flush();
        Ok(())
    }

    fn next_dir_id(&self) -> Option<u8> {
        // Id 0 is the root.
        (1..DIR_MAX as u8).find(|&id| {
            !self
                .entries
                .iter_live()
                .any(|(_, e)| e.is_dir() && e.dir_id == id)
        })
    }

    /// Whether `candidate` sits below `ancestor` in the id/parent graph.
    pub(crate) fn is_descendant(&self, candidate: u8, ancestor: u8) -> bool {
        let mut current = candidate;
        // The graph is acyclic by construction; the bound guards a corrupted
        // image from looping forever.
        for _ in 0..DIR_MAX {
            if current == 0 {
                return false;
            }
            if current == ancestor {
                return true;
            }
            match self
                .entries
                .iter_live()
                .find(|(_, e)| e.is_dir() && e.dir_id == current)
            {
                Some((_, e)) => current = e.parent,
                None => return false,
            }
        }
        false
    }
}
