//! '/'-separated path resolution on top of the directory layer.
//!
//! Every non-final component must resolve to a directory under the current
//! id; the terminal operation then runs under the resolved directory. The
//! `make_dirs` flavors create missing intermediate directories on the way.

use crate::dir::Dir;
use crate::entry::{Entry, FileType, Mode};
use crate::file::File;
use crate::flash::SectorFlash;
use crate::fs::Romfs;
use crate::Error;

impl<F: SectorFlash> Romfs<F> {
    /// Splits `path` into the directory holding the terminal component and
    /// the component itself. Empty components (leading, trailing or doubled
    /// slashes) are ignored; a path naming the root itself has no terminal
    /// component and is rejected.
    fn resolve_parent<'p>(
        &mut self,
        path: &'p str,
        make_dirs: bool,
    ) -> Result<(Dir, &'p str), Error> {
        let mut dir = Dir::root();
        let mut pending: Option<&'p str> = None;
        for component in path.split('/').filter(|c| !c.is_empty()) {
            if let Some(name) = pending.take() {
                dir = match self.open_dir(&dir, name) {
                    Ok(found) => found,
                    Err(Error::NoEntry) if make_dirs => self.create_dir(&dir, name)?,
                    Err(e) => return Err(e),
                };
            }
            pending = Some(component);
        }
        let name = pending.ok_or(Error::DirInvalid)?;
        Ok((dir, name))
    }

    pub fn create_path(
        &mut self,
        path: &str,
        mode: Mode,
        ftype: FileType,
        make_dirs: bool,
    ) -> Result<File, Error> {
        let (dir, name) = self.resolve_parent(path, make_dirs)?;
        self.create_in(&dir, name, mode, ftype)
    }

    pub fn open_path(&mut self, path: &str) -> Result<File, Error> {
        let (dir, name) = self.resolve_parent(path, false)?;
        self.open_in(&dir, name)
    }

    /// Path-based append; `create` also allows missing destination
    /// directories to be created implicitly.
    pub fn open_append_path(
        &mut self,
        path: &str,
        ftype: FileType,
        create: bool,
    ) -> Result<File, Error> {
        let (dir, name) = self.resolve_parent(path, create)?;
        self.open_append_in(&dir, name, ftype, create)
    }

    pub fn delete_path(&mut self, path: &str) -> Result<(), Error> {
        let (dir, name) = self.resolve_parent(path, false)?;
        self.delete_in(&dir, name)
    }

    /// Path-based rename; missing destination directories are created when
    /// `make_dirs` is set.
    pub fn rename_path(&mut self, old: &str, new: &str, make_dirs: bool) -> Result<(), Error> {
        let (src_dir, old_name) = self.resolve_parent(old, false)?;
        let (dst_dir, new_name) = self.resolve_parent(new, make_dirs)?;
        self.rename_in(&src_dir, old_name, &dst_dir, new_name)
    }

    pub fn stat_path(&mut self, path: &str) -> Result<Entry, Error> {
        let (dir, name) = self.resolve_parent(path, false)?;
        self.stat_in(&dir, name)
    }

    pub fn mkdir_path(&mut self, path: &str, make_parents: bool) -> Result<Dir, Error> {
        let (dir, name) = self.resolve_parent(path, make_parents)?;
        self.create_dir(&dir, name)
    }

    pub fn rmdir_path(&mut self, path: &str) -> Result<(), Error> {
        let (dir, name) = self.resolve_parent(path, false)?;
        self.remove_dir(&dir, name)
    }

    pub fn open_dir_path(&mut self, path: &str) -> Result<Dir, Error> {
        let trimmed = path.trim_matches('/');
        if trimmed.is_empty() {
            return Ok(Dir::root());
        }
        let (dir, name) = self.resolve_parent(trimmed, false)?;
        self.open_dir(&dir, name)
    }
}
