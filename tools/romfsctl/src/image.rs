use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use romfs::flash::SliceFlash;
use romfs::{Romfs, SECTOR_SIZE};

/// A flash image file held in memory while commands run against it.
///
/// Mutating commands call [`FlashImage::save`] once they succeed; a failed
/// command leaves the on-disk image untouched.
pub struct FlashImage {
    path: PathBuf,
    base: u32,
    mem: Vec<u8>,
}

impl FlashImage {
    pub fn open(path: &Path, base: u32) -> Result<Self> {
        let mem = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
        if mem.is_empty() || mem.len() % SECTOR_SIZE != 0 {
            bail!(
                "{}: image must be a whole number of {}-byte sectors",
                path.display(),
                SECTOR_SIZE
            );
        }
        Ok(Self {
            path: path.to_path_buf(),
            base,
            mem,
        })
    }

    /// Fresh erased image, every byte 0xff.
    pub fn create(path: &Path, base: u32, size: usize) -> Self {
        Self {
            path: path.to_path_buf(),
            base,
            mem: vec![0xff; size],
        }
    }

    pub fn open_or_create(path: &Path, base: u32, size: usize) -> Result<Self> {
        if path.exists() {
            Self::open(path, base)
        } else {
            Ok(Self::create(path, base, size))
        }
    }

    pub fn mount(&mut self) -> Result<Romfs<SliceFlash<'_>>> {
        let size = self.mem.len() as u32;
        Romfs::start(SliceFlash::new(&mut self.mem), self.base, size)
            .with_context(|| format!("mounting {}", self.path.display()))
    }

    pub fn save(&self) -> Result<()> {
        fs::write(&self.path, &self.mem)
            .with_context(|| format!("writing {}", self.path.display()))
    }
}
