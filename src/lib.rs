//! Flash-resident filesystem for retro-cart firmware.
//!
//! A purpose-built, sector-granular file store living inside a raw NOR/QSPI
//! flash region. Storage is addressed only through the [`flash::SectorFlash`]
//! primitives (erase a sector, program a sector, read a byte range); there is
//! no heap, no OS and no wear leveling. On-flash layout:
//!
//! ```text
//! [firmware region][entry table][sector map][data sectors...]
//! ```
//!
//! The entry table is a flat array of fixed 64-byte records with tombstoned
//! deletion; the sector map is one `u16` slot per sector holding the next
//! sector of the owning file's chain. Both are mirrored in RAM inside a
//! [`Romfs`] instance and rewritten in full on every structural mutation.
//!
//! Everything is single-threaded, synchronous and blocking. Callers needing
//! exclusion while a transport is mid-command must serialize externally.

#![cfg_attr(not(test), no_std)]

mod dir;
mod entry;
mod error;
mod file;
mod fs;
mod layout;
mod map;
mod path;

pub mod flash;


pub use dir::Dir;
pub use entry::{Entry, FileType, Mode};
pub use error::Error;
pub use file::{File, SeekFrom};
pub use fs::Romfs;
pub use layout::Layout;

/// Erase/program granularity of the flash device, in bytes.
pub const SECTOR_SIZE: usize = 4096;

/// Fixed on-disk name field width, NUL terminator included.
pub const MAX_NAME_LEN: usize = 54;

/// Directory id space is 4 bits, root included. A genuine ceiling of the
/// on-disk format, not a tunable.
pub const DIR_MAX: usize = 16;
