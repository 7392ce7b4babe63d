use core::fmt;

/// Status taxonomy for every filesystem operation.
///
/// `Eof` and `NoSpace` double as boundary conditions: reads and writes report
/// a partial transfer count and park the code on the file handle instead of
/// failing outright.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Error {
    /// No entry with that name under the directory.
    NoEntry,
    /// Entry table region is full.
    NoFreeEntries,
    /// No free data sector left.
    NoSpace,
    /// Destination name already exists.
    FileExists,
    /// Name does not fit the fixed on-disk field.
    TooBig,
    /// Read cursor reached end of file.
    Eof,
    /// Operation not valid for the handle's mode or cursor state.
    InvalidOp,
    /// All 16 directory ids are in use.
    DirLimit,
    /// Invalid or cyclic directory operation.
    DirInvalid,
    /// Directory still holds live entries.
    DirNotEmpty,
}

impl Error {
    pub fn as_str(&self) -> &'static str {
        match self {
            Error::NoEntry => "No list entry",
            Error::NoFreeEntries => "No free list entries",
            Error::NoSpace => "No free space",
            Error::FileExists => "File exists",
            Error::TooBig => "File data too long",
            Error::Eof => "End of file",
            Error::InvalidOp => "Invalid operation",
            Error::DirLimit => "Directory limit reached",
            Error::DirInvalid => "Invalid directory operation",
            Error::DirNotEmpty => "Directory not empty",
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::error::Error for Error {}
