//! Metadata for files.

use super::Offset;

/// Mode bits of a regular file.
pub const S_IFREG: u32 = 0o100000;
/// Mode bits of a directory.
pub const S_IFDIR: u32 = 0o040000;
/// Mask for the file-type bits.
pub const S_IFMT: u32 = 0o170000;

/// Directory entry type of a regular file.
pub const DT_REG: u8 = 8;
/// Directory entry type of a directory.
pub const DT_DIR: u8 = 4;

/// The file-types a backend reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// A plain file.
    File,
    /// A group of files, possibly only inferred from their names.
    Directory,
}

impl FileType {
    /// The `st_mode` bits.
    pub fn mode(self) -> u32 {
        match self {
            FileType::File => S_IFREG,
            FileType::Directory => S_IFDIR,
        }
    }

    /// The `d_type` value.
    pub fn d_type(self) -> u8 {
        match self {
            FileType::File => DT_REG,
            FileType::Directory => DT_DIR,
        }
    }
}

/// The result of `stat` and `fstat`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Stat {
    /// Backend specific id, the descriptor for `fstat`.
    pub id: Offset,
    pub size: Offset,
    pub filetype: FileType,
}

impl Stat {
    pub fn file(size: Offset) -> Self {
        Self { id: 0, size, filetype: FileType::File }
    }

    pub fn directory() -> Self {
        Self { id: 0, size: 0, filetype: FileType::Directory }
    }

    pub fn mode(&self) -> u32 {
        self.filetype.mode()
    }

    pub fn is_dir(&self) -> bool {
        self.mode() & S_IFMT == S_IFDIR
    }

    pub fn is_file(&self) -> bool {
        self.mode() & S_IFMT == S_IFREG
    }
}

impl Default for Stat {
    fn default() -> Self {
        Self::file(0)
    }
}
