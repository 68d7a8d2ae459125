//! The alpico virtual filesystem.
//!
//! Several storage backends are unified behind one descriptor interface and
//! selected by path prefix:
//!
//! - a [`Backend`] implements the file and directory operations it supports,
//! - the [`Registry`] resolves the backend for a path or descriptor and owns
//!   the table of open entries,
//! - a [`DirHandle`] walks a snapshot of the entries below a directory.
//!
//! Everything runs synchronously on the caller's thread.
#![no_std]

extern crate alloc;

/// Offset in the underlying storage.
pub type Offset = u64;

/// A descriptor is the slot index of an open entry.
pub type Fd = usize;

/// Error returned by all fallible operations.
pub type Error = anyhow::Error;

pub mod backend;
pub mod content;
pub mod directory;
pub mod meta;
mod registry;
pub mod seek;

pub use backend::{Backend, BackendId};
pub use content::{Content, MemoryContent, NativeFile, OpenEntry};
pub use directory::{DirEnt, DirHandle, DirState, DirTag, Listing};
pub use meta::{FileType, Stat};
pub use registry::Registry;
pub use seek::Whence;

/// Check for errors including the location as context.
#[macro_export]
macro_rules! check {
    ($v: expr) => { $v.map_err(|e: $crate::Error| e.context($crate::ErrorCtx((file!(), line!()))))? }
}

/// Convert into an error type including the context.
#[macro_export]
macro_rules! msg2err {
    ($v: expr) => { $crate::Error::msg($v).context($crate::ErrorCtx((file!(), line!()))) }
}

/// A container for file! and line! Error context
pub struct ErrorCtx(pub (&'static str, u32));
impl core::fmt::Display for ErrorCtx {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> Result<(), core::fmt::Error> {
        write!(fmt, "{}:{}", self.0.0, self.0.1)
    }
}

/// The failure classes of the virtual filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VfsError {
    /// No registered backend claims the path.
    NoBackend,
    /// The descriptor is out of range or already closed.
    BadDescriptor,
    /// The backend does not implement the operation.
    Unsupported,
    /// The backend does not know the path.
    NotFound,
    /// A directory operation on a file.
    NotADirectory,
    /// A file operation on a directory.
    IsADirectory,
    /// The backend refuses modifications.
    ReadOnly,
    /// A directory handle was passed to a backend that did not create it.
    BadHandle,
    /// The path cannot be mapped into the backend.
    InvalidPath,
}

impl VfsError {
    /// Recover the failure class from an error, looking through the context.
    pub fn of(err: &Error) -> Option<Self> {
        err.downcast_ref::<Self>().copied()
    }
}

impl core::fmt::Display for VfsError {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> Result<(), core::fmt::Error> {
        let msg = match self {
            VfsError::NoBackend => "no backend for path",
            VfsError::BadDescriptor => "bad file descriptor",
            VfsError::Unsupported => "operation not supported",
            VfsError::NotFound => "no such file or directory",
            VfsError::NotADirectory => "not a directory",
            VfsError::IsADirectory => "is a directory",
            VfsError::ReadOnly => "read-only filesystem",
            VfsError::BadHandle => "foreign directory handle",
            VfsError::InvalidPath => "invalid path",
        };
        fmt.write_str(msg)
    }
}

/// The flags passed to `open`.
///
/// The bit values follow Linux so that raw flags can be passed through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpenFlags(pub i32);

impl OpenFlags {
    pub const RDONLY: Self = Self(0);
    pub const WRONLY: Self = Self(0o1);
    pub const RDWR: Self = Self(0o2);
    pub const CREAT: Self = Self(0o100);
    pub const TRUNC: Self = Self(0o1000);
    pub const APPEND: Self = Self(0o2000);

    const ACCMODE: i32 = 0o3;

    /// Whether all bits of `other` are set.
    pub fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Opened for reading.
    pub fn readable(self) -> bool {
        self.0 & Self::ACCMODE != Self::WRONLY.0
    }

    /// Opened for writing, either write-only, read-write or appending.
    pub fn writable(self) -> bool {
        self.0 & Self::ACCMODE != 0 || self.contains(Self::APPEND)
    }
}

impl core::ops::BitOr for OpenFlags {
    type Output = Self;
    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}
