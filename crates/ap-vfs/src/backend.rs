//! The contract every storage backend implements.

use crate::directory::{DirEnt, DirHandle, DirTag};
use crate::{msg2err, Content, Error, Offset, OpenFlags, Stat, VfsError, Whence};

/// Index of a backend in the registry.  Stable for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackendId(pub usize);

/// A storage backend selected by path prefix.
///
/// Backends opt into the operations they support; the defaults fail with
/// [`VfsError::Unsupported`].  Per-file state lives in the [`Content`] the
/// registry hands in, not in the backend.
pub trait Backend: Send + Sync {
    /// The name used for lookups by name.
    fn name(&self) -> &str;

    /// The prefix of all paths served by this backend, e.g. `/mem`.
    fn path_prefix(&self) -> &str;

    /// Whether the path belongs to this backend.
    fn is_valid_file(&self, path: &str) -> bool {
        path.starts_with(self.path_prefix())
    }

    fn is_readonly(&self) -> bool {
        false
    }

    /// Open a file and return the content for the new entry.
    fn open(&self, path: &str, _flags: OpenFlags) -> Result<Content, Error> {
        log::error!("{}: open {} not supported", self.name(), path);
        Err(msg2err!(VfsError::Unsupported))
    }

    /// Read at the current position.  Returning zero means EOF.
    fn read(&self, _content: &mut Content, _buf: &mut [u8]) -> Result<usize, Error> {
        Err(msg2err!(VfsError::Unsupported))
    }

    fn write(&self, _content: &mut Content, _buf: &[u8]) -> Result<usize, Error> {
        Err(msg2err!(VfsError::Unsupported))
    }

    /// Release backend resources before the content is dropped.
    fn close(&self, _content: &mut Content) -> Result<(), Error> {
        Ok(())
    }

    fn fstat(&self, _content: &Content) -> Result<Stat, Error> {
        Err(msg2err!(VfsError::Unsupported))
    }

    fn stat(&self, _path: &str) -> Result<Stat, Error> {
        Err(msg2err!(VfsError::Unsupported))
    }

    /// Move the position.  Returns the new position.
    fn lseek(&self, _content: &mut Content, _offset: i64, _whence: Whence) -> Result<Offset, Error> {
        Err(msg2err!(VfsError::Unsupported))
    }

    fn tell(&self, _content: &Content) -> Result<Offset, Error> {
        Err(msg2err!(VfsError::Unsupported))
    }

    /// The tag of the directory handles this backend creates.
    fn dir_tag(&self) -> DirTag {
        DirTag(0)
    }

    /// Snapshot the entries below a directory.
    fn opendir(&self, _path: &str) -> Result<DirHandle, Error> {
        Err(msg2err!(VfsError::Unsupported))
    }

    /// Step through the snapshot of a handle created by this backend.
    fn readdir<'h>(&self, dir: &'h mut DirHandle) -> Result<Option<&'h DirEnt>, Error> {
        dir.check_tag(self.dir_tag())?;
        Ok(dir.advance())
    }

    fn closedir(&self, dir: DirHandle) -> Result<(), Error> {
        dir.check_tag(self.dir_tag())
    }

    fn unlink(&self, _path: &str) -> Result<(), Error> {
        Err(msg2err!(VfsError::Unsupported))
    }

    /// Direct read-only access to the bytes of a file.
    fn mem_map(&self, _path: &str) -> Result<&'static [u8], Error> {
        Err(msg2err!(VfsError::Unsupported))
    }
}

/// Strip a prefix and the following slashes from a path.
///
/// Returns `None` if the path does not start with the prefix on a component
/// boundary.
pub fn strip_prefix<'p>(path: &'p str, prefix: &str) -> Option<&'p str> {
    let rest = path.strip_prefix(prefix.trim_end_matches('/'))?;
    if !rest.is_empty() && !rest.starts_with('/') {
        return None;
    }
    Some(rest.trim_start_matches('/'))
}

/// Whether `dir` names a directory containing `name`, comparing whole components.
///
/// The root `/` contains every absolute name.
pub fn is_below(name: &str, dir: &str) -> bool {
    let dir = dir.trim_end_matches('/');
    match name.strip_prefix(dir) {
        Some(rest) => rest.len() > 1 && rest.starts_with('/'),
        None => false,
    }
}
