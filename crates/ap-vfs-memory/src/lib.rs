//! Files backed by byte blobs, e.g. data linked into flash.
//!
//! - read-only: writes transfer nothing, unlink is refused
//! - directories are never stored, only inferred from the file names
//! - `mem_map` hands out the blob itself
#![no_std]

extern crate alloc;

use alloc::string::{String, ToString};
use alloc::vec::Vec;
use ap_vfs::backend::{is_below, strip_prefix};
use ap_vfs::{
    check, msg2err, Backend, Content, DirHandle, DirTag, Error, FileType, Listing, MemoryContent, Offset, OpenFlags,
    Stat, VfsError, Whence,
};

/// The default backend name.
pub const NAME: &str = "FileSystemMemory";

/// The tag of the directory handles of this backend.
pub const DIR_TAG: DirTag = DirTag(12_345_679);

/// A registered blob.
struct MemFile {
    name: String,
    data: &'static [u8],
}

/// Backend serving byte blobs below a prefix.
///
/// Files can be added after the backend was registered.  Open directory
/// handles keep the listing they started with.
pub struct MemoryFs {
    name: String,
    prefix: String,
    files: spin::Mutex<Vec<MemFile>>,
}

impl MemoryFs {
    pub fn new(prefix: &str) -> Self {
        Self::with_name(prefix, NAME)
    }

    pub fn with_name(prefix: &str, name: &str) -> Self {
        Self { name: name.to_string(), prefix: prefix.to_string(), files: spin::Mutex::new(Vec::new()) }
    }

    /// Add a file.  The name has to be below the prefix of this backend.
    pub fn add(&self, name: &str, data: &'static [u8]) -> Result<(), Error> {
        log::info!("add: name='{}' len={}", name, data.len());
        if !strip_prefix(name, &self.prefix).is_some_and(|rest| !rest.is_empty()) {
            log::error!("file {} not valid for {} in {}", name, self.prefix, self.name);
            return Err(msg2err!(VfsError::InvalidPath));
        }
        let mut files = self.files.lock();
        files.push(MemFile { name: name.to_string(), data });
        log::debug!("files: {}", files.len());
        Ok(())
    }

    /// The number of files.
    pub fn len(&self) -> usize {
        self.files.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a file with exactly this name was added.
    pub fn contains(&self, path: &str) -> bool {
        self.find(path).is_some()
    }

    fn find(&self, path: &str) -> Option<&'static [u8]> {
        self.files.lock().iter().find(|f| f.name == path).map(|f| f.data)
    }

    /// A directory exists as long as a file is below it.
    fn is_dir(&self, path: &str) -> bool {
        self.files.lock().iter().any(|f| is_below(&f.name, path))
    }

    fn memory(content: &mut Content) -> Result<&mut MemoryContent, Error> {
        content.as_memory_mut().ok_or_else(|| msg2err!(VfsError::BadDescriptor))
    }
}

impl Backend for MemoryFs {
    fn name(&self) -> &str {
        &self.name
    }

    fn path_prefix(&self) -> &str {
        &self.prefix
    }

    fn is_readonly(&self) -> bool {
        true
    }

    fn open(&self, path: &str, flags: OpenFlags) -> Result<Content, Error> {
        log::trace!("MemoryFs::open({path}, {:#o})", flags.0);
        if let Some(data) = self.find(path) {
            return Ok(Content::Memory(MemoryContent::new(data)));
        }
        if self.is_dir(path) {
            log::warn!("open: {path} is a directory");
            return Err(msg2err!(VfsError::IsADirectory));
        }
        log::warn!("open: no file {path}");
        Err(msg2err!(VfsError::NotFound))
    }

    fn read(&self, content: &mut Content, buf: &mut [u8]) -> Result<usize, Error> {
        let m = check!(Self::memory(content));
        let pos = m.position();
        let n = m.read(buf);
        log::debug!("=> read: pos={} size={} -> {}", pos, buf.len(), n);
        Ok(n)
    }

    /// Blobs cannot change, nothing is transferred.
    fn write(&self, _content: &mut Content, _buf: &[u8]) -> Result<usize, Error> {
        log::warn!("write not supported by {}", self.name);
        Ok(0)
    }

    fn fstat(&self, content: &Content) -> Result<Stat, Error> {
        let m = content.as_memory().ok_or_else(|| msg2err!(VfsError::BadDescriptor))?;
        Ok(Stat::file(m.len() as Offset))
    }

    fn stat(&self, path: &str) -> Result<Stat, Error> {
        if let Some(data) = self.find(path) {
            log::debug!("=> stat path={} -> size={}", path, data.len());
            return Ok(Stat::file(data.len() as Offset));
        }
        if self.is_dir(path) {
            return Ok(Stat::directory());
        }
        Err(msg2err!(VfsError::NotFound))
    }

    fn lseek(&self, content: &mut Content, offset: i64, whence: Whence) -> Result<Offset, Error> {
        Ok(check!(Self::memory(content)).seek(offset, whence))
    }

    fn tell(&self, content: &Content) -> Result<Offset, Error> {
        let m = content.as_memory().ok_or_else(|| msg2err!(VfsError::BadDescriptor))?;
        Ok(m.position() as Offset)
    }

    fn dir_tag(&self) -> DirTag {
        DIR_TAG
    }

    fn opendir(&self, path: &str) -> Result<DirHandle, Error> {
        log::debug!("MemoryFs::opendir({path})");
        let files = self.files.lock();
        if files.iter().any(|f| f.name == path) {
            return Err(msg2err!(VfsError::NotADirectory));
        }
        let skip = path.trim_end_matches('/').len() + 1;
        let entries: Vec<Listing> = files
            .iter()
            .filter(|f| is_below(&f.name, path))
            .map(|f| Listing::new(&f.name[skip..], FileType::File))
            .collect();
        log::debug!("=> opendir: {} files", entries.len());
        Ok(DirHandle::new(DIR_TAG, entries))
    }

    fn unlink(&self, path: &str) -> Result<(), Error> {
        log::error!("unlink {path} not supported");
        Err(msg2err!(VfsError::Unsupported))
    }

    fn mem_map(&self, path: &str) -> Result<&'static [u8], Error> {
        self.find(path).ok_or_else(|| msg2err!(VfsError::NotFound))
    }
}
