//! The registry resolves backends and owns the open files.

use crate::directory::{DirEnt, DirHandle};
use crate::{msg2err, Backend, BackendId, Content, Error, Fd, Offset, OpenEntry, OpenFlags, Stat, VfsError, Whence};
use alloc::string::ToString;
use alloc::sync::Arc;
use alloc::vec::Vec;

/// Backends in registration order and the shared descriptor table.
///
/// Prefix dispatch is first-match-wins, so an earlier backend shadows a
/// later one with an overlapping prefix.  A closed descriptor leaves an
/// empty slot which the next open reuses.
pub struct Registry {
    backends: Vec<Arc<dyn Backend>>,
    open_files: Vec<Option<OpenEntry>>,
    /// Consulted for directory searches no prefix matches.
    search: Option<BackendId>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for Registry {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> Result<(), core::fmt::Error> {
        write!(
            fmt,
            "Registry({} backends, {}/{} open, search {:?})",
            self.backends.len(),
            self.open_count(),
            self.open_files.len(),
            self.search
        )
    }
}

impl Registry {
    pub const fn new() -> Self {
        Self { backends: Vec::new(), open_files: Vec::new(), search: None }
    }

    /// Register a backend.  Duplicate names are accepted.
    pub fn add(&mut self, backend: Arc<dyn Backend>) -> BackendId {
        let id = BackendId(self.backends.len());
        log::info!("add {} at {} as {:?}", backend.name(), backend.path_prefix(), id);
        self.backends.push(backend);
        id
    }

    pub fn backend(&self, id: BackendId) -> Option<&dyn Backend> {
        self.backends.get(id.0).map(|b| b.as_ref())
    }

    /// All backends in registration order.
    pub fn backends(&self) -> impl Iterator<Item = (BackendId, &dyn Backend)> {
        self.backends.iter().enumerate().map(|(i, b)| (BackendId(i), b.as_ref()))
    }

    /// The first backend claiming the path.
    pub fn resolve_by_path(&self, path: &str) -> Option<BackendId> {
        log::trace!("resolve_by_path({path})");
        let found = self.backends().find(|(_, b)| b.is_valid_file(path));
        match found {
            Some((id, b)) => {
                log::debug!("-> {}", b.name());
                Some(id)
            }
            None => {
                log::error!("no backend for {path}");
                None
            }
        }
    }

    /// The backend serving an open descriptor.
    pub fn resolve_by_descriptor(&self, fd: Fd) -> Option<BackendId> {
        let res = self.get_entry(fd).map(|e| e.backend);
        if res.is_none() {
            log::error!("no backend for descriptor {fd}");
        }
        res
    }

    pub fn resolve_by_name(&self, name: &str) -> Option<BackendId> {
        let res = self.backends().find(|(_, b)| b.name() == name).map(|(id, _)| id);
        if res.is_none() {
            if self.backends.is_empty() {
                log::debug!("no backends available");
            } else {
                log::error!("no backend named {name}");
            }
        }
        res
    }

    /// Allocate an entry without content.
    ///
    /// The backend is resolved from the path unless given.  The lowest free
    /// slot is reused, otherwise the table grows.
    pub fn open_file(&mut self, path: &str, backend: Option<BackendId>) -> Option<Fd> {
        let backend = match backend {
            Some(id) if id.0 < self.backends.len() => id,
            Some(id) => {
                log::error!("open_file: unknown {id:?} for {path}");
                return None;
            }
            None => self.resolve_by_path(path)?,
        };
        let fd = match self.open_files.iter().position(Option::is_none) {
            Some(idx) => idx,
            None => {
                self.open_files.push(None);
                self.open_files.len() - 1
            }
        };
        self.open_files[fd] = Some(OpenEntry { backend, path: path.to_string(), fd, content: Content::Undefined });
        log::debug!("open_file {path} => fd {fd}, total slots {}", self.open_files.len());
        Some(fd)
    }

    /// Drop the entry and its content.  Returns false for an empty slot.
    pub fn close_file(&mut self, fd: Fd) -> bool {
        match self.open_files.get_mut(fd).and_then(Option::take) {
            Some(entry) => {
                log::debug!("close_file {} fd {fd}", entry.path);
                true
            }
            None => {
                log::error!("close_file: no entry for {fd}");
                false
            }
        }
    }

    pub fn get_entry(&self, fd: Fd) -> Option<&OpenEntry> {
        self.open_files.get(fd).and_then(Option::as_ref)
    }

    pub fn get_entry_mut(&mut self, fd: Fd) -> Option<&mut OpenEntry> {
        self.open_files.get_mut(fd).and_then(Option::as_mut)
    }

    /// The number of slots including the empty ones.
    pub fn len(&self) -> usize {
        self.open_files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.open_files.is_empty()
    }

    /// The number of live entries.
    pub fn open_count(&self) -> usize {
        self.open_files.iter().filter(|e| e.is_some()).count()
    }

    /// Select the backend for directory searches.  The last call wins.
    pub fn set_default_backend(&mut self, id: BackendId) {
        log::debug!("default backend {id:?}");
        self.search = Some(id);
    }

    pub fn default_backend(&self) -> Option<BackendId> {
        self.search
    }

    /// Resolve the backend or fail with `NoBackend`.
    fn by_path(&self, path: &str) -> Result<(BackendId, &dyn Backend), Error> {
        let id = self.resolve_by_path(path).ok_or_else(|| msg2err!(VfsError::NoBackend))?;
        Ok((id, self.backends[id.0].as_ref()))
    }

    fn entry(&self, fd: Fd) -> Result<(&dyn Backend, &OpenEntry), Error> {
        let entry = self.get_entry(fd).ok_or_else(|| {
            log::error!("no entry for descriptor {fd}");
            msg2err!(VfsError::BadDescriptor)
        })?;
        Ok((self.backends[entry.backend.0].as_ref(), entry))
    }

    fn entry_mut(&mut self, fd: Fd) -> Result<(&dyn Backend, &mut OpenEntry), Error> {
        let Some(Some(entry)) = self.open_files.get_mut(fd) else {
            log::error!("no entry for descriptor {fd}");
            return Err(msg2err!(VfsError::BadDescriptor));
        };
        Ok((self.backends[entry.backend.0].as_ref(), entry))
    }

    /// Open a file on the backend claiming the path.
    ///
    /// A descriptor is only allocated once the backend produced content.
    pub fn open(&mut self, path: &str, flags: OpenFlags) -> Result<Fd, Error> {
        log::trace!("open({path}, {:#o})", flags.0);
        let (id, backend) = self.by_path(path)?;
        let content = backend.open(path, flags)?;
        let fd = self.open_file(path, Some(id)).ok_or_else(|| msg2err!(VfsError::NoBackend))?;
        if let Some(entry) = self.get_entry_mut(fd) {
            entry.content = content;
        }
        Ok(fd)
    }

    /// Let the backend release the content, then free the slot.
    pub fn close(&mut self, fd: Fd) -> Result<(), Error> {
        log::trace!("close({fd})");
        let (backend, entry) = self.entry_mut(fd)?;
        let res = backend.close(&mut entry.content);
        self.close_file(fd);
        res
    }

    pub fn read(&mut self, fd: Fd, buf: &mut [u8]) -> Result<usize, Error> {
        let (backend, entry) = self.entry_mut(fd)?;
        let n = backend.read(&mut entry.content, buf)?;
        log::trace!("read fd={fd} size={} -> {n}", buf.len());
        Ok(n)
    }

    pub fn write(&mut self, fd: Fd, buf: &[u8]) -> Result<usize, Error> {
        let (backend, entry) = self.entry_mut(fd)?;
        let n = backend.write(&mut entry.content, buf)?;
        log::trace!("write fd={fd} size={} -> {n}", buf.len());
        Ok(n)
    }

    pub fn lseek(&mut self, fd: Fd, offset: i64, whence: Whence) -> Result<Offset, Error> {
        let (backend, entry) = self.entry_mut(fd)?;
        backend.lseek(&mut entry.content, offset, whence)
    }

    pub fn tell(&self, fd: Fd) -> Result<Offset, Error> {
        let (backend, entry) = self.entry(fd)?;
        backend.tell(&entry.content)
    }

    /// Stat an open file.  The id is the descriptor.
    pub fn fstat(&self, fd: Fd) -> Result<Stat, Error> {
        let (backend, entry) = self.entry(fd)?;
        let mut st = backend.fstat(&entry.content)?;
        st.id = fd as Offset;
        Ok(st)
    }

    pub fn stat(&self, path: &str) -> Result<Stat, Error> {
        let (_, backend) = self.by_path(path)?;
        backend.stat(path)
    }

    /// Open a directory on the backend claiming the path, or on the default
    /// backend if no prefix matches.
    pub fn opendir(&self, path: &str) -> Result<DirHandle, Error> {
        log::trace!("opendir({path})");
        let id = self
            .backends()
            .find(|(_, b)| b.is_valid_file(path))
            .map(|(id, _)| id)
            .or(self.search)
            .ok_or_else(|| {
                log::error!("no backend for directory {path}");
                msg2err!(VfsError::NoBackend)
            })?;
        let mut dir = self.backends[id.0].opendir(path)?;
        dir.owner = Some(id);
        log::debug!("opendir {path} => {} entries", dir.len());
        Ok(dir)
    }

    pub fn readdir<'h>(&self, dir: &'h mut DirHandle) -> Result<Option<&'h DirEnt>, Error> {
        let backend = self.owner(dir)?;
        backend.readdir(dir)
    }

    pub fn closedir(&self, dir: DirHandle) -> Result<(), Error> {
        let backend = self.owner(&dir)?;
        backend.closedir(dir)
    }

    fn owner(&self, dir: &DirHandle) -> Result<&dyn Backend, Error> {
        dir.owner.and_then(|id| self.backend(id)).ok_or_else(|| {
            log::error!("directory handle without owner {dir:?}");
            msg2err!(VfsError::BadHandle)
        })
    }

    pub fn unlink(&self, path: &str) -> Result<(), Error> {
        let (_, backend) = self.by_path(path)?;
        if backend.is_readonly() {
            log::warn!("unlink {path} on read-only {}", backend.name());
            return Err(msg2err!(VfsError::ReadOnly));
        }
        backend.unlink(path)
    }

    pub fn mem_map(&self, path: &str) -> Result<&'static [u8], Error> {
        let (_, backend) = self.by_path(path)?;
        backend.mem_map(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{DirTag, Listing};
    use crate::{FileType, NativeFile};
    use alloc::boxed::Box;
    use alloc::format;
    use alloc::vec;
    use core::sync::atomic::{AtomicUsize, Ordering};

    const TAG: DirTag = DirTag(0x7e57);

    /// A native file counting its drops.
    struct Counted {
        pos: Offset,
        drops: Arc<AtomicUsize>,
    }

    impl NativeFile for Counted {
        fn read(&mut self, _buf: &mut [u8]) -> Result<usize, Error> {
            Ok(0)
        }
        fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
            self.pos += buf.len() as Offset;
            Ok(buf.len())
        }
        fn seek(&mut self, pos: Offset) -> Result<Offset, Error> {
            self.pos = pos;
            Ok(pos)
        }
        fn position(&self) -> Offset {
            self.pos
        }
        fn size(&self) -> Result<Offset, Error> {
            Ok(self.pos)
        }
    }

    impl Drop for Counted {
        fn drop(&mut self) {
            self.drops.fetch_add(1, Ordering::SeqCst);
        }
    }

    struct Fake {
        name: &'static str,
        prefix: &'static str,
        drops: Arc<AtomicUsize>,
    }

    impl Fake {
        fn new(name: &'static str, prefix: &'static str) -> Arc<Self> {
            Arc::new(Self { name, prefix, drops: Arc::new(AtomicUsize::new(0)) })
        }
    }

    impl Backend for Fake {
        fn name(&self) -> &str {
            self.name
        }
        fn path_prefix(&self) -> &str {
            self.prefix
        }
        fn open(&self, path: &str, _flags: OpenFlags) -> Result<Content, Error> {
            if path.ends_with("missing") {
                return Err(msg2err!(VfsError::NotFound));
            }
            Ok(Content::File(Box::new(Counted { pos: 0, drops: self.drops.clone() })))
        }
        fn write(&self, content: &mut Content, buf: &[u8]) -> Result<usize, Error> {
            content.as_file_mut().ok_or_else(|| msg2err!(VfsError::BadDescriptor))?.write(buf)
        }
        fn fstat(&self, content: &Content) -> Result<Stat, Error> {
            let f = content.as_file().ok_or_else(|| msg2err!(VfsError::BadDescriptor))?;
            Ok(Stat::file(f.size()?))
        }
        fn dir_tag(&self) -> DirTag {
            TAG
        }
        fn opendir(&self, _path: &str) -> Result<DirHandle, Error> {
            Ok(DirHandle::new(TAG, vec![Listing::new(self.name, FileType::File)]))
        }
    }

    #[test]
    fn no_backend_allocates_nothing() {
        let mut reg = Registry::new();
        reg.add(Fake::new("x", "/x"));
        let err = reg.open("/nowhere/file", OpenFlags::RDONLY).unwrap_err();
        assert_eq!(VfsError::of(&err), Some(VfsError::NoBackend));
        let err = reg.open("/x/missing", OpenFlags::RDONLY).unwrap_err();
        assert_eq!(VfsError::of(&err), Some(VfsError::NotFound));
        assert_eq!(reg.len(), 0);
        assert!(reg.open_file("/nowhere/file", None).is_none());
        assert!(reg.open_file("/x/a", Some(BackendId(7))).is_none());
    }

    #[test]
    fn lowest_free_slot_is_reused() {
        let mut reg = Registry::new();
        reg.add(Fake::new("x", "/x"));
        let a = reg.open("/x/a", OpenFlags::RDONLY).unwrap();
        let b = reg.open("/x/b", OpenFlags::RDONLY).unwrap();
        let c = reg.open("/x/c", OpenFlags::RDONLY).unwrap();
        assert_eq!((a, b, c), (0, 1, 2));
        reg.close(b).unwrap();
        reg.close(a).unwrap();
        assert_eq!(reg.len(), 3);
        assert_eq!(reg.open("/x/d", OpenFlags::RDONLY).unwrap(), a);
        assert_eq!(reg.open("/x/e", OpenFlags::RDONLY).unwrap(), b);
        assert_eq!(reg.open("/x/f", OpenFlags::RDONLY).unwrap(), 3);
        assert_eq!(reg.get_entry(c).map(|e| e.path.as_str()), Some("/x/c"));
        assert_eq!(reg.open_count(), 4);
    }

    #[test]
    fn first_registered_prefix_wins() {
        let mut reg = Registry::new();
        let x = reg.add(Fake::new("x", "/a"));
        let y = reg.add(Fake::new("y", "/a/b"));
        assert_eq!(reg.resolve_by_path("/a/b/file"), Some(x));
        assert_eq!(reg.resolve_by_path("/a/other"), Some(x));
        assert_eq!(reg.resolve_by_name("y"), Some(y));
        assert_eq!(reg.resolve_by_name("z"), None);
        let fd = reg.open("/a/b/file", OpenFlags::RDONLY).unwrap();
        assert_eq!(reg.resolve_by_descriptor(fd), Some(x));
    }

    #[test]
    fn content_dropped_once_on_close() {
        let mut reg = Registry::new();
        let fake = Fake::new("x", "/x");
        let drops = fake.drops.clone();
        reg.add(fake);
        let fd = reg.open("/x/a", OpenFlags::WRONLY).unwrap();
        assert_eq!(reg.write(fd, b"abc").unwrap(), 3);
        assert_eq!(reg.fstat(fd).unwrap(), Stat { id: fd as Offset, size: 3, filetype: FileType::File });
        assert_eq!(drops.load(Ordering::SeqCst), 0);
        reg.close(fd).unwrap();
        assert_eq!(drops.load(Ordering::SeqCst), 1);
        let err = reg.close(fd).unwrap_err();
        assert_eq!(VfsError::of(&err), Some(VfsError::BadDescriptor));
        assert!(!reg.close_file(fd));
        assert_eq!(drops.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn invalid_descriptors() {
        let mut reg = Registry::new();
        reg.add(Fake::new("x", "/x"));
        assert!(reg.get_entry(0).is_none());
        assert!(reg.resolve_by_descriptor(3).is_none());
        let err = reg.read(5, &mut [0u8; 4]).unwrap_err();
        assert_eq!(VfsError::of(&err), Some(VfsError::BadDescriptor));
        let fd = reg.open("/x/a", OpenFlags::RDONLY).unwrap();
        let err = reg.lseek(fd, 0, Whence::Set).unwrap_err();
        assert_eq!(VfsError::of(&err), Some(VfsError::Unsupported));
    }

    #[test]
    fn debug_summary() {
        let mut reg = Registry::new();
        let x = reg.add(Fake::new("x", "/x"));
        reg.set_default_backend(x);
        let a = reg.open("/x/a", OpenFlags::RDONLY).unwrap();
        reg.open("/x/b", OpenFlags::RDONLY).unwrap();
        reg.close(a).unwrap();
        assert_eq!(format!("{reg:?}"), "Registry(1 backends, 1/2 open, search Some(BackendId(0)))");
        let res: Result<Registry, Error> = Err(msg2err!(VfsError::NoBackend));
        assert_eq!(VfsError::of(&res.unwrap_err()), Some(VfsError::NoBackend));
    }

    #[test]
    fn entry_without_content() {
        let mut reg = Registry::new();
        reg.add(Fake::new("x", "/x"));
        let fd = reg.open_file("/x/raw", None).unwrap();
        assert!(reg.get_entry(fd).is_some_and(|e| !e.is_valid()));
        assert!(reg.close_file(fd));
        assert!(reg.get_entry(fd).is_none());
    }

    #[test]
    fn directories_dispatch_to_owner() {
        let mut reg = Registry::new();
        reg.add(Fake::new("x", "/x"));
        let y = reg.add(Fake::new("y", "/y"));
        assert!(reg.opendir("/z").is_err());
        reg.set_default_backend(y);
        assert_eq!(reg.default_backend(), Some(y));

        let mut dir = reg.opendir("/z").unwrap();
        assert_eq!(dir.owner(), Some(y));
        assert_eq!(reg.readdir(&mut dir).unwrap().map(|e| e.name() == "y"), Some(true));
        assert!(reg.readdir(&mut dir).unwrap().is_none());
        reg.closedir(dir).unwrap();

        let mut foreign = DirHandle::new(DirTag(1), vec![]);
        let err = reg.readdir(&mut foreign).map(|_| ()).unwrap_err();
        assert_eq!(VfsError::of(&err), Some(VfsError::BadHandle));
    }
}
