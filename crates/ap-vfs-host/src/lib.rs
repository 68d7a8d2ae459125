//! Host specific backend.
//!
//! A prefix like `/sd` is mapped onto a directory of the host, which stands
//! in for an SD-card or a platform filesystem.  Open files carry the native
//! file as content.

use ap_vfs::backend::strip_prefix;
use ap_vfs::seek::saturate;
use ap_vfs::{
    msg2err, Backend, Content, DirHandle, DirTag, Error, FileType, Listing, NativeFile, Offset, OpenFlags,
    Stat, VfsError, Whence,
};
use std::fs::{File, OpenOptions};
use std::os::fd::AsRawFd;
use std::path::{Component, Path, PathBuf};

/// The default backend name.
pub const NAME: &str = "FileSystemHost";

/// The tag of the directory handles of this backend.
pub const DIR_TAG: DirTag = DirTag(12_345_680);

/// Convert an io error, keeping a missing file recognizable.
fn io_error(err: std::io::Error) -> Error {
    match err.kind() {
        std::io::ErrorKind::NotFound => msg2err!(VfsError::NotFound).context(err),
        _ => Error::from(err),
    }
}

/// A host file with its own position.
pub struct HostFile {
    file: File,
    pos: Offset,
    dir: bool,
}

impl HostFile {
    fn new(file: File, pos: Offset) -> Result<Self, Error> {
        let dir = file.metadata().map_err(io_error)?.is_dir();
        Ok(Self { file, pos, dir })
    }
}

impl NativeFile for HostFile {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error> {
        if self.dir {
            return Err(msg2err!(VfsError::IsADirectory));
        }
        let res = unsafe {
            libc::pread(
                self.file.as_raw_fd(),
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                self.pos as libc::off_t,
            )
        };
        if res == -1 {
            return Err(std::io::Error::last_os_error().into());
        }
        self.pos += res as Offset;
        Ok(res as usize)
    }

    fn write(&mut self, buf: &[u8]) -> Result<usize, Error> {
        let res = unsafe {
            libc::pwrite(
                self.file.as_raw_fd(),
                buf.as_ptr() as *const libc::c_void,
                buf.len(),
                self.pos as libc::off_t,
            )
        };
        if res == -1 {
            return Err(std::io::Error::last_os_error().into());
        }
        self.pos += res as Offset;
        Ok(res as usize)
    }

    fn seek(&mut self, pos: Offset) -> Result<Offset, Error> {
        self.pos = pos;
        Ok(pos)
    }

    fn position(&self) -> Offset {
        self.pos
    }

    fn size(&self) -> Result<Offset, Error> {
        Ok(self.file.metadata().map_err(io_error)?.len())
    }

    fn is_dir(&self) -> bool {
        self.dir
    }

    fn flush(&mut self) -> Result<(), Error> {
        if self.dir {
            return Ok(());
        }
        Ok(self.file.sync_data()?)
    }
}

/// Files below a host directory.
pub struct HostFs {
    name: String,
    prefix: String,
    root: PathBuf,
    readonly: bool,
}

impl HostFs {
    pub fn new(prefix: &str, root: impl Into<PathBuf>) -> Self {
        Self { name: NAME.to_string(), prefix: prefix.to_string(), root: root.into(), readonly: false }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    /// Refuse all modifications.
    pub fn readonly(mut self, readonly: bool) -> Self {
        self.readonly = readonly;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a path onto the host.  Parent components are rejected.
    fn host_path(&self, path: &str) -> Result<PathBuf, Error> {
        let Some(rest) = strip_prefix(path, &self.prefix) else {
            log::error!("{path} is not below {}", self.prefix);
            return Err(msg2err!(VfsError::InvalidPath));
        };
        let rel = Path::new(rest);
        if rel.components().any(|c| !matches!(c, Component::Normal(_))) {
            log::error!("{path} escapes {}", self.prefix);
            return Err(msg2err!(VfsError::InvalidPath));
        }
        Ok(self.root.join(rel))
    }

    fn file(content: &mut Content) -> Result<&mut (dyn NativeFile + 'static), Error> {
        content.as_file_mut().ok_or_else(|| msg2err!(VfsError::BadDescriptor))
    }
}

impl Backend for HostFs {
    fn name(&self) -> &str {
        &self.name
    }

    fn path_prefix(&self) -> &str {
        &self.prefix
    }

    fn is_readonly(&self) -> bool {
        self.readonly
    }

    fn open(&self, path: &str, flags: OpenFlags) -> Result<Content, Error> {
        log::trace!("HostFs::open({path}, {:#o})", flags.0);
        let host = self.host_path(path)?;
        let append = flags.contains(OpenFlags::APPEND);
        let modifies = flags.writable() || flags.contains(OpenFlags::CREAT) || flags.contains(OpenFlags::TRUNC);
        if self.readonly && modifies {
            log::warn!("open {path} for writing on read-only {}", self.name);
            return Err(msg2err!(VfsError::ReadOnly));
        }
        let file = OpenOptions::new()
            .read(flags.readable())
            .write(flags.writable() && !append)
            .append(append)
            .create(flags.contains(OpenFlags::CREAT))
            .truncate(flags.contains(OpenFlags::TRUNC))
            .open(&host)
            .map_err(|e| {
                log::error!("cannot open {}: {e}", host.display());
                io_error(e)
            })?;
        let mut native = HostFile::new(file, 0)?;
        if append {
            native.pos = native.size()?;
        }
        Ok(Content::File(Box::new(native)))
    }

    fn read(&self, content: &mut Content, buf: &mut [u8]) -> Result<usize, Error> {
        Self::file(content)?.read(buf)
    }

    fn write(&self, content: &mut Content, buf: &[u8]) -> Result<usize, Error> {
        if self.readonly {
            return Err(msg2err!(VfsError::ReadOnly));
        }
        Self::file(content)?.write(buf)
    }

    fn close(&self, content: &mut Content) -> Result<(), Error> {
        Self::file(content)?.flush()
    }

    fn fstat(&self, content: &Content) -> Result<Stat, Error> {
        let file = content.as_file().ok_or_else(|| msg2err!(VfsError::BadDescriptor))?;
        if file.is_dir() {
            return Ok(Stat::directory());
        }
        Ok(Stat::file(file.size()?))
    }

    fn stat(&self, path: &str) -> Result<Stat, Error> {
        let meta = std::fs::metadata(self.host_path(path)?).map_err(io_error)?;
        if meta.is_dir() {
            return Ok(Stat::directory());
        }
        Ok(Stat::file(meta.len()))
    }

    fn lseek(&self, content: &mut Content, offset: i64, whence: Whence) -> Result<Offset, Error> {
        let file = Self::file(content)?;
        let pos = saturate(file.position(), file.size()?, offset, whence);
        file.seek(pos)
    }

    fn tell(&self, content: &Content) -> Result<Offset, Error> {
        let file = content.as_file().ok_or_else(|| msg2err!(VfsError::BadDescriptor))?;
        Ok(file.position())
    }

    fn dir_tag(&self) -> DirTag {
        DIR_TAG
    }

    fn opendir(&self, path: &str) -> Result<DirHandle, Error> {
        let host = self.host_path(path)?;
        log::debug!("HostFs::opendir {}", host.display());
        if !std::fs::metadata(&host).map_err(io_error)?.is_dir() {
            log::warn!("file not a directory {}", host.display());
            return Err(msg2err!(VfsError::NotADirectory));
        }
        let mut entries = Vec::new();
        for entry in std::fs::read_dir(&host).map_err(io_error)? {
            let entry = entry?;
            let typ = if entry.file_type()?.is_dir() { FileType::Directory } else { FileType::File };
            entries.push(Listing::new(entry.file_name().to_string_lossy(), typ));
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(DirHandle::new(DIR_TAG, entries))
    }

    fn unlink(&self, path: &str) -> Result<(), Error> {
        if self.readonly {
            return Err(msg2err!(VfsError::ReadOnly));
        }
        std::fs::remove_file(self.host_path(path)?).map_err(io_error)
    }
}
