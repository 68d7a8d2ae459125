//! Open entries and the backend specific content they own.

use crate::{seek, BackendId, Error, Fd, Offset, Whence};
use alloc::boxed::Box;
use alloc::string::String;

/// A backend-native file handle, e.g. a file on an SD-card or on the host.
pub trait NativeFile: Send {
    /// Read at the current position. Returning zero means EOF.
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, Error>;

    /// Write at the current position.
    fn write(&mut self, buf: &[u8]) -> Result<usize, Error>;

    /// Move to an absolute position.
    fn seek(&mut self, pos: Offset) -> Result<Offset, Error>;

    /// The current position.
    fn position(&self) -> Offset;

    /// The current size.
    fn size(&self) -> Result<Offset, Error>;

    /// Whether the handle refers to a directory.
    fn is_dir(&self) -> bool {
        false
    }

    /// Push buffered data to the device.
    fn flush(&mut self) -> Result<(), Error> {
        Ok(())
    }
}

/// A read cursor over a byte blob, e.g. data stored in flash.
#[derive(Debug, Clone, Copy)]
pub struct MemoryContent {
    data: &'static [u8],
    pos: usize,
}

impl MemoryContent {
    pub fn new(data: &'static [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn data(&self) -> &'static [u8] {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Copy from the cursor and advance it.  Returns zero at or past the end.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        if self.pos >= self.data.len() {
            return 0;
        }
        let n = core::cmp::min(self.data.len() - self.pos, buf.len());
        buf[..n].copy_from_slice(&self.data[self.pos..self.pos + n]);
        self.pos += n;
        n
    }

    /// Move the cursor with saturation.
    pub fn seek(&mut self, offset: i64, whence: Whence) -> Offset {
        let pos = seek::saturate(self.pos as Offset, self.data.len() as Offset, offset, whence);
        self.pos = pos as usize;
        pos
    }
}

/// The backend specific state of an open file.
#[derive(Default)]
pub enum Content {
    /// Nothing attached yet.
    #[default]
    Undefined,
    /// A native handle owned by this entry.
    File(Box<dyn NativeFile>),
    /// A cursor over a byte blob.
    Memory(MemoryContent),
}

impl Content {
    pub fn is_defined(&self) -> bool {
        !matches!(self, Content::Undefined)
    }

    pub fn as_memory_mut(&mut self) -> Option<&mut MemoryContent> {
        match self {
            Content::Memory(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_memory(&self) -> Option<&MemoryContent> {
        match self {
            Content::Memory(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_file_mut(&mut self) -> Option<&mut (dyn NativeFile + 'static)> {
        match self {
            Content::File(f) => Some(f.as_mut()),
            _ => None,
        }
    }

    pub fn as_file(&self) -> Option<&(dyn NativeFile + 'static)> {
        match self {
            Content::File(f) => Some(f.as_ref()),
            _ => None,
        }
    }
}

impl core::fmt::Debug for Content {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> Result<(), core::fmt::Error> {
        match self {
            Content::Undefined => write!(fmt, "Undefined"),
            Content::File(f) => write!(fmt, "File(pos {})", f.position()),
            Content::Memory(m) => write!(fmt, "Memory(pos {}, len {})", m.position(), m.len()),
        }
    }
}

/// One open file.  The content is dropped together with the entry.
#[derive(Debug)]
pub struct OpenEntry {
    /// The backend serving this file.
    pub backend: BackendId,
    /// The path the file was opened with.
    pub path: String,
    /// The slot in the descriptor table.
    pub fd: Fd,
    pub content: Content,
}

impl OpenEntry {
    /// An entry is usable once content is attached.
    pub fn is_valid(&self) -> bool {
        self.content.is_defined()
    }
}
