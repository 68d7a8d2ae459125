//! Support for directories.
//!
//! A backend answers `opendir` with a [`DirHandle`] holding a snapshot of the
//! matching entries.  Files added to the backend afterwards are not visible
//! through an already open handle.

use crate::{meta::FileType, BackendId, Error, VfsError};
use alloc::string::String;
use alloc::vec::Vec;

/// The maximal length of a name in a [`DirEnt`].
pub const MAX_NAME: usize = 256;

/// Identifies the kind of backend that created a handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirTag(pub u32);

/// Progress of a directory traversal.
///
/// Closing consumes the handle, so there is no closed state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirState {
    Opened,
    Iterating,
    Exhausted,
}

/// One entry of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Listing {
    /// The name relative to the opened directory.
    pub name: String,
    pub typ: FileType,
}

impl Listing {
    pub fn new(name: impl Into<String>, typ: FileType) -> Self {
        Self { name: name.into(), typ }
    }
}

/// Directory entry returned by `readdir`.
#[derive(Clone)]
pub struct DirEnt {
    name: [u8; MAX_NAME],
    /// Valid bytes in the name.
    nlen: usize,
    pub typ: FileType,
}

impl DirEnt {
    fn empty() -> Self {
        Self { name: [0; MAX_NAME], nlen: 0, typ: FileType::File }
    }

    /// Fill from a listing.  Longer names are truncated on a char boundary.
    fn fill(&mut self, listing: &Listing) {
        let mut n = core::cmp::min(listing.name.len(), MAX_NAME);
        while !listing.name.is_char_boundary(n) {
            n -= 1;
        }
        self.name[..n].copy_from_slice(&listing.name.as_bytes()[..n]);
        self.nlen = n;
        self.typ = listing.typ;
    }

    pub fn name(&self) -> &str {
        // only filled from complete chars
        core::str::from_utf8(&self.name[..self.nlen]).unwrap_or_default()
    }

    pub fn name_bytes(&self) -> &[u8] {
        &self.name[..self.nlen]
    }

    pub fn d_type(&self) -> u8 {
        self.typ.d_type()
    }
}

impl core::fmt::Debug for DirEnt {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> Result<(), core::fmt::Error> {
        write!(fmt, "DirEnt({:?}, {:?})", self.name(), self.typ)
    }
}

/// A directory traversal session.
pub struct DirHandle {
    /// Set by the registry when the handle is returned.
    pub(crate) owner: Option<BackendId>,
    tag: DirTag,
    state: DirState,
    cursor: usize,
    entries: Vec<Listing>,
    current: DirEnt,
}

impl DirHandle {
    /// Create a handle over a snapshot.
    pub fn new(tag: DirTag, entries: Vec<Listing>) -> Self {
        Self {
            owner: None,
            tag,
            state: DirState::Opened,
            cursor: 0,
            entries,
            current: DirEnt::empty(),
        }
    }

    pub fn tag(&self) -> DirTag {
        self.tag
    }

    /// The backend that created this handle, if it went through a registry.
    pub fn owner(&self) -> Option<BackendId> {
        self.owner
    }

    pub fn state(&self) -> DirState {
        self.state
    }

    /// Fail unless the handle was created with the expected tag.
    pub fn check_tag(&self, expected: DirTag) -> Result<(), Error> {
        if self.tag != expected {
            log::error!("directory handle tag {:#x} does not match {:#x}", self.tag.0, expected.0);
            return Err(crate::msg2err!(VfsError::BadHandle));
        }
        Ok(())
    }

    /// Return the entry at the cursor and advance.
    pub fn advance(&mut self) -> Option<&DirEnt> {
        let Some(listing) = self.entries.get(self.cursor) else {
            log::debug!("readdir: pos={} size={} END", self.cursor, self.entries.len());
            self.state = DirState::Exhausted;
            return None;
        };
        self.cursor += 1;
        self.state = DirState::Iterating;
        self.current.fill(listing);
        Some(&self.current)
    }

    /// The number of entries in the snapshot.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The cursor position.
    pub fn tell(&self) -> usize {
        self.cursor
    }

    /// Move the cursor.  Returns false if the position is beyond the snapshot.
    pub fn seek(&mut self, pos: usize) -> bool {
        if pos > self.entries.len() {
            return false;
        }
        self.cursor = pos;
        self.state = if pos == 0 { DirState::Opened } else { DirState::Iterating };
        true
    }

    pub fn rewind(&mut self) {
        self.seek(0);
    }
}

impl core::fmt::Debug for DirHandle {
    fn fmt(&self, fmt: &mut core::fmt::Formatter<'_>) -> Result<(), core::fmt::Error> {
        write!(
            fmt,
            "DirHandle(tag {:#x}, {:?}, {}/{})",
            self.tag.0,
            self.state,
            self.cursor,
            self.entries.len()
        )
    }
}
