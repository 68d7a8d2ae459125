//! POSIX style file calls.
//!
//! The calls translate conventional signatures into operations on one
//! process-wide [`Registry`].  Failures are logged and reported as `-1` or
//! `None`; nothing else is observable.
//!
//! The registry is composed once at start-up, either by [`install`]ing a
//! prepared one or by [`add`]ing backends in order.  Calls are not reentrant:
//! the closure given to [`with_registry`] must not call back into this crate.
#![no_std]

extern crate alloc;

use alloc::sync::Arc;
use ap_vfs::{Backend, BackendId, DirEnt, DirHandle, Error, Fd, OpenFlags, Registry, Stat, Whence};

mod stream;
pub use stream::{fopen, FileStream};

pub use ap_vfs::seek::{SEEK_CUR, SEEK_END, SEEK_SET};

static REGISTRY: spin::Mutex<Registry> = spin::Mutex::new(Registry::new());

/// Replace the process-wide registry and return the previous one.
pub fn install(registry: Registry) -> Registry {
    core::mem::replace(&mut *REGISTRY.lock(), registry)
}

/// Run a closure on the process-wide registry.
pub fn with_registry<R>(f: impl FnOnce(&mut Registry) -> R) -> R {
    f(&mut REGISTRY.lock())
}

/// Register a backend.  Registration order is dispatch order.
pub fn add(backend: Arc<dyn Backend>) -> BackendId {
    REGISTRY.lock().add(backend)
}

/// Select the backend for directory searches no prefix matches.
pub fn set_default_backend(id: BackendId) {
    REGISTRY.lock().set_default_backend(id)
}

fn fail(op: &str, err: Error) {
    log::warn!("{op}: {err:#}");
}

fn descriptor(fd: i32) -> Option<Fd> {
    let res = Fd::try_from(fd).ok();
    if res.is_none() {
        log::error!("invalid descriptor {fd}");
    }
    res
}

/// Open a file and return its descriptor or -1.
pub fn open(path: &str, flags: i32, _mode: u32) -> i32 {
    match REGISTRY.lock().open(path, OpenFlags(flags)) {
        Ok(fd) => i32::try_from(fd).unwrap_or(-1),
        Err(e) => {
            fail("open", e);
            -1
        }
    }
}

pub fn close(fd: i32) -> i32 {
    let Some(fd) = descriptor(fd) else { return -1 };
    match REGISTRY.lock().close(fd) {
        Ok(()) => 0,
        Err(e) => {
            fail("close", e);
            -1
        }
    }
}

/// Read into the buffer.  Zero means EOF.
pub fn read(fd: i32, buf: &mut [u8]) -> isize {
    let Some(fd) = descriptor(fd) else { return -1 };
    match REGISTRY.lock().read(fd, buf) {
        Ok(n) => n as isize,
        Err(e) => {
            fail("read", e);
            -1
        }
    }
}

/// Write the buffer.  Read-only blobs report zero bytes written.
pub fn write(fd: i32, buf: &[u8]) -> isize {
    let Some(fd) = descriptor(fd) else { return -1 };
    match REGISTRY.lock().write(fd, buf) {
        Ok(n) => n as isize,
        Err(e) => {
            fail("write", e);
            -1
        }
    }
}

/// Move the position and return it.  Out of range targets saturate.
pub fn lseek(fd: i32, offset: i64, whence: i32) -> i64 {
    let Some(fd) = descriptor(fd) else { return -1 };
    let Some(whence) = Whence::from_raw(whence) else {
        log::error!("lseek: invalid whence {whence}");
        return -1;
    };
    match REGISTRY.lock().lseek(fd, offset, whence) {
        Ok(pos) => i64::try_from(pos).unwrap_or(i64::MAX),
        Err(e) => {
            fail("lseek", e);
            -1
        }
    }
}

pub fn tell(fd: i32) -> i64 {
    let Some(fd) = descriptor(fd) else { return -1 };
    match REGISTRY.lock().tell(fd) {
        Ok(pos) => i64::try_from(pos).unwrap_or(i64::MAX),
        Err(e) => {
            fail("tell", e);
            -1
        }
    }
}

pub fn fstat(fd: i32, st: &mut Stat) -> i32 {
    let Some(fd) = descriptor(fd) else { return -1 };
    match REGISTRY.lock().fstat(fd) {
        Ok(res) => {
            *st = res;
            0
        }
        Err(e) => {
            fail("fstat", e);
            -1
        }
    }
}

pub fn stat(path: &str, st: &mut Stat) -> i32 {
    match REGISTRY.lock().stat(path) {
        Ok(res) => {
            *st = res;
            0
        }
        Err(e) => {
            fail("stat", e);
            -1
        }
    }
}

pub fn opendir(path: &str) -> Option<DirHandle> {
    REGISTRY.lock().opendir(path).map_err(|e| fail("opendir", e)).ok()
}

/// The next entry or `None` once the listing is exhausted.
pub fn readdir(dir: &mut DirHandle) -> Option<&DirEnt> {
    REGISTRY.lock().readdir(dir).unwrap_or_else(|e| {
        fail("readdir", e);
        None
    })
}

pub fn closedir(dir: DirHandle) -> i32 {
    match REGISTRY.lock().closedir(dir) {
        Ok(()) => 0,
        Err(e) => {
            fail("closedir", e);
            -1
        }
    }
}

pub fn telldir(dir: &DirHandle) -> i64 {
    dir.tell() as i64
}

pub fn seekdir(dir: &mut DirHandle, pos: i64) {
    let ok = usize::try_from(pos).is_ok_and(|pos| dir.seek(pos));
    if !ok {
        log::warn!("seekdir: {pos} outside {dir:?}");
    }
}

pub fn rewinddir(dir: &mut DirHandle) {
    dir.rewind()
}

pub fn unlink(path: &str) -> i32 {
    match REGISTRY.lock().unlink(path) {
        Ok(()) => 0,
        Err(e) => {
            fail("unlink", e);
            -1
        }
    }
}

/// The bytes of a blob file.  The length is the slice length.
pub fn mem_map(path: &str) -> Option<&'static [u8]> {
    REGISTRY.lock().mem_map(path).map_err(|e| fail("mem_map", e)).ok()
}
