//! Stream helpers on top of the descriptor calls.

use crate::{close, lseek, open, read, write};
use ap_vfs::OpenFlags;

/// Map an fopen mode string onto open flags.
fn mode_flags(mode: &str) -> Option<OpenFlags> {
    let plus = mode.contains('+');
    let flags = match mode.chars().next()? {
        'r' if plus => OpenFlags::RDWR,
        'r' => OpenFlags::RDONLY,
        'w' if plus => OpenFlags::RDWR | OpenFlags::CREAT | OpenFlags::TRUNC,
        'w' => OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::TRUNC,
        'a' if plus => OpenFlags::RDWR | OpenFlags::CREAT | OpenFlags::APPEND,
        'a' => OpenFlags::WRONLY | OpenFlags::CREAT | OpenFlags::APPEND,
        _ => return None,
    };
    Some(flags)
}

/// Open a stream.  `mode` is one of `r`, `w`, `a`, optionally with `+` and `b`.
pub fn fopen(path: &str, mode: &str) -> Option<FileStream> {
    let Some(flags) = mode_flags(mode) else {
        log::error!("fopen: invalid mode {mode:?}");
        return None;
    };
    let fd = open(path, flags.0, 0);
    (fd >= 0).then_some(FileStream { fd })
}

/// A stream over one descriptor.  Dropping the stream closes it.
#[derive(Debug)]
pub struct FileStream {
    fd: i32,
}

impl FileStream {
    pub fn fd(&self) -> i32 {
        self.fd
    }

    /// Read into the buffer and return the number of bytes.  Zero on EOF or error.
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        usize::try_from(read(self.fd, buf)).unwrap_or(0)
    }

    pub fn write(&mut self, buf: &[u8]) -> usize {
        usize::try_from(write(self.fd, buf)).unwrap_or(0)
    }

    /// The next byte.
    pub fn getc(&mut self) -> Option<u8> {
        let mut c = [0u8; 1];
        (self.read(&mut c) == 1).then_some(c[0])
    }

    /// Read a line including its newline, at most `buf.len()` bytes.
    ///
    /// The last line of a file does not need a newline.  Returns `None` once
    /// nothing is left.
    pub fn gets<'b>(&mut self, buf: &'b mut [u8]) -> Option<&'b [u8]> {
        let mut count = 0;
        while count < buf.len() {
            let Some(c) = self.getc() else { break };
            buf[count] = c;
            count += 1;
            if c == b'\n' {
                break;
            }
        }
        (count > 0).then_some(&buf[..count])
    }

    /// Move the position.  Returns 0 on success and -1 on error.
    pub fn seek(&mut self, offset: i64, whence: i32) -> i32 {
        if lseek(self.fd, offset, whence) < 0 {
            -1
        } else {
            0
        }
    }

    pub fn tell(&self) -> i64 {
        crate::tell(self.fd)
    }

    /// Close the descriptor and report the result.
    pub fn close(mut self) -> i32 {
        let fd = core::mem::replace(&mut self.fd, -1);
        close(fd)
    }
}

impl Drop for FileStream {
    fn drop(&mut self) {
        if self.fd >= 0 {
            close(self.fd);
        }
    }
}
