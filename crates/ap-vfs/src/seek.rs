//! Seek modes and the saturating position arithmetic shared by all backends.

use super::Offset;

pub const SEEK_SET: i32 = 0;
pub const SEEK_CUR: i32 = 1;
pub const SEEK_END: i32 = 2;

/// The reference point of a seek.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    /// From the start of the content.
    Set,
    /// From the current position.
    Cur,
    /// From the end of the content.
    End,
}

impl Whence {
    /// Convert the raw `whence` argument of `lseek`.
    pub fn from_raw(whence: i32) -> Option<Self> {
        Some(match whence {
            SEEK_SET => Whence::Set,
            SEEK_CUR => Whence::Cur,
            SEEK_END => Whence::End,
            _ => return None,
        })
    }
}

/// Compute the new position of a seek.
///
/// Never fails: a negative target clamps to zero and a target beyond the
/// size clamps to the last valid offset.  Seeking exactly to the size is
/// allowed so that a following read reports EOF.
pub fn saturate(current: Offset, size: Offset, offset: i64, whence: Whence) -> Offset {
    let base = match whence {
        Whence::Set => 0,
        Whence::Cur => current,
        Whence::End => size,
    };
    let target = i128::from(base) + i128::from(offset);
    if target < 0 {
        0
    } else if target > i128::from(size) {
        size.saturating_sub(1)
    } else {
        target as Offset
    }
}
