//! The buffer every open file of the device shares.

use spin::Mutex;

use kernel::error::KernelResult;

/// Bytes the device can hold. Longer writes are truncated to this.
pub const KBUFFER_CAPACITY: usize = 256;

struct Contents {
    data: [u8; KBUFFER_CAPACITY],
    /// Number of meaningful bytes at the front of `data`.
    len: usize,
}

/// Fixed-capacity storage plus its valid length, behind one lock.
///
/// The contents are only reachable inside the accessors, which hold the
/// lock for the whole call. A reader therefore sees either all or none of a
/// concurrent write.
pub struct KernelBuffer {
    inner: Mutex<Contents>,
}

impl KernelBuffer {
    pub const fn new() -> Self {
        KernelBuffer {
            inner: Mutex::new(Contents {
                data: [0; KBUFFER_CAPACITY],
                len: 0,
            }),
        }
    }

    pub const fn capacity(&self) -> usize {
        KBUFFER_CAPACITY
    }

    pub fn valid_length(&self) -> usize {
        self.inner.lock().len
    }

    /// Runs `f` over the valid bytes only.
    pub fn with_contents<R>(&self, f: impl FnOnce(&[u8]) -> R) -> R {
        let contents = self.inner.lock();
        f(&contents.data[..contents.len])
    }

    /// Replaces the whole contents.
    ///
    /// `f` fills a zeroed scratch array and returns how many bytes are now
    /// valid, plus a value handed back to the caller. If `f` fails the old
    /// contents are kept.
    pub fn replace_with<R>(
        &self,
        f: impl FnOnce(&mut [u8; KBUFFER_CAPACITY]) -> KernelResult<(usize, R)>,
    ) -> KernelResult<R> {
        let mut contents = self.inner.lock();
        let mut scratch = [0u8; KBUFFER_CAPACITY];
        let (len, ret) = f(&mut scratch)?;
        contents.data = scratch;
        contents.len = len.min(KBUFFER_CAPACITY);
        Ok(ret)
    }
}

impl Default for KernelBuffer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel::code::EFAULT;

    #[test]
    fn starts_empty() {
        let buffer = KernelBuffer::new();
        assert_eq!(buffer.valid_length(), 0);
        assert_eq!(buffer.capacity(), 256);
        buffer.with_contents(|bytes| assert!(bytes.is_empty()));
    }

    #[test]
    fn replace_drops_previous_contents() {
        let buffer = KernelBuffer::new();
        buffer
            .replace_with(|data| {
                data[..5].copy_from_slice(b"hello");
                Ok((5, ()))
            })
            .unwrap();
        buffer
            .replace_with(|data| {
                data[..2].copy_from_slice(b"yo");
                Ok((2, ()))
            })
            .unwrap();
        buffer.with_contents(|bytes| assert_eq!(bytes, b"yo"));
    }

    #[test]
    fn failed_replace_keeps_old_contents() {
        let buffer = KernelBuffer::new();
        buffer
            .replace_with(|data| {
                data[..3].copy_from_slice(b"old");
                Ok((3, ()))
            })
            .unwrap();
        let res: KernelResult<()> = buffer.replace_with(|data| {
            data[0] = b'x';
            Err(EFAULT)
        });
        assert_eq!(res, Err(EFAULT));
        buffer.with_contents(|bytes| assert_eq!(bytes, b"old"));
    }
}
