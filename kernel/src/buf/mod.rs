//! User-space memory as seen from a file operation.
//!
//! [`UserBuffer`] is the memory a calling process hands to `read`/`write`.
//! Only its mapped prefix is accessible; touching a byte past it faults, the
//! way an unmapped page does. Drivers never see a `UserBuffer` directly, they
//! get a [`UserSlicePtrReader`] or [`UserSlicePtrWriter`] whose copies behave
//! like `copy_from_user`/`copy_to_user`: the partial variants report the
//! number of bytes that could not be copied, the full variants turn any such
//! residue into [`EFAULT`].

use alloc::{vec, vec::Vec};
use core::cmp;

use crate::{code::EFAULT, error::KernelResult as Result};

/// A buffer owned by a user-space caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserBuffer {
    data: Vec<u8>,
    mapped: usize,
}

impl UserBuffer {
    /// A zeroed, fully mapped buffer of `len` bytes.
    pub fn new(len: usize) -> Self {
        UserBuffer {
            data: vec![0; len],
            mapped: len,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Self {
        UserBuffer {
            data: bytes.to_vec(),
            mapped: bytes.len(),
        }
    }

    /// Unmaps everything from `offset` on; accesses there fault.
    pub fn fault_at(mut self, offset: usize) -> Self {
        self.mapped = cmp::min(offset, self.data.len());
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Construct a `UserSlicePtrReader` over the whole buffer.
    pub fn reader(&self) -> UserSlicePtrReader<'_> {
        UserSlicePtrReader {
            data: &self.data,
            mapped: self.mapped,
            pos: 0,
        }
    }

    /// Construct a `UserSlicePtrWriter` over the whole buffer.
    pub fn writer(&mut self) -> UserSlicePtrWriter<'_> {
        UserSlicePtrWriter {
            data: &mut self.data,
            mapped: self.mapped,
            pos: 0,
        }
    }
}

/// Incrementally reads from a user buffer into the kernel.
pub struct UserSlicePtrReader<'a> {
    data: &'a [u8],
    mapped: usize,
    pos: usize,
}

impl UserSlicePtrReader<'_> {
    /// Returns the number of bytes left to be read from this. Note that even
    /// reading less than this number of bytes may return an Error().
    pub fn len(&self) -> usize {
        self.data.len() - self.pos
    }

    /// Returns `true` if `self.len()` is 0.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Skip the provided number of bytes.
    ///
    /// Returns an error if skipping more than the length of the buffer.
    pub fn skip(&mut self, num_skip: usize) -> Result {
        if num_skip > self.len() {
            return Err(EFAULT);
        }
        self.pos += num_skip;
        Ok(())
    }

    /// Copies `out.len()` bytes, stopping at the first unmapped byte.
    ///
    /// Returns the number of bytes that could not be copied; the uncopied
    /// tail of `out` is zeroed. Asking for more than [`Self::len`] fails
    /// with `EFAULT` without copying anything.
    pub fn read_partial(&mut self, out: &mut [u8]) -> Result<usize> {
        if out.len() > self.len() {
            return Err(EFAULT);
        }
        let accessible = self.mapped.saturating_sub(self.pos);
        let copied = cmp::min(out.len(), accessible);
        out[..copied].copy_from_slice(&self.data[self.pos..self.pos + copied]);
        out[copied..].fill(0);
        self.pos += copied;
        Ok(out.len() - copied)
    }

    /// Reads exactly `out.len()` bytes.
    ///
    /// Returns EFAULT if any of them is not mapped. This call may modify
    /// `out` even if it returns an error.
    pub fn read_slice(&mut self, out: &mut [u8]) -> Result {
        match self.read_partial(out)? {
            0 => Ok(()),
            _ => Err(EFAULT),
        }
    }

    /// Read all data remaining in the user slice and return it in a `Vec`.
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        let mut data = vec![0; self.len()];
        self.read_slice(&mut data)?;
        Ok(data)
    }
}

/// Incrementally writes kernel data into a user buffer.
pub struct UserSlicePtrWriter<'a> {
    data: &'a mut [u8],
    mapped: usize,
    pos: usize,
}

impl UserSlicePtrWriter<'_> {
    pub fn len(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies `data` out, stopping at the first unmapped byte.
    ///
    /// Returns the number of bytes that could not be copied. Writing more
    /// than [`Self::len`] fails with `EFAULT` without copying anything.
    pub fn write_partial(&mut self, data: &[u8]) -> Result<usize> {
        if data.len() > self.len() {
            return Err(EFAULT);
        }
        let accessible = self.mapped.saturating_sub(self.pos);
        let copied = cmp::min(data.len(), accessible);
        self.data[self.pos..self.pos + copied].copy_from_slice(&data[..copied]);
        self.pos += copied;
        Ok(data.len() - copied)
    }

    /// Write the provided slice into the user slice.
    ///
    /// Returns EFAULT if part of the destination is not mapped (in which
    /// case the bytes before the fault are written), or `data` is larger
    /// than the user slice (in which case no data is written).
    pub fn write_slice(&mut self, data: &[u8]) -> Result {
        match self.write_partial(data)? {
            0 => Ok(()),
            _ => Err(EFAULT),
        }
    }
}
