//! The user-space side of a device node.
//!
//! [`OpenFile`] is what `open(2)` hands back to a caller: every call on it
//! goes through the operation table bound to the node at open time. The file
//! position advances by whatever each call reports; handlers are free to
//! ignore it.

pub mod file_operations;

use alloc::{sync::Arc, vec::Vec};

pub use file_operations::{File, FileOperations};

use crate::{buf::UserBuffer, error::KernelResult as Result};

pub struct OpenFile {
    ops: Arc<dyn FileOperations>,
    file: File,
    pos: u64,
    released: bool,
}

impl OpenFile {
    pub(crate) fn new(ops: Arc<dyn FileOperations>, file: File) -> OpenFile {
        OpenFile {
            ops,
            file,
            pos: 0,
            released: false,
        }
    }

    pub fn file(&self) -> &File {
        &self.file
    }

    pub fn pos(&self) -> u64 {
        self.pos
    }

    /// `read(2)` into caller memory.
    pub fn read(&mut self, buf: &mut UserBuffer) -> Result<usize> {
        let mut writer = buf.writer();
        let n = self.ops.read(&self.file, &mut writer, self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }

    /// `write(2)` from caller memory.
    pub fn write(&mut self, buf: &UserBuffer) -> Result<usize> {
        let mut reader = buf.reader();
        let n = self.ops.write(&self.file, &mut reader, self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }

    /// Reads at most `count` bytes and returns what the driver produced.
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        let mut buf = UserBuffer::new(count);
        let n = self.read(&mut buf)?;
        Ok(buf.as_bytes()[..n].to_vec())
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<usize> {
        self.write(&UserBuffer::from_bytes(data))
    }

    /// `close(2)`. Dropping the file has the same effect.
    pub fn close(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if !self.released {
            self.released = true;
            self.ops.release(&self.file);
        }
    }
}

impl Drop for OpenFile {
    fn drop(&mut self) {
        self.release();
    }
}
