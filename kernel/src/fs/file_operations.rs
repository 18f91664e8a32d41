//! File operations.
//!
//! A driver implements [`FileOperations`] once; the host binds the table to
//! a device number and dispatches every `open`/`read`/`write`/`close` made on
//! the node to it. One table serves every open file of the device, so any
//! state it keeps is shared between sessions.
//!
//! C header: [`include/linux/fs.h`](../../../../include/linux/fs.h)

use alloc::string::String;

use crate::{
    buf::{UserSlicePtrReader, UserSlicePtrWriter},
    chrdev::DevT,
    code::EINVAL,
    error::KernelResult,
};

/// The kernel side of one open file description.
#[derive(Debug)]
pub struct File {
    id: u64,
    devt: DevT,
    path: String,
}

impl File {
    pub(crate) fn new(id: u64, devt: DevT, path: &str) -> File {
        File {
            id,
            devt,
            path: String::from(path),
        }
    }

    /// Unique per `open` call.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn devt(&self) -> DevT {
        self.devt
    }

    pub fn path(&self) -> &str {
        &self.path
    }
}

/// Corresponds to the kernel's `struct file_operations`.
///
/// Handlers may run concurrently from any number of callers.
pub trait FileOperations: Send + Sync {
    /// Called on every `open`. Failing it fails the `open`.
    fn open(&self, _file: &File) -> KernelResult {
        Ok(())
    }

    /// Called exactly once when an open file is closed.
    fn release(&self, _file: &File) {}

    /// Copies device data into `buf`, returning the number of bytes produced.
    fn read(
        &self,
        _file: &File,
        _buf: &mut UserSlicePtrWriter<'_>,
        _offset: u64,
    ) -> KernelResult<usize> {
        Err(EINVAL)
    }

    /// Consumes data from `buf`, returning the number of bytes accepted.
    fn write(
        &self,
        _file: &File,
        _buf: &mut UserSlicePtrReader<'_>,
        _offset: u64,
    ) -> KernelResult<usize> {
        Err(EINVAL)
    }
}
