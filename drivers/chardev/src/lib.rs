//! A character device backed by a small in-kernel buffer.
//!
//! Writing to `/dev/charDevice` replaces the buffer with the first
//! [`KBUFFER_CAPACITY`] bytes of the payload; anything beyond that is
//! silently dropped. Reading returns up to the requested number of valid
//! bytes, always from the start of the buffer: there is no file cursor, so
//! reading twice yields the same bytes. All open files share the buffer.

#![cfg_attr(not(test), no_std)]
extern crate alloc;

mod buffer;

use alloc::sync::Arc;
use core::sync::atomic::{AtomicUsize, Ordering};

use kernel::{
    buf::{UserSlicePtrReader, UserSlicePtrWriter},
    chrdev,
    code::EFAULT,
    error::KernelResult,
    fs::{File, FileOperations},
    Kernel, Module,
};
use log::{info, warn};

pub use buffer::{KernelBuffer, KBUFFER_CAPACITY};

pub const CLASS_NAME: &str = "testDevice";
pub const DEVICE_NAME: &str = "charDevice";

/// The device shared by every open file.
pub struct CharDevice {
    buffer: KernelBuffer,
    open_count: AtomicUsize,
}

impl CharDevice {
    pub fn new() -> Self {
        CharDevice {
            buffer: KernelBuffer::new(),
            open_count: AtomicUsize::new(0),
        }
    }

    /// Times the device was opened since load. Diagnostic only.
    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::Relaxed)
    }

    pub fn buffer(&self) -> &KernelBuffer {
        &self.buffer
    }
}

impl Default for CharDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl FileOperations for CharDevice {
    fn open(&self, _file: &File) -> KernelResult {
        let count = self.open_count.fetch_add(1, Ordering::Relaxed) + 1;
        info!("Times this file is opened = {}", count);
        Ok(())
    }

    fn release(&self, _file: &File) {
        info!("Device closed successfully.");
    }

    fn read(
        &self,
        _file: &File,
        buf: &mut UserSlicePtrWriter<'_>,
        _offset: u64,
    ) -> KernelResult<usize> {
        self.buffer.with_contents(|valid| {
            let n = buf.len().min(valid.len());
            let residue = buf.write_partial(&valid[..n])?;
            if residue != 0 {
                warn!("Failed to send {} characters to user-space.", residue);
                return Err(EFAULT);
            }
            info!("Sent {} characters to user-space.", n);
            Ok(n)
        })
    }

    fn write(
        &self,
        _file: &File,
        buf: &mut UserSlicePtrReader<'_>,
        _offset: u64,
    ) -> KernelResult<usize> {
        let requested = buf.len();
        let n = requested.min(self.buffer.capacity());
        if n < requested {
            info!("Truncating {} byte write to {}.", requested, n);
        }
        self.buffer.replace_with(|data| {
            let residue = buf.read_partial(&mut data[..n])?;
            if n > 0 && residue == n {
                warn!("Failed to receive any of {} characters.", n);
                return Err(EFAULT);
            }
            info!("Received {} characters from user-space.", n - residue);
            Ok((n, n - residue))
        })
    }
}

/// The loaded module: the published node and the device behind it.
pub struct CharDeviceModule {
    device: Arc<CharDevice>,
    _registration: chrdev::Registration,
}

impl CharDeviceModule {
    pub fn device(&self) -> &Arc<CharDevice> {
        &self.device
    }
}

impl Module for CharDeviceModule {
    fn init(kernel: &Arc<Kernel>) -> KernelResult<Self> {
        let device = Arc::new(CharDevice::new());
        let registration = chrdev::builder(kernel, DEVICE_NAME)?
            .class(CLASS_NAME)?
            .node(DEVICE_NAME)?
            .bind(device.clone())?;
        info!(
            "{} ready at {} ({})",
            DEVICE_NAME,
            registration.path(),
            registration.devt()
        );
        Ok(CharDeviceModule {
            device,
            _registration: registration,
        })
    }
}

impl Drop for CharDeviceModule {
    fn drop(&mut self) {
        info!("{}: unregistered", DEVICE_NAME);
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Barrier, thread, vec::Vec};

    use kernel::{buf::UserBuffer, code::*, Event, Faults, ModuleSlot, ModuleState};

    use super::*;

    const NODE: &str = "/dev/charDevice";

    fn loaded() -> (Arc<Kernel>, ModuleSlot<CharDeviceModule>) {
        let kernel = Kernel::new();
        let slot = ModuleSlot::new(&kernel, "charDevices");
        slot.load().unwrap();
        (kernel, slot)
    }

    #[test]
    fn write_then_read_back() {
        let (kernel, _slot) = loaded();
        let mut file = kernel.open(NODE).unwrap();
        assert_eq!(file.write_bytes(b"hello device").unwrap(), 12);
        assert_eq!(file.read_bytes(64).unwrap(), b"hello device");
        assert_eq!(file.read_bytes(5).unwrap(), b"hello");
    }

    #[test]
    fn reads_always_start_at_zero() {
        let (kernel, _slot) = loaded();
        let mut file = kernel.open(NODE).unwrap();
        file.write_bytes(b"abcdef").unwrap();
        let first = file.read_bytes(4).unwrap();
        let second = file.read_bytes(4).unwrap();
        assert_eq!(first, b"abcd");
        assert_eq!(first, second);
    }

    #[test]
    fn write_replaces_instead_of_appending() {
        let (kernel, slot) = loaded();
        let mut file = kernel.open(NODE).unwrap();
        file.write_bytes(b"a long first message").unwrap();
        file.write_bytes(b"short").unwrap();
        assert_eq!(file.read_bytes(256).unwrap(), b"short");
        assert_eq!(slot.with(|m| m.device().buffer().valid_length()), Some(5));
    }

    #[test]
    fn oversized_writes_are_truncated() {
        let (kernel, slot) = loaded();
        let mut file = kernel.open(NODE).unwrap();
        let payload: Vec<u8> = (0..1000).map(|i| (i % 251) as u8).collect();
        assert_eq!(file.write_bytes(&payload).unwrap(), KBUFFER_CAPACITY);
        assert_eq!(
            slot.with(|m| m.device().buffer().valid_length()),
            Some(KBUFFER_CAPACITY)
        );
        assert_eq!(file.read_bytes(1000).unwrap(), &payload[..KBUFFER_CAPACITY]);
    }

    #[test]
    fn valid_length_tracks_every_write_size() {
        let (kernel, slot) = loaded();
        let mut file = kernel.open(NODE).unwrap();
        for len in [0usize, 1, 17, 255, 256, 257, 4096] {
            let accepted = file.write_bytes(&vec![b'z'; len]).unwrap();
            let expected = len.min(KBUFFER_CAPACITY);
            assert_eq!(accepted, expected);
            assert_eq!(
                slot.with(|m| m.device().buffer().valid_length()),
                Some(expected)
            );
        }
    }

    #[test]
    fn reads_never_expose_stale_bytes() {
        let (kernel, _slot) = loaded();
        let mut file = kernel.open(NODE).unwrap();
        file.write_bytes(&[b'x'; 200]).unwrap();
        file.write_bytes(b"tiny").unwrap();
        let mut user = UserBuffer::new(200);
        assert_eq!(file.read(&mut user).unwrap(), 4);
        assert_eq!(&user.as_bytes()[..4], b"tiny");
        assert!(user.as_bytes()[4..].iter().all(|&b| b == 0));
    }

    #[test]
    fn read_fault_is_reported() {
        let (kernel, _slot) = loaded();
        let mut file = kernel.open(NODE).unwrap();
        file.write_bytes(b"0123456789").unwrap();
        let mut user = UserBuffer::new(10).fault_at(6);
        assert_eq!(file.read(&mut user), Err(EFAULT));
    }

    #[test]
    fn partial_write_reports_what_was_copied() {
        let (kernel, slot) = loaded();
        let mut file = kernel.open(NODE).unwrap();
        let user = UserBuffer::from_bytes(b"0123456789").fault_at(4);
        assert_eq!(file.write(&user), Ok(4));
        assert_eq!(slot.with(|m| m.device().buffer().valid_length()), Some(10));
        assert_eq!(file.read_bytes(10).unwrap(), b"0123\0\0\0\0\0\0");
    }

    #[test]
    fn fully_faulting_write_keeps_old_contents() {
        let (kernel, _slot) = loaded();
        let mut file = kernel.open(NODE).unwrap();
        file.write_bytes(b"keep me").unwrap();
        let user = UserBuffer::from_bytes(b"lost").fault_at(0);
        assert_eq!(file.write(&user), Err(EFAULT));
        assert_eq!(file.read_bytes(64).unwrap(), b"keep me");
    }

    #[test]
    fn sessions_share_one_buffer() {
        let (kernel, slot) = loaded();
        let mut writer = kernel.open(NODE).unwrap();
        let mut reader = kernel.open(NODE).unwrap();
        writer.write_bytes(b"shared").unwrap();
        assert_eq!(reader.read_bytes(16).unwrap(), b"shared");
        writer.close();
        // The buffer outlives any single session.
        assert_eq!(reader.read_bytes(16).unwrap(), b"shared");
        assert_eq!(slot.with(|m| m.device().open_count()), Some(2));
    }

    #[test]
    fn concurrent_opens_are_all_counted() {
        let (kernel, slot) = loaded();
        thread::scope(|s| {
            for _ in 0..8 {
                s.spawn(|| {
                    for _ in 0..25 {
                        kernel.open(NODE).unwrap().close();
                    }
                });
            }
        });
        assert_eq!(slot.with(|m| m.device().open_count()), Some(200));
    }

    #[test]
    fn concurrent_writers_never_interleave() {
        let (kernel, _slot) = loaded();
        let barrier = Barrier::new(3);
        thread::scope(|s| {
            for fill in [b'A', b'B'] {
                let kernel = &kernel;
                let barrier = &barrier;
                s.spawn(move || {
                    let mut file = kernel.open(NODE).unwrap();
                    let payload = [fill; KBUFFER_CAPACITY];
                    barrier.wait();
                    for _ in 0..500 {
                        assert_eq!(file.write_bytes(&payload).unwrap(), KBUFFER_CAPACITY);
                    }
                });
            }
            let kernel = &kernel;
            let barrier = &barrier;
            s.spawn(move || {
                let mut file = kernel.open(NODE).unwrap();
                barrier.wait();
                for _ in 0..500 {
                    let seen = file.read_bytes(KBUFFER_CAPACITY).unwrap();
                    if let Some(&first) = seen.first() {
                        assert!(seen.iter().all(|&b| b == first), "torn read");
                        assert_eq!(seen.len(), KBUFFER_CAPACITY);
                    }
                }
            });
        });

        let mut file = kernel.open(NODE).unwrap();
        let last = file.read_bytes(KBUFFER_CAPACITY).unwrap();
        assert_eq!(last.len(), KBUFFER_CAPACITY);
        assert!(last == [b'A'; KBUFFER_CAPACITY] || last == [b'B'; KBUFFER_CAPACITY]);
    }

    #[test]
    fn unload_removes_the_node() {
        let (kernel, slot) = loaded();
        let devt = kernel.node(NODE).unwrap();
        slot.unload();
        assert_eq!(slot.state(), ModuleState::Unloaded);
        assert_eq!(kernel.open(NODE).err(), Some(ENOENT));
        assert!(kernel.is_quiescent());

        let journal = kernel.journal();
        let at = |event: &Event| journal.iter().position(|e| e == event).unwrap();
        assert!(at(&Event::CdevRemoved(devt)) < at(&Event::NodeDestroyed(NODE.into())));
        assert!(
            at(&Event::NodeDestroyed(NODE.into()))
                < at(&Event::ClassDestroyed(CLASS_NAME.into()))
        );
        assert!(at(&Event::ClassDestroyed(CLASS_NAME.into())) < at(&Event::RegionReleased(devt)));
    }

    #[test]
    fn open_files_outlive_the_module() {
        let (kernel, slot) = loaded();
        let mut file = kernel.open(NODE).unwrap();
        file.write_bytes(b"still here").unwrap();
        slot.unload();
        assert!(kernel.is_quiescent());
        assert_eq!(file.read_bytes(64).unwrap(), b"still here");
    }

    #[test]
    fn load_failure_at_any_stage_leaves_nothing_behind() {
        for fault in [
            Faults::CHRDEV_ALLOC,
            Faults::CLASS_CREATE,
            Faults::DEVICE_CREATE,
            Faults::CDEV_ADD,
        ] {
            let kernel = Kernel::new();
            let slot = ModuleSlot::<CharDeviceModule>::new(&kernel, "charDevices");
            kernel.inject(fault);
            assert!(slot.init_module() < 0, "{:?} did not fail the load", fault);
            assert_eq!(slot.state(), ModuleState::Unloaded);
            assert!(kernel.is_quiescent(), "{:?} left state behind", fault);
            assert_eq!(kernel.node(NODE), None);
        }
    }

    #[test]
    fn a_taken_class_name_fails_the_load() {
        let kernel = Kernel::new();
        let _squatter = kernel::class::Class::create(&kernel, CLASS_NAME).unwrap();
        let slot = ModuleSlot::<CharDeviceModule>::new(&kernel, "charDevices");
        assert_eq!(slot.load(), Err(EEXIST));
        assert!(kernel.journal().iter().any(|e| matches!(e, Event::RegionReleased(_))));
    }
}
