//! The host kernel that modules are loaded into.
//!
//! A [`Kernel`] owns every table a module can register itself in: character
//! device regions, device classes, `/dev` nodes, cdev bindings and the GPIO
//! chip. Each subsystem module adds its own `impl Kernel` block with the
//! raw calls; drivers only ever reach them through the owning guards those
//! modules hand out.
//!
//! Every acquisition and release is appended to a journal, and any host call
//! can be made to fail once through [`Kernel::inject`].

use alloc::{
    collections::{BTreeMap, BTreeSet},
    string::String,
    sync::Arc,
    vec::Vec,
};
use core::sync::atomic::{AtomicU64, Ordering};

use bitflags::bitflags;
use spin::Mutex;

use crate::{
    chrdev::DevT,
    code::{ENOENT, ENXIO},
    error::KernelResult as Result,
    fs::{file_operations::FileOperations, File, OpenFile},
    gpio::{Chip, Direction, DEFAULT_NGPIO},
    pr_debug,
};

bitflags! {
    /// Host calls that fail once, the next time they are made.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Faults: u32 {
        const CHRDEV_ALLOC = 1 << 0;
        const CLASS_CREATE = 1 << 1;
        const DEVICE_CREATE = 1 << 2;
        const CDEV_ADD = 1 << 3;
        const GPIO_REQUEST = 1 << 4;
        const GPIO_DIRECTION = 1 << 5;
        const GPIO_VALUE = 1 << 6;
    }
}

/// One entry of the host journal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    RegionAllocated(DevT),
    RegionReleased(DevT),
    ClassCreated(String),
    ClassDestroyed(String),
    NodeCreated(String),
    NodeDestroyed(String),
    CdevAdded(DevT),
    CdevRemoved(DevT),
    PinRequested(u32),
    PinDirection(u32, Direction),
    PinLevel(u32, bool),
    PinFreed(u32),
}

pub(crate) struct Region {
    pub(crate) first: DevT,
    pub(crate) count: u32,
    pub(crate) name: String,
}

pub(crate) struct Node {
    pub(crate) devt: DevT,
    pub(crate) class: String,
}

#[derive(Default)]
pub(crate) struct Registry {
    /// Regions keyed by major.
    pub(crate) regions: BTreeMap<u32, Vec<Region>>,
    pub(crate) classes: BTreeSet<String>,
    /// Published nodes keyed by path.
    pub(crate) nodes: BTreeMap<String, Node>,
    pub(crate) cdevs: BTreeMap<DevT, Arc<dyn FileOperations>>,
}

pub struct Kernel {
    pub(crate) registry: Mutex<Registry>,
    pub(crate) gpio: Chip,
    journal: Mutex<Vec<Event>>,
    faults: Mutex<Faults>,
    next_file: AtomicU64,
}

impl Kernel {
    pub fn new() -> Arc<Kernel> {
        Self::with_gpio_lines(DEFAULT_NGPIO)
    }

    /// A host whose GPIO chip exposes lines `0..ngpio`.
    pub fn with_gpio_lines(ngpio: u32) -> Arc<Kernel> {
        Arc::new(Kernel {
            registry: Mutex::new(Registry::default()),
            gpio: Chip::new(ngpio),
            journal: Mutex::new(Vec::new()),
            faults: Mutex::new(Faults::empty()),
            next_file: AtomicU64::new(1),
        })
    }

    /// Arms `faults`; each one fires on the next matching call only.
    pub fn inject(&self, faults: Faults) {
        self.faults.lock().insert(faults);
    }

    pub(crate) fn take_fault(&self, fault: Faults) -> bool {
        let mut armed = self.faults.lock();
        let hit = armed.contains(fault);
        armed.remove(fault);
        hit
    }

    pub(crate) fn record(&self, event: Event) {
        pr_debug!("host: {:?}", event);
        self.journal.lock().push(event);
    }

    /// Everything recorded so far, oldest first.
    pub fn journal(&self) -> Vec<Event> {
        self.journal.lock().clone()
    }

    /// True when nothing is registered and no GPIO line is requested.
    pub fn is_quiescent(&self) -> bool {
        let registry = self.registry.lock();
        registry.regions.is_empty()
            && registry.classes.is_empty()
            && registry.nodes.is_empty()
            && registry.cdevs.is_empty()
            && self.gpio.requested_count() == 0
    }

    /// The device number published at `path`, if any.
    pub fn node(&self, path: &str) -> Option<DevT> {
        self.registry.lock().nodes.get(path).map(|node| node.devt)
    }

    /// Opens a published device node, the way `open(2)` reaches a driver.
    pub fn open(&self, path: &str) -> Result<OpenFile> {
        let (devt, ops) = {
            let registry = self.registry.lock();
            let node = registry.nodes.get(path).ok_or(ENOENT)?;
            let ops = registry.cdevs.get(&node.devt).cloned().ok_or(ENXIO)?;
            (node.devt, ops)
        };
        let file = File::new(self.next_file.fetch_add(1, Ordering::Relaxed), devt, path);
        ops.open(&file)?;
        Ok(OpenFile::new(ops, file))
    }
}
