// SPDX-License-Identifier: GPL-2.0

//! Character devices.
//!
//! Also called "char devices", `chrdev`, `cdev`.
//!
//! A char device becomes visible to user space in four steps: a device
//! number region is reserved, a class is created, a node is published under
//! that class, and the node's number is bound to an operation table.
//! [`builder`] walks those steps in order. Every step hands back an owning
//! guard, so a step that fails drops the builder and with it everything the
//! earlier steps acquired, newest first. A finished [`Registration`] releases
//! the same way when it is dropped.
//!
//! C header: [`include/linux/cdev.h`](../../../../include/linux/cdev.h)

use alloc::{string::String, sync::Arc, vec::Vec};
use core::fmt;

use crate::{
    cdev::Cdev,
    class::Class,
    code::{EBUSY, EINVAL, ENOMEM},
    device::DeviceNode,
    error::KernelResult as Result,
    fs::file_operations::FileOperations,
    host::{Event, Faults, Region},
    pr_info, Kernel,
};

pub const MINORBITS: u32 = 20;
pub const MINORMASK: u32 = (1 << MINORBITS) - 1;

/// Dynamic majors are handed out from the top of this range downward.
pub const CHRDEV_MAJOR_DYN_START: u32 = 254;
pub const CHRDEV_MAJOR_DYN_END: u32 = 234;
pub const CHRDEV_MAJOR_MAX: u32 = 512;

/// A device number: major in the upper bits, minor in the lower [`MINORBITS`].
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DevT(u32);

impl DevT {
    /// Equivalent to `MKDEV`.
    pub const fn new(major: u32, minor: u32) -> DevT {
        DevT((major << MINORBITS) | (minor & MINORMASK))
    }

    pub const fn major(self) -> u32 {
        self.0 >> MINORBITS
    }

    pub const fn minor(self) -> u32 {
        self.0 & MINORMASK
    }

    pub const fn as_raw(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for DevT {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DevT({}:{})", self.major(), self.minor())
    }
}

impl fmt::Display for DevT {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.major(), self.minor())
    }
}

fn check_range(baseminor: u32, count: u32) -> Result {
    match baseminor.checked_add(count) {
        Some(end) if count > 0 && end <= MINORMASK + 1 => Ok(()),
        _ => Err(EINVAL),
    }
}

impl Kernel {
    /// `alloc_chrdev_region`: reserves `count` minors under a free dynamic major.
    pub(crate) fn alloc_chrdev_region(&self, baseminor: u32, count: u32, name: &str) -> Result<DevT> {
        check_range(baseminor, count)?;
        if self.take_fault(Faults::CHRDEV_ALLOC) {
            return Err(ENOMEM);
        }
        let first = {
            let mut registry = self.registry.lock();
            let major = (CHRDEV_MAJOR_DYN_END..=CHRDEV_MAJOR_DYN_START)
                .rev()
                .find(|major| !registry.regions.contains_key(major))
                .ok_or(EBUSY)?;
            let first = DevT::new(major, baseminor);
            registry.regions.insert(
                major,
                alloc::vec![Region {
                    first,
                    count,
                    name: String::from(name),
                }],
            );
            first
        };
        self.record(Event::RegionAllocated(first));
        Ok(first)
    }

    /// `register_chrdev_region`: reserves a region at a fixed device number.
    pub(crate) fn register_chrdev_region(&self, first: DevT, count: u32, name: &str) -> Result {
        check_range(first.minor(), count)?;
        if first.major() == 0 || first.major() >= CHRDEV_MAJOR_MAX {
            return Err(EINVAL);
        }
        if self.take_fault(Faults::CHRDEV_ALLOC) {
            return Err(ENOMEM);
        }
        {
            let mut registry = self.registry.lock();
            let regions = registry.regions.entry(first.major()).or_insert_with(Vec::new);
            let start = first.minor();
            let end = start + count;
            let overlaps = regions.iter().any(|region| {
                let region_start = region.first.minor();
                start < region_start + region.count && region_start < end
            });
            if overlaps {
                return Err(EBUSY);
            }
            regions.push(Region {
                first,
                count,
                name: String::from(name),
            });
        }
        self.record(Event::RegionAllocated(first));
        Ok(())
    }

    /// `unregister_chrdev_region`.
    pub(crate) fn unregister_chrdev_region(&self, first: DevT, count: u32) {
        let released = {
            let mut registry = self.registry.lock();
            let Some(regions) = registry.regions.get_mut(&first.major()) else {
                return;
            };
            let before = regions.len();
            regions.retain(|region| !(region.first == first && region.count == count));
            let released = regions.len() != before;
            if regions.is_empty() {
                registry.regions.remove(&first.major());
            }
            released
        };
        if released {
            self.record(Event::RegionReleased(first));
        }
    }

    /// Name of the region that owns `devt`, as `/proc/devices` would list it.
    pub fn chrdev_name(&self, devt: DevT) -> Option<String> {
        let registry = self.registry.lock();
        registry.regions.get(&devt.major())?.iter().find_map(|region| {
            let start = region.first.minor();
            (start..start + region.count)
                .contains(&devt.minor())
                .then(|| region.name.clone())
        })
    }
}

/// A reserved range of device numbers, released on drop.
pub struct ChrdevRegion {
    kernel: Arc<Kernel>,
    first: DevT,
    count: u32,
}

impl ChrdevRegion {
    /// Reserves `count` minors starting at `baseminor` under a dynamic major.
    pub fn alloc(kernel: &Arc<Kernel>, baseminor: u32, count: u32, name: &str) -> Result<Self> {
        let first = kernel.alloc_chrdev_region(baseminor, count, name)?;
        Ok(ChrdevRegion {
            kernel: kernel.clone(),
            first,
            count,
        })
    }

    /// Reserves `count` minors starting at the fixed number `first`.
    pub fn register(kernel: &Arc<Kernel>, first: DevT, count: u32, name: &str) -> Result<Self> {
        kernel.register_chrdev_region(first, count, name)?;
        Ok(ChrdevRegion {
            kernel: kernel.clone(),
            first,
            count,
        })
    }

    pub fn first(&self) -> DevT {
        self.first
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

impl Drop for ChrdevRegion {
    fn drop(&mut self) {
        self.kernel.unregister_chrdev_region(self.first, self.count);
    }
}

/// Starts a char device registration by reserving one device number.
pub fn builder(kernel: &Arc<Kernel>, name: &str) -> Result<Builder> {
    let region = ChrdevRegion::alloc(kernel, 0, 1, name)?;
    pr_info!("{}: registered with device number {}", name, region.first());
    Ok(Builder {
        kernel: kernel.clone(),
        region,
    })
}

/// A device number is reserved; a class comes next.
pub struct Builder {
    kernel: Arc<Kernel>,
    region: ChrdevRegion,
}

impl Builder {
    pub fn class(self, name: &str) -> Result<WithClass> {
        let class = Class::create(&self.kernel, name)?;
        Ok(WithClass {
            kernel: self.kernel,
            class,
            region: self.region,
        })
    }
}

/// A class exists; the device node comes next.
pub struct WithClass {
    kernel: Arc<Kernel>,
    class: Class,
    region: ChrdevRegion,
}

impl WithClass {
    pub fn node(self, name: &str) -> Result<WithNode> {
        let node = DeviceNode::create(&self.class, self.region.first(), name)?;
        Ok(WithNode {
            kernel: self.kernel,
            node,
            class: self.class,
            region: self.region,
        })
    }
}

/// The node is published; binding the operation table finishes the job.
pub struct WithNode {
    kernel: Arc<Kernel>,
    node: DeviceNode,
    class: Class,
    region: ChrdevRegion,
}

impl WithNode {
    pub fn bind(self, ops: Arc<dyn FileOperations>) -> Result<Registration> {
        let cdev = Cdev::add(&self.kernel, self.region.first(), ops)?;
        pr_info!("{}: device node ready", self.node.path());
        Ok(Registration {
            cdev,
            node: self.node,
            class: self.class,
            region: self.region,
        })
    }
}

/// A fully published char device.
///
/// Fields are declared newest first so they drop in reverse acquisition
/// order: binding, node, class, then the device number.
pub struct Registration {
    cdev: Cdev,
    node: DeviceNode,
    class: Class,
    region: ChrdevRegion,
}

impl Registration {
    pub fn devt(&self) -> DevT {
        self.cdev.devt()
    }

    pub fn path(&self) -> &str {
        self.node.path()
    }

    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    pub fn region(&self) -> &ChrdevRegion {
        &self.region
    }
}
