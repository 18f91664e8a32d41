//! Binding a device number to its operation table.

use alloc::sync::Arc;

use crate::{
    chrdev::DevT,
    code::{EBUSY, EINVAL},
    error::KernelResult as Result,
    fs::file_operations::FileOperations,
    host::{Event, Faults},
    Kernel,
};

impl Kernel {
    /// `cdev_add`.
    pub(crate) fn cdev_add(&self, devt: DevT, ops: Arc<dyn FileOperations>) -> Result {
        if self.take_fault(Faults::CDEV_ADD) {
            return Err(EINVAL);
        }
        {
            let mut registry = self.registry.lock();
            if registry.cdevs.contains_key(&devt) {
                return Err(EBUSY);
            }
            registry.cdevs.insert(devt, ops);
        }
        self.record(Event::CdevAdded(devt));
        Ok(())
    }

    /// `cdev_del`. Files that are already open keep their table.
    pub(crate) fn cdev_del(&self, devt: DevT) {
        let removed = self.registry.lock().cdevs.remove(&devt);
        if removed.is_some() {
            self.record(Event::CdevRemoved(devt));
        }
    }
}

/// A live cdev binding, removed on drop.
pub struct Cdev {
    kernel: Arc<Kernel>,
    devt: DevT,
}

impl Cdev {
    pub fn add(kernel: &Arc<Kernel>, devt: DevT, ops: Arc<dyn FileOperations>) -> Result<Self> {
        kernel.cdev_add(devt, ops)?;
        Ok(Cdev {
            kernel: kernel.clone(),
            devt,
        })
    }

    pub fn devt(&self) -> DevT {
        self.devt
    }
}

impl Drop for Cdev {
    fn drop(&mut self) {
        self.kernel.cdev_del(self.devt);
    }
}
