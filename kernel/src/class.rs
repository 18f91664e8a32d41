//! Device classes.
//!
//! A class has to exist before a node can be published under it.
//!
//! C header: [`include/linux/device/class.h`](../../../../include/linux/device/class.h)

use alloc::{string::String, sync::Arc};

use crate::{
    code::{EEXIST, EINVAL, ENOMEM},
    error::KernelResult as Result,
    host::{Event, Faults},
    Kernel,
};

impl Kernel {
    /// `class_create`.
    pub(crate) fn class_create(&self, name: &str) -> Result {
        if name.is_empty() {
            return Err(EINVAL);
        }
        if self.take_fault(Faults::CLASS_CREATE) {
            return Err(ENOMEM);
        }
        if !self.registry.lock().classes.insert(String::from(name)) {
            return Err(EEXIST);
        }
        self.record(Event::ClassCreated(String::from(name)));
        Ok(())
    }

    /// `class_destroy`.
    pub(crate) fn class_destroy(&self, name: &str) {
        if self.registry.lock().classes.remove(name) {
            self.record(Event::ClassDestroyed(String::from(name)));
        }
    }
}

/// An owned device class, destroyed on drop.
pub struct Class {
    kernel: Arc<Kernel>,
    name: String,
}

impl Class {
    pub fn create(kernel: &Arc<Kernel>, name: &str) -> Result<Self> {
        kernel.class_create(name)?;
        Ok(Class {
            kernel: kernel.clone(),
            name: String::from(name),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn kernel(&self) -> &Arc<Kernel> {
        &self.kernel
    }
}

impl Drop for Class {
    fn drop(&mut self) {
        self.kernel.class_destroy(&self.name);
    }
}
