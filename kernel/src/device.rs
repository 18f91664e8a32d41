// SPDX-License-Identifier: GPL-2.0

//! Device nodes.
//!
//! A node is the `/dev` entry user space opens. It names a device number and
//! belongs to a [`Class`], which must outlive it.
//!
//! C header: [`include/linux/device.h`](../../../../include/linux/device.h)

use alloc::{format, string::String, sync::Arc};

use crate::{
    chrdev::DevT,
    class::Class,
    code::{EEXIST, EINVAL, ENOMEM},
    error::KernelResult as Result,
    host::{Event, Faults, Node},
    Kernel,
};

impl Kernel {
    /// `device_create`: publishes `/dev/<name>` for `devt` under `class`.
    ///
    /// Returns the published path.
    pub(crate) fn device_create(&self, class: &str, devt: DevT, name: &str) -> Result<String> {
        if name.is_empty() || name.contains('/') {
            return Err(EINVAL);
        }
        if self.take_fault(Faults::DEVICE_CREATE) {
            return Err(ENOMEM);
        }
        let path = format!("/dev/{}", name);
        {
            let mut registry = self.registry.lock();
            if !registry.classes.contains(class) {
                return Err(EINVAL);
            }
            if registry.nodes.contains_key(&path) {
                return Err(EEXIST);
            }
            registry.nodes.insert(
                path.clone(),
                Node {
                    devt,
                    class: String::from(class),
                },
            );
        }
        self.record(Event::NodeCreated(path.clone()));
        Ok(path)
    }

    /// `device_destroy`: removes the node of `devt` published under `class`.
    pub(crate) fn device_destroy(&self, class: &str, devt: DevT) {
        let removed = {
            let mut registry = self.registry.lock();
            let path = registry
                .nodes
                .iter()
                .find(|(_, node)| node.devt == devt && node.class == class)
                .map(|(path, _)| path.clone());
            if let Some(path) = &path {
                registry.nodes.remove(path);
            }
            path
        };
        if let Some(path) = removed {
            self.record(Event::NodeDestroyed(path));
        }
    }
}

/// A published device node, destroyed on drop.
pub struct DeviceNode {
    kernel: Arc<Kernel>,
    class: String,
    devt: DevT,
    path: String,
}

impl DeviceNode {
    pub fn create(class: &Class, devt: DevT, name: &str) -> Result<Self> {
        let kernel = class.kernel();
        let path = kernel.device_create(class.name(), devt, name)?;
        Ok(DeviceNode {
            kernel: kernel.clone(),
            class: String::from(class.name()),
            devt,
            path,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn devt(&self) -> DevT {
        self.devt
    }
}

impl Drop for DeviceNode {
    fn drop(&mut self) {
        self.kernel.device_destroy(&self.class, self.devt);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_paths_are_unique() {
        let kernel = Kernel::new();
        let class = Class::create(&kernel, "nodes").unwrap();
        let node = DeviceNode::create(&class, DevT::new(250, 0), "charDevice").unwrap();
        assert_eq!(node.path(), "/dev/charDevice");
        assert_eq!(kernel.node("/dev/charDevice"), Some(DevT::new(250, 0)));
        assert_eq!(
            DeviceNode::create(&class, DevT::new(250, 1), "charDevice").err(),
            Some(EEXIST)
        );
        assert_eq!(
            DeviceNode::create(&class, DevT::new(250, 1), "a/b").err(),
            Some(EINVAL)
        );
        drop(node);
        assert_eq!(kernel.node("/dev/charDevice"), None);
    }
}
