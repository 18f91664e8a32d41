//! Loading and unloading modules.

use alloc::sync::Arc;
use core::ffi::c_int;

use spin::Mutex;

use crate::{code::EBUSY, error::KernelResult as Result, pr_info, pr_warn, Kernel};

/// The top level entrypoint to implementing a kernel module.
///
/// For any teardown or cleanup operations, your type may implement [`Drop`].
pub trait Module: Sized + Send {
    /// Called at module initialization time.
    ///
    /// Use this method to perform whatever setup or registration your module
    /// should do. Anything acquired before an error is returned must be
    /// released before returning it.
    ///
    /// Equivalent to the `module_init` macro in the C API.
    fn init(kernel: &Arc<Kernel>) -> Result<Self>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModuleState {
    Unloaded,
    Loading,
    Active,
    Unloading,
}

/// Owns at most one live instance of `M` and drives it through
/// `Unloaded -> Loading -> Active -> Unloading -> Unloaded`.
///
/// A failed load goes straight back to `Unloaded`.
pub struct ModuleSlot<M: Module> {
    kernel: Arc<Kernel>,
    name: &'static str,
    state: Mutex<ModuleState>,
    instance: Mutex<Option<M>>,
}

impl<M: Module> ModuleSlot<M> {
    pub fn new(kernel: &Arc<Kernel>, name: &'static str) -> Self {
        ModuleSlot {
            kernel: kernel.clone(),
            name,
            state: Mutex::new(ModuleState::Unloaded),
            instance: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn state(&self) -> ModuleState {
        *self.state.lock()
    }

    /// Runs [`Module::init`]. Only valid from `Unloaded`.
    pub fn load(&self) -> Result {
        {
            let mut state = self.state.lock();
            if *state != ModuleState::Unloaded {
                pr_warn!("{}: load requested while {:?}", self.name, *state);
                return Err(EBUSY);
            }
            *state = ModuleState::Loading;
        }
        match M::init(&self.kernel) {
            Ok(module) => {
                *self.instance.lock() = Some(module);
                *self.state.lock() = ModuleState::Active;
                pr_info!("{}: loaded", self.name);
                Ok(())
            }
            Err(e) => {
                *self.state.lock() = ModuleState::Unloaded;
                pr_warn!("{}: load failed: {:?}", self.name, e);
                Err(e)
            }
        }
    }

    /// Drops the live instance. Does nothing unless `Active`.
    pub fn unload(&self) {
        {
            let mut state = self.state.lock();
            if *state != ModuleState::Active {
                return;
            }
            *state = ModuleState::Unloading;
        }
        let module = self.instance.lock().take();
        drop(module);
        *self.state.lock() = ModuleState::Unloaded;
        pr_info!("{}: unloaded", self.name);
    }

    /// `init_module` entry point: `0` or a negative errno.
    pub fn init_module(&self) -> c_int {
        match self.load() {
            Ok(()) => 0,
            Err(e) => e.to_errno(),
        }
    }

    /// `cleanup_module` entry point.
    pub fn cleanup_module(&self) {
        self.unload()
    }

    /// Runs `f` against the live instance, if there is one.
    pub fn with<R>(&self, f: impl FnOnce(&M) -> R) -> Option<R> {
        self.instance.lock().as_ref().map(f)
    }
}

impl<M: Module> Drop for ModuleSlot<M> {
    fn drop(&mut self) {
        self.unload();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{chrdev, code::ENOMEM, fs::FileOperations, host::Faults};

    struct Nop;
    impl FileOperations for Nop {}

    struct Demo {
        _reg: chrdev::Registration,
    }

    impl Module for Demo {
        fn init(kernel: &Arc<Kernel>) -> Result<Self> {
            let reg = chrdev::builder(kernel, "demo")?
                .class("demo")?
                .node("demo")?
                .bind(Arc::new(Nop))?;
            Ok(Demo { _reg: reg })
        }
    }

    #[test]
    fn load_then_unload() {
        let kernel = Kernel::new();
        let slot = ModuleSlot::<Demo>::new(&kernel, "demo");
        assert_eq!(slot.state(), ModuleState::Unloaded);
        assert_eq!(slot.init_module(), 0);
        assert_eq!(slot.state(), ModuleState::Active);
        assert!(slot.with(|_| ()).is_some());
        assert_eq!(slot.load(), Err(EBUSY));

        slot.cleanup_module();
        assert_eq!(slot.state(), ModuleState::Unloaded);
        assert!(slot.with(|_| ()).is_none());
        assert!(kernel.is_quiescent());

        // Unloading twice is harmless.
        slot.cleanup_module();
    }

    #[test]
    fn failed_load_returns_to_unloaded() {
        let kernel = Kernel::new();
        let slot = ModuleSlot::<Demo>::new(&kernel, "demo");
        kernel.inject(Faults::DEVICE_CREATE);
        assert_eq!(slot.init_module(), ENOMEM.to_errno());
        assert_eq!(slot.state(), ModuleState::Unloaded);
        assert!(kernel.is_quiescent());
        assert_eq!(slot.init_module(), 0);
    }

    #[test]
    fn dropping_the_slot_unloads() {
        let kernel = Kernel::new();
        {
            let slot = ModuleSlot::<Demo>::new(&kernel, "demo");
            slot.load().unwrap();
            assert!(!kernel.is_quiescent());
        }
        assert!(kernel.is_quiescent());
    }
}
