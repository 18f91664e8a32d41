//! Host services for loadable device-driver modules.
//!
//! A [`Kernel`] is the host a module is loaded into. Modules implement
//! [`Module`] and publish character devices through [`chrdev::builder`];
//! user space reaches them with [`Kernel::open`].

#![cfg_attr(not(test), no_std)]
extern crate alloc;

pub mod buf;
pub mod cdev;
pub mod chrdev;
pub mod class;
pub mod device;
pub mod error;
pub mod fs;
pub mod gpio;
pub mod host;
pub mod logger;
pub mod module;
pub mod print;

pub use error::linux_err as code;
pub use host::{Event, Faults, Kernel};
pub use module::{Module, ModuleSlot, ModuleState};
