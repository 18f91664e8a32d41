//! GPIO device driver: LED control and pin-state reading from user space.
//!
//! Loading publishes `/dev/deviceFileGpioControl` and claims two lines: the
//! LED as an output (initially off) and a second line as an input. Writing
//! a payload whose first byte is `'1'` or `'0'` switches the LED on or off;
//! the rest of the payload is accepted and ignored. Reading returns the
//! input line's level as a single ASCII `'0'` or `'1'`.
//!
//! ```text
//! echo 1 > /dev/deviceFileGpioControl
//! head -c1 /dev/deviceFileGpioControl
//! ```

#![cfg_attr(not(test), no_std)]
extern crate alloc;

mod command;
pub mod config;

use alloc::sync::Arc;
use core::sync::atomic::{AtomicUsize, Ordering};

use kernel::{
    buf::{UserSlicePtrReader, UserSlicePtrWriter},
    chrdev,
    code::{EFAULT, ENODEV},
    error::KernelResult,
    fs::{File, FileOperations},
    gpio::{self, Pin},
    Kernel, Module,
};
use log::{info, warn};
use spin::Mutex;

pub use command::LedCommand;
pub use config::GpioConfig;

/// Writes are pulled in through a scratch buffer of this size.
const SCRATCH_LEN: usize = 64;

struct Lines {
    led: Pin,
    input: Pin,
}

/// The operation table of the GPIO node.
///
/// The lines are installed only once both are claimed and configured, and
/// taken back out before they are freed, so handlers never request or free
/// a line themselves.
pub struct GpioDevice {
    lines: Mutex<Option<Lines>>,
    open_count: AtomicUsize,
    rejected: AtomicUsize,
}

impl GpioDevice {
    fn new() -> Self {
        GpioDevice {
            lines: Mutex::new(None),
            open_count: AtomicUsize::new(0),
            rejected: AtomicUsize::new(0),
        }
    }

    fn install(&self, lines: Lines) {
        *self.lines.lock() = Some(lines);
    }

    fn take_lines(&self) -> Option<Lines> {
        self.lines.lock().take()
    }

    pub fn open_count(&self) -> usize {
        self.open_count.load(Ordering::Relaxed)
    }

    /// Writes whose first byte was neither `'0'` nor `'1'`.
    pub fn rejected_commands(&self) -> usize {
        self.rejected.load(Ordering::Relaxed)
    }

    fn apply(&self, command: LedCommand) -> KernelResult {
        let lines = self.lines.lock();
        let lines = lines.as_ref().ok_or(ENODEV)?;
        lines.led.set_value(command.level())?;
        info!("LED turned {:?}", command);
        Ok(())
    }

    fn input_level(&self) -> KernelResult<bool> {
        let lines = self.lines.lock();
        lines.as_ref().ok_or(ENODEV)?.input.get_value()
    }
}

impl FileOperations for GpioDevice {
    fn open(&self, _file: &File) -> KernelResult {
        let count = self.open_count.fetch_add(1, Ordering::Relaxed) + 1;
        info!("GPIO device file opened. Count = {}.", count);
        Ok(())
    }

    fn release(&self, _file: &File) {
        info!("GPIO device file closed/released.");
    }

    fn read(
        &self,
        _file: &File,
        buf: &mut UserSlicePtrWriter<'_>,
        _offset: u64,
    ) -> KernelResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let level = self.input_level()?;
        buf.write_slice(&[if level { b'1' } else { b'0' }])?;
        Ok(1)
    }

    fn write(
        &self,
        _file: &File,
        buf: &mut UserSlicePtrReader<'_>,
        _offset: u64,
    ) -> KernelResult<usize> {
        if buf.is_empty() {
            return Ok(0);
        }

        let mut scratch = [0u8; SCRATCH_LEN];
        let mut first = None;
        let mut accepted = 0;
        while !buf.is_empty() {
            let chunk = buf.len().min(SCRATCH_LEN);
            let residue = buf.read_partial(&mut scratch[..chunk])?;
            let copied = chunk - residue;
            if first.is_none() && copied > 0 {
                first = Some(scratch[0]);
            }
            accepted += copied;
            if residue != 0 {
                break;
            }
        }

        let Some(first) = first else {
            warn!("Failed to copy the command from user-space.");
            return Err(EFAULT);
        };
        match LedCommand::parse(first) {
            Some(command) => self.apply(command)?,
            None => {
                self.rejected.fetch_add(1, Ordering::Relaxed);
                warn!("Invalid input provided by user: {:#04x}.", first);
            }
        }
        Ok(accepted)
    }
}

/// The loaded module.
///
/// Dropping it drives the LED off, frees both lines, and only then lets the
/// registration unwind.
pub struct GpioControl {
    device: Arc<GpioDevice>,
    config: GpioConfig,
    _registration: chrdev::Registration,
}

impl GpioControl {
    pub fn with_config(kernel: &Arc<Kernel>, config: GpioConfig) -> KernelResult<Self> {
        let device = Arc::new(GpioDevice::new());
        let registration = chrdev::builder(kernel, config.driver_name)?
            .class(config.class_name)?
            .node(config.device_file_name)?
            .bind(device.clone())?;

        let led = gpio::request(kernel, config.led_gpio, config::LED_LABEL)?;
        led.direction_output(false)?;
        let input = gpio::request(kernel, config.input_gpio, config::INPUT_LABEL)?;
        input.direction_input()?;
        device.install(Lines { led, input });

        info!(
            "GPIO driver ready at {}: LED on gpio{}, input on gpio{}",
            registration.path(),
            config.led_gpio,
            config.input_gpio
        );
        Ok(GpioControl {
            device,
            config,
            _registration: registration,
        })
    }

    pub fn device(&self) -> &Arc<GpioDevice> {
        &self.device
    }

    pub fn config(&self) -> &GpioConfig {
        &self.config
    }
}

impl Module for GpioControl {
    fn init(kernel: &Arc<Kernel>) -> KernelResult<Self> {
        Self::with_config(kernel, GpioConfig::default())
    }
}

impl Drop for GpioControl {
    fn drop(&mut self) {
        if let Some(Lines { led, input }) = self.device.take_lines() {
            if let Err(e) = led.set_value(false) {
                warn!("Could not turn the LED off: {:?}", e);
            }
            input.free();
            led.free();
        }
        info!("GPIO driver unloaded.");
    }
}
