//! GPIO lines.
//!
//! The host exposes a single chip whose lines are requested by number. A
//! line must be requested before its direction is set or its level touched,
//! and is freed exactly once: [`Pin`] tracks whether it still holds the line
//! and gives it back either through [`Pin::free`] or on drop.
//!
//! Levels follow the legacy integer GPIO API: outputs are written with
//! [`Pin::set_value`], inputs are sampled with [`Pin::get_value`]. Whatever
//! sits on the other end of an input line drives it through
//! [`Kernel::drive_input`].

use alloc::{string::String, sync::Arc, vec::Vec};

use bitflags::bitflags;
use spin::Mutex;

use crate::{
    code::{EBUSY, EINVAL, EIO, EPERM},
    error::KernelResult as Result,
    host::{Event, Faults},
    pr_info, pr_warn, Kernel,
};

/// Lines on the 40-pin header chip (BCM2835 numbering).
pub const DEFAULT_NGPIO: u32 = 54;

bitflags! {
    /// Per-line state bits, as in `struct gpio_desc::flags`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LineFlags: u32 {
        const REQUESTED = 1 << 0;
        const IS_OUT = 1 << 1;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

#[derive(Default)]
struct Line {
    flags: LineFlags,
    level: bool,
    label: Option<String>,
}

pub(crate) struct Chip {
    lines: Mutex<Vec<Line>>,
}

impl Chip {
    pub(crate) fn new(ngpio: u32) -> Chip {
        Chip {
            lines: Mutex::new((0..ngpio).map(|_| Line::default()).collect()),
        }
    }

    pub(crate) fn requested_count(&self) -> usize {
        self.lines
            .lock()
            .iter()
            .filter(|line| line.flags.contains(LineFlags::REQUESTED))
            .count()
    }
}

impl Kernel {
    /// `gpio_request`.
    pub(crate) fn gpio_request(&self, number: u32, label: &str) -> Result {
        {
            let mut lines = self.gpio.lines.lock();
            let line = lines.get_mut(number as usize).ok_or(EINVAL)?;
            if line.flags.contains(LineFlags::REQUESTED) {
                return Err(EBUSY);
            }
            if self.take_fault(Faults::GPIO_REQUEST) {
                return Err(EBUSY);
            }
            line.flags.insert(LineFlags::REQUESTED);
            line.label = Some(String::from(label));
        }
        self.record(Event::PinRequested(number));
        Ok(())
    }

    /// `gpio_free`.
    pub(crate) fn gpio_free(&self, number: u32) {
        {
            let mut lines = self.gpio.lines.lock();
            let Some(line) = lines.get_mut(number as usize) else {
                return;
            };
            if !line.flags.contains(LineFlags::REQUESTED) {
                pr_warn!("gpio{}: freeing a line that was not requested", number);
                return;
            }
            line.flags.remove(LineFlags::REQUESTED);
            line.label = None;
        }
        self.record(Event::PinFreed(number));
    }

    fn gpio_set_direction(&self, number: u32, direction: Direction, initial: bool) -> Result {
        {
            let mut lines = self.gpio.lines.lock();
            let line = requested(&mut lines, number)?;
            if self.take_fault(Faults::GPIO_DIRECTION) {
                return Err(EIO);
            }
            match direction {
                Direction::Output => {
                    line.flags.insert(LineFlags::IS_OUT);
                    line.level = initial;
                }
                Direction::Input => line.flags.remove(LineFlags::IS_OUT),
            }
        }
        self.record(Event::PinDirection(number, direction));
        if direction == Direction::Output {
            self.record(Event::PinLevel(number, initial));
        }
        Ok(())
    }

    fn gpio_set_value(&self, number: u32, level: bool) -> Result {
        {
            let mut lines = self.gpio.lines.lock();
            let line = requested(&mut lines, number)?;
            if !line.flags.contains(LineFlags::IS_OUT) {
                return Err(EPERM);
            }
            if self.take_fault(Faults::GPIO_VALUE) {
                return Err(EIO);
            }
            line.level = level;
        }
        self.record(Event::PinLevel(number, level));
        Ok(())
    }

    fn gpio_get_value(&self, number: u32) -> Result<bool> {
        let mut lines = self.gpio.lines.lock();
        let line = requested(&mut lines, number)?;
        if line.flags.contains(LineFlags::IS_OUT) {
            return Err(EPERM);
        }
        if self.take_fault(Faults::GPIO_VALUE) {
            return Err(EIO);
        }
        Ok(line.level)
    }

    /// Drives the level an input line reads back. Output lines refuse.
    pub fn drive_input(&self, number: u32, level: bool) -> Result {
        let mut lines = self.gpio.lines.lock();
        let line = lines.get_mut(number as usize).ok_or(EINVAL)?;
        if line.flags.contains(LineFlags::IS_OUT) {
            return Err(EPERM);
        }
        line.level = level;
        Ok(())
    }

    /// The level currently on a line, whoever drives it.
    pub fn line_level(&self, number: u32) -> Option<bool> {
        self.gpio.lines.lock().get(number as usize).map(|line| line.level)
    }

    pub fn line_flags(&self, number: u32) -> Option<LineFlags> {
        self.gpio.lines.lock().get(number as usize).map(|line| line.flags)
    }

    /// The consumer label of a requested line.
    pub fn line_label(&self, number: u32) -> Option<String> {
        self.gpio
            .lines
            .lock()
            .get(number as usize)
            .and_then(|line| line.label.clone())
    }
}

fn requested(lines: &mut [Line], number: u32) -> Result<&mut Line> {
    let line = lines.get_mut(number as usize).ok_or(EINVAL)?;
    if !line.flags.contains(LineFlags::REQUESTED) {
        return Err(EPERM);
    }
    Ok(line)
}

/// Requests line `number` for the consumer `label`.
pub fn request(kernel: &Arc<Kernel>, number: u32, label: &str) -> Result<Pin> {
    kernel.gpio_request(number, label)?;
    pr_info!("gpio{}: requested by {}", number, label);
    Ok(Pin {
        kernel: kernel.clone(),
        number,
        held: true,
    })
}

/// A requested GPIO line.
pub struct Pin {
    kernel: Arc<Kernel>,
    number: u32,
    held: bool,
}

impl Pin {
    pub fn number(&self) -> u32 {
        self.number
    }

    /// Configures the line as an output driving `initial`.
    pub fn direction_output(&self, initial: bool) -> Result {
        self.kernel
            .gpio_set_direction(self.number, Direction::Output, initial)
    }

    pub fn direction_input(&self) -> Result {
        self.kernel
            .gpio_set_direction(self.number, Direction::Input, false)
    }

    /// Only valid on an output line.
    pub fn set_value(&self, level: bool) -> Result {
        self.kernel.gpio_set_value(self.number, level)
    }

    /// Only valid on an input line.
    pub fn get_value(&self) -> Result<bool> {
        self.kernel.gpio_get_value(self.number)
    }

    /// Gives the line back to the chip.
    pub fn free(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.held {
            self.held = false;
            self.kernel.gpio_free(self.number);
        }
    }
}

impl Drop for Pin {
    fn drop(&mut self) {
        self.release();
    }
}
