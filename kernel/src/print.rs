//! Printing facilities.
//!
//! `printk` appends one line to the host's log ring, which can be dumped
//! with [`dmesg`]. The `pr_*` macros are the only way kernel code writes to
//! it.

use alloc::{collections::VecDeque, string::String, vec::Vec};
use core::{cmp, fmt};

use spin::Mutex;

pub const KERN_ERR: u8 = 3;
pub const KERN_WARNING: u8 = 4;
pub const KERN_INFO: u8 = 6;
pub const KERN_DEBUG: u8 = 7;

// From kernel/print/printk.c
const LOG_LINE_MAX: usize = 1024 - 32;

/// Lines kept before the oldest ones are overwritten.
const LOG_BUF_LINES: usize = 1024;

static LOG_BUF: Mutex<VecDeque<LogRecord>> = Mutex::new(VecDeque::new());

/// A single line of the log ring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogRecord {
    pub level: u8,
    pub text: String,
}

#[doc(hidden)]
pub struct LogLineWriter {
    data: [u8; LOG_LINE_MAX],
    pos: usize,
}

#[allow(clippy::new_without_default)]
impl LogLineWriter {
    pub fn new() -> LogLineWriter {
        LogLineWriter {
            data: [0u8; LOG_LINE_MAX],
            pos: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.pos]
    }
}

impl fmt::Write for LogLineWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let copy_len = cmp::min(LOG_LINE_MAX - self.pos, s.as_bytes().len());
        self.data[self.pos..self.pos + copy_len].copy_from_slice(&s.as_bytes()[..copy_len]);
        self.pos += copy_len;
        Ok(())
    }
}

#[doc(hidden)]
pub fn printk(level: u8, args: fmt::Arguments<'_>) {
    let mut writer = LogLineWriter::new();
    // Lines longer than LOG_LINE_MAX are truncated, never rejected.
    let _ = fmt::write(&mut writer, args);
    let text = String::from_utf8_lossy(writer.as_bytes()).into_owned();

    let mut buf = LOG_BUF.lock();
    if buf.len() == LOG_BUF_LINES {
        buf.pop_front();
    }
    buf.push_back(LogRecord { level, text });
}

/// Returns a snapshot of the log ring, oldest line first.
pub fn dmesg() -> Vec<LogRecord> {
    LOG_BUF.lock().iter().cloned().collect()
}

#[macro_export]
macro_rules! pr_err {
    ($($arg:tt)*) => {
        $crate::print::printk($crate::print::KERN_ERR, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! pr_warn {
    ($($arg:tt)*) => {
        $crate::print::printk($crate::print::KERN_WARNING, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! pr_info {
    ($($arg:tt)*) => {
        $crate::print::printk($crate::print::KERN_INFO, format_args!($($arg)*))
    };
}

/// Only recorded in debug builds, like `pr_debug` without dynamic debug.
#[macro_export]
macro_rules! pr_debug {
    ($($arg:tt)*) => {
        if cfg!(debug_assertions) {
            $crate::print::printk($crate::print::KERN_DEBUG, format_args!($($arg)*))
        }
    };
}
