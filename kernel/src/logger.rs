use log::{Level, LevelFilter, Log, Metadata, Record};

use crate::{pr_debug, pr_err, pr_info, pr_warn};

struct SimpleLogger;

impl Log for SimpleLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }
    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let module_path = record.module_path().unwrap_or_default();
        match record.level() {
            Level::Error => {
                pr_err!("[ERROR] [{}] {}", module_path, record.args());
            }
            Level::Warn => {
                pr_warn!("[ WARN] [{}] {}", module_path, record.args());
            }
            Level::Info => {
                pr_info!("[ INFO] [{}] {}", module_path, record.args());
            }
            Level::Debug => {
                pr_debug!("[DEBUG] [{}] {}", module_path, record.args());
            }
            Level::Trace => {
                pr_debug!("[TRACE] [{}] {}", module_path, record.args());
            }
        };
    }
    fn flush(&self) {}
}

fn level_from_env() -> LevelFilter {
    match option_env!("LOG") {
        Some("ERROR") => LevelFilter::Error,
        Some("WARN") => LevelFilter::Warn,
        Some("INFO") => LevelFilter::Info,
        Some("DEBUG") => LevelFilter::Debug,
        Some("TRACE") => LevelFilter::Trace,
        _ => LevelFilter::Info,
    }
}

/// Routes the `log` facade into the printk ring.
///
/// Safe to call more than once; only the first call installs the logger.
pub fn init_logger() {
    if log::set_logger(&SimpleLogger).is_ok() {
        pr_info!("Init logger {:?}", option_env!("LOG"));
    }
    log::set_max_level(level_from_env());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::print::{dmesg, KERN_WARNING};

    #[test]
    fn log_records_reach_the_ring() {
        init_logger();
        init_logger();
        log::warn!("logger test marker");
        let found = dmesg()
            .into_iter()
            .any(|r| r.level == KERN_WARNING && r.text.ends_with("logger test marker"));
        assert!(found);
    }
}
