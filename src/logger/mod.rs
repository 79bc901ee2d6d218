//! Log output for the controller
//!
//! Every record becomes one line on stderr:
//! `12:00:00.123 INFO  [clock] 440 Hz -> clock divisor 42`, where the bracket
//! holds the thread name so the three loops can be told apart.

use std::env;
use std::io::{self, Write};
use std::thread;

use chrono::Local;
use log::{LevelFilter, Log, Metadata, Record, SetLoggerError};

use crate::config::LOG_ENV;

struct StderrLogger {
    level: LevelFilter,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let current = thread::current();
        let thread = current.name().unwrap_or("?");
        let mut stderr = io::stderr().lock();
        // Nowhere left to report a failed log write.
        let _ = writeln!(
            stderr,
            "{} {:<5} [{}] {}",
            Local::now().format("%H:%M:%S%.3f"),
            record.level(),
            thread,
            record.args()
        );
    }

    fn flush(&self) {
        let _ = io::stderr().flush();
    }
}

/// Level for `verbosity` `-v` flags, falling back to `filter` then `Info`
pub fn level_for(verbosity: u64, filter: Option<&str>) -> LevelFilter {
    match verbosity {
        0 => filter
            .and_then(|f| f.trim().parse().ok())
            .unwrap_or(LevelFilter::Info),
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

/// Installs the stderr logger
pub fn init(verbosity: u64) -> Result<(), SetLoggerError> {
    let filter = env::var(LOG_ENV).ok();
    let level = level_for(verbosity, filter.as_deref());
    log::set_boxed_logger(Box::new(StderrLogger { level }))?;
    log::set_max_level(level);
    Ok(())
}
