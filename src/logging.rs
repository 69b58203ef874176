//! Logging backend for the runtime.
//!
//! A small `log::Log` implementation over stderr, so scheduler
//! transitions can be traced without the host application having to
//! wire up a logging crate itself. Hosts that already run a `log`
//! backend (`env_logger`, etc.) can call [`log::set_logger`] themselves
//! before [`crate::init`] runs and this module's `init` becomes a no-op.

use log::{Level, LevelFilter, Metadata, Record};
use std::io::Write;

struct StderrLogger;

impl log::Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= Level::Debug
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let _ = writeln!(
                std::io::stderr(),
                "[{}] {}",
                record.level(),
                record.args()
            );
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static LOGGER: StderrLogger = StderrLogger;

/// Install the default logger backend if one isn't already installed.
///
/// Safe to call more than once; only the first call can win, and a
/// host-installed logger always takes precedence.
pub fn init() {
    let _ = log::set_logger(&LOGGER).map(|()| log::set_max_level(LevelFilter::Debug));
}
