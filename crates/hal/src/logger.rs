//! TEAM_464: `log` backend.
//!
//! Records are formatted into whatever [`LogSink`] the board registers,
//! usually the console UART. Filtering is by level only.

use core::fmt::{self, Write};
use log::{LevelFilter, Metadata, Record, SetLoggerError};
use pfs_utils::Once;

/// Destination for formatted log lines.
pub trait LogSink: Sync {
    fn write_str(&self, s: &str);
}

struct SinkWriter<'a>(&'a dyn LogSink);

impl Write for SinkWriter<'_> {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        self.0.write_str(s);
        Ok(())
    }
}

struct SinkLogger {
    sink: Once<&'static dyn LogSink>,
}

static LOGGER: SinkLogger = SinkLogger { sink: Once::new() };

impl log::Log for SinkLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Some(sink) = self.sink.get() {
            let mut w = SinkWriter(*sink);
            let _ = writeln!(w, "[{}] {}: {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {}
}

/// Route `log` output to `sink`.
///
/// # Arguments
/// * `max_level` - The maximum log level to display.
pub fn init(sink: &'static dyn LogSink, max_level: LevelFilter) -> Result<(), SetLoggerError> {
    LOGGER.sink.call_once(|| sink);
    log::set_logger(&LOGGER)?;
    log::set_max_level(max_level);
    Ok(())
}
