use colored::Colorize;
use log::{Level, LevelFilter, Metadata, Record, SetLoggerError};

/// Prints the chain's log records with a coloured level prefix, errors to
/// stderr and everything else to stdout. Records from outside the cladohist
/// crates are only shown from `Warn` upwards.
pub struct MinimalLogger;

/// Where a formatted record is written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl MinimalLogger {
    fn is_own_target(target: &str) -> bool {
        target.starts_with("cladohist")
    }

    /// Formats `record` and selects its output stream.
    #[must_use]
    pub fn format(record: &Record) -> (LogStream, String) {
        let level_string = match record.level() {
            Level::Error => record.level().to_string().red(),
            Level::Warn => record.level().to_string().yellow(),
            Level::Info => record.level().to_string().cyan(),
            Level::Debug => record.level().to_string().purple(),
            Level::Trace => record.level().to_string().normal(),
        };

        let stream = if record.level() > LevelFilter::Error {
            LogStream::Stdout
        } else {
            LogStream::Stderr
        };

        (stream, format!("{:<5} {}", level_string, record.args()))
    }
}

impl log::Log for MinimalLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= log::max_level()
            && (metadata.level() <= Level::Warn || Self::is_own_target(metadata.target()))
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        match Self::format(record) {
            (LogStream::Stdout, line) => println!("{line}"),
            (LogStream::Stderr, line) => eprintln!("{line}"),
        }
    }

    fn flush(&self) {}
}

static LOGGER: MinimalLogger = MinimalLogger;

/// Installs the [`MinimalLogger`] as the global logger.
///
/// # Errors
///
/// Returns `SetLoggerError` if a global logger has already been installed.
pub fn init_logger(level: LevelFilter) -> Result<(), SetLoggerError> {
    log::set_logger(&LOGGER)?;
    log::set_max_level(level);

    Ok(())
}
