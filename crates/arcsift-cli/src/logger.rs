//! Minimal stderr backend for the `log` facade used by arcsift-core.

use console::style;
use log::Level;
use log::LevelFilter;
use log::Log;
use log::Metadata;
use log::Record;

struct StderrLogger;

static LOGGER: StderrLogger = StderrLogger;

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= log::max_level()
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let level = match record.level() {
            Level::Error => style("error").red().bold(),
            Level::Warn => style("warn").yellow().bold(),
            Level::Info => style("info").green(),
            Level::Debug => style("debug").blue(),
            Level::Trace => style("trace").dim(),
        };
        eprintln!("{level}: {}", record.args());
    }

    fn flush(&self) {}
}

/// Maps `--verbose`/`--quiet` to a log level.
pub const fn level_for(verbose: bool, quiet: bool) -> LevelFilter {
    if verbose {
        LevelFilter::Debug
    } else if quiet {
        LevelFilter::Error
    } else {
        LevelFilter::Warn
    }
}

/// Installs the logger. A second call keeps the first logger.
pub fn init(verbose: bool, quiet: bool) {
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(level_for(verbose, quiet));
    }
}
