//! Structured logging for VolumeBot
//!
//! - Standard levels (Error/Warning/Info/Debug/Verbose)
//! - Per-tag debug control via `--debug-<tag>` flags
//! - Colored console output plus a daily log file
//!
//! ```rust,ignore
//! use volumebot::logger::{self, LogTag};
//!
//! logger::init();
//! logger::info(LogTag::Engine, "Iteration complete");
//! logger::debug(LogTag::Relay, "Bundle payload: ..."); // only with --debug-relay
//! ```

mod config;
mod core;
mod file;
mod format;
mod levels;
mod tags;

pub use config::{
    config_from_args, get_logger_config, init_from_args, set_logger_config, LoggerConfig,
};
pub use levels::LogLevel;
pub use tags::LogTag;

/// Initialize the logger once at startup
///
/// Reads debug flags from the stored command-line arguments and opens the
/// log file unless `--no-log-file` was given.
pub fn init() {
    config::init_from_args();

    if config::get_logger_config().file_logging {
        file::init_file_logging();
    }
}

/// Always shown
pub fn error(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Error, message);
}

/// Shown unless below the minimum level
pub fn warning(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Warning, message);
}

pub fn info(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Info, message);
}

/// Only shown with `--debug-<tag>`
pub fn debug(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Debug, message);
}

/// Only shown with `--verbose` or `--verbose-<tag>`
pub fn verbose(tag: LogTag, message: &str) {
    core::log_internal(tag, LogLevel::Verbose, message);
}

/// Flush pending file writes; call during shutdown
pub fn flush() {
    file::flush_file_logging();
}
