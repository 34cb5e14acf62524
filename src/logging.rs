//! Logger installation.
//!
//! The crate logs through the `log` facade; hosts install a terminal logger
//! with [`init`]. Tests call [`init_for_tests`].

use log::{LevelFilter, SetLoggerError};
use simplelog::{ColorChoice, CombinedLogger, Config, TermLogger, TerminalMode};

/// Installs a terminal logger at `level`.
///
/// # Errors
/// Returns `SetLoggerError` if a global logger is already installed.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    CombinedLogger::init(vec![TermLogger::new(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )])
}

/// Installs a debug-level logger, or does nothing if one is already set.
pub fn init_for_tests() {
    let level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    let _ = init(level);
}
