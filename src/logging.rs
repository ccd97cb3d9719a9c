//! Diagnostic logging for the shell itself.
//!
//! Off by default so nothing but command output reaches the terminal.

use log::LevelFilter;
use simplelog::{ColorChoice, ConfigBuilder, TermLogger, TerminalMode, WriteLogger};
use std::fs::OpenOptions;
use std::path::Path;

/// Install the global logger.
///
/// With `log_file` set, records are appended to that file; otherwise they go
/// to stderr. Does nothing when `level` is [`LevelFilter::Off`].
pub fn init(level: LevelFilter, log_file: Option<&Path>) -> anyhow::Result<()> {
    if level == LevelFilter::Off {
        return Ok(());
    }

    let config = ConfigBuilder::new()
        .set_target_level(LevelFilter::Error)
        .set_time_format_rfc3339()
        .build();

    match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            WriteLogger::init(level, config, file)?;
        }
        None => TermLogger::init(level, config, TerminalMode::Stderr, ColorChoice::Auto)?,
    }
    Ok(())
}
