//! CLI argument definitions for logstreamer-daemon.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

/// Log streaming daemon.
///
/// Tails every log file under the configured directories, extracts fields
/// with per-group regex rules and writes typed points as JSON lines to stdout.
#[derive(Parser, Debug)]
#[command(name = "logstreamer-daemon")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to logstreamer.toml configuration file.
    #[arg(short, long, default_value = "/etc/logstreamer/logstreamer.toml")]
    pub config: PathBuf,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,

    /// Validate configuration file (including group regexes) and exit.
    #[arg(long)]
    pub validate: bool,
}

impl DaemonCli {
    /// Apply CLI overrides on top of the loaded `[general]` section.
    pub fn apply_overrides(&self, general: &mut logstreamer_core::config::GeneralConfig) {
        if let Some(level) = &self.log_level {
            general.log_level.clone_from(level);
        }
        if let Some(format) = &self.log_format {
            general.log_format.clone_from(format);
        }
    }
}
