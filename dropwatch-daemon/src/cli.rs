//! CLI argument definitions for dropwatch.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use dropwatch_core::config::DropwatchConfig;

/// Linux packet drop monitor.
///
/// Subscribes to the kernel drop monitor (NET_DM), decodes each drop alert,
/// dissects the dropped packet and forwards the result to the configured
/// exporters (console, pcap, telegraf).
#[derive(Parser, Debug)]
#[command(name = "dropwatch")]
#[command(version, about, long_about = None)]
pub struct DaemonCli {
    /// Path to dropwatch.toml configuration file.
    ///
    /// A missing file is not an error: built-in defaults are used instead.
    #[arg(short, long, default_value = "/etc/dropwatch/dropwatch.toml")]
    pub config: PathBuf,

    /// Print every drop alert to stdout (enables the console exporter).
    #[arg(short, long)]
    pub verbose: bool,

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

    /// Validate configuration file and exit without starting the daemon.
    #[arg(long)]
    pub check: bool,
}

impl DaemonCli {
    /// Apply command-line overrides on top of an already loaded configuration.
    pub fn apply_overrides(&self, config: &mut DropwatchConfig) {
        if let Some(level) = &self.log_level {
            config.general.log_level = level.clone();
        }
        if let Some(format) = &self.log_format {
            config.general.log_format = format.clone();
        }
    }
}
