//! Command line interface
//!
//! Every option can also be set through its `DYNDNS_*` environment variable.

use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use tracing::Level;

/// Configuration file locations tried in order when none is given
pub const DEFAULT_CONFIG_PATHS: [&str; 2] = ["/etc/dyndns/config.json", "./config.json"];

/// Default bind address of the update endpoint
pub const DEFAULT_LISTEN: &str = "127.0.0.1:8080";

/// dyndnsd: dynamic DNS update gateway
///
/// Accepts `GET /dyndns` update requests from routers and other clients and
/// applies them to the `A` records of a DNS provider.
#[derive(Debug, Parser)]
#[command(name = "dyndnsd")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to run (defaults to `serve`)
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Path to the JSON configuration file
    #[arg(long, short, env = "DYNDNS_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Address the update endpoint binds to
    #[arg(long, env = "DYNDNS_LISTEN", default_value = DEFAULT_LISTEN, global = true)]
    pub listen: SocketAddr,

    /// Log verbosity
    #[arg(long = "log-level", env = "DYNDNS_LOG_LEVEL", value_enum, default_value_t = LogLevel::Info, global = true)]
    pub log_level: LogLevel,
}

/// Subcommands for dyndnsd
#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Serve the update endpoint until SIGINT/SIGTERM
    Serve,

    /// Set one configured host to an address and exit
    Update {
        /// Host label, e.g. `nas`
        #[arg(long)]
        hostname: String,

        /// Zone the host lives in, e.g. `example.org`
        #[arg(long)]
        domain: String,

        /// IPv4 address to set
        #[arg(long)]
        ip: Ipv4Addr,
    },

    /// Load and validate the configuration, print the managed names and exit
    Check,
}

/// Log level argument for CLI parsing
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => Level::TRACE,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Info => Level::INFO,
            LogLevel::Warn => Level::WARN,
            LogLevel::Error => Level::ERROR,
        }
    }
}

impl Cli {
    /// Subcommand, with `serve` when none was given
    pub fn subcommand(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }

    /// Configuration file to use
    ///
    /// An explicit path wins. Otherwise the first default location that
    /// exists, or the first default location so the error names it.
    pub fn config_path(&self) -> PathBuf {
        if let Some(path) = &self.config {
            return path.clone();
        }
        resolve_default_config(&DEFAULT_CONFIG_PATHS)
    }
}

fn resolve_default_config(candidates: &[&str]) -> PathBuf {
    candidates
        .iter()
        .map(Path::new)
        .find(|path| path.exists())
        .or_else(|| candidates.first().map(Path::new))
        .map(Path::to_path_buf)
        .unwrap_or_default()
}
