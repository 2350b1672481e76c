// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `equinox-automation`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "equinox-automation",
    version,
    about = "Check and run Equinox instruction sets.",
    long_about = None
)]
pub struct CliArgs {
    /// Instruction set to process (`.xml` or `.json`).
    #[arg(long, value_name = "PATH")]
    pub instructions: String,

    /// Path to the collaborator config file (TOML).
    ///
    /// A missing file means defaults: no operation commands, default pools.
    #[arg(long, value_name = "PATH", default_value = "Equinox.toml")]
    pub config: String,

    /// Check the instruction set and print the operation plan, but don't
    /// execute anything.
    #[arg(long)]
    pub check_only: bool,

    /// Convert the instruction set to the format implied by the extension of
    /// OUT (XML <-> JSON) and exit.
    #[arg(long, value_name = "OUT", conflicts_with = "check_only")]
    pub convert: Option<String>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `EQUINOX_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
