//! CLI Adapter
//!
//! Command-line interface for TradeVault.
//! Uses clap derive macros for argument parsing.

mod commands;

pub use commands::{CliApp, Command, ImportCmd, ListCmd, NetworkOptions, ShowCmd, DEFAULT_PORT};
