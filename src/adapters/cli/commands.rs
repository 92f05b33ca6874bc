//! CLI Command Definitions
//!
//! Global network options (peer id, port, interface, name suffix) are parsed
//! here and handed to the node at startup. The registry does not read them.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::config::BASE_APP_NAME;

/// Default listen port
pub const DEFAULT_PORT: u16 = 5000;

/// TradeVault - registry of failed trades
#[derive(Parser, Debug)]
#[command(
    name = "tradevault",
    version = env!("CARGO_PKG_VERSION"),
    about = "Inspect and maintain the failed trades registry",
    long_about = "TradeVault keeps the last known state of every failed trade on disk \
                  so funds still locked in a deposit are never forgotten."
)]
pub struct CliApp {
    /// The command to execute
    #[command(subcommand)]
    pub command: Command,

    /// Seed peer ID
    #[arg(short = 'd', long = "peerid", value_name = "PEERID", global = true)]
    pub peer_id: Option<String>,

    /// IP port to listen on
    #[arg(short, long, value_name = "PORT", default_value_t = DEFAULT_PORT, global = true)]
    pub port: u16,

    /// Network interface to listen on
    #[arg(short, long, value_name = "INTERFACE", global = true)]
    pub interface: Option<String>,

    /// Append name to application name
    #[arg(short, long, value_name = "NAME", global = true)]
    pub name: Option<String>,

    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", default_value = "config/tradevault.toml", global = true)]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List failed trades
    List(ListCmd),

    /// Show one failed trade
    Show(ShowCmd),

    /// Register a failed trade from a JSON record
    Import(ImportCmd),

    /// Print this node's identity key
    Whoami,
}

/// List failed trades
#[derive(Parser, Debug)]
pub struct ListCmd {
    /// Only trades with funds still locked
    #[arg(short, long)]
    pub locked: bool,
}

/// Show one failed trade
#[derive(Parser, Debug)]
pub struct ShowCmd {
    /// Trade id
    #[arg(value_name = "ID")]
    pub id: String,
}

/// Register a failed trade
#[derive(Parser, Debug)]
pub struct ImportCmd {
    /// JSON file holding one persisted trade
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

/// Network options the node is started with
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkOptions {
    pub peer_id: Option<String>,
    pub port: u16,
    pub interface: Option<String>,
}

impl CliApp {
    /// Application name with the `--name` suffix appended
    pub fn app_name(&self) -> String {
        match &self.name {
            Some(suffix) => format!("{}{}", BASE_APP_NAME, suffix),
            None => BASE_APP_NAME.to_string(),
        }
    }

    pub fn network_options(&self) -> NetworkOptions {
        NetworkOptions {
            peer_id: self.peer_id.clone(),
            port: self.port,
            interface: self.interface.clone(),
        }
    }
}
