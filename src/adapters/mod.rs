//! Adapters Layer - External System Implementations
//!
//! This module contains implementations of the port traits:
//! - Storage: file-backed durable store and record codecs
//! - Solana: identity key ring and wallet keypairs
//! - Market Data: last-price cache used as the offers' price feed
//! - CLI: Command-line interface definitions

pub mod storage;
pub mod solana;
pub mod market_data;
pub mod cli;

pub use storage::{BincodeResolver, CodecKind, FileStore, JsonResolver};
pub use solana::{KeyRing, WalletManager};
pub use market_data::PriceFeedService;
pub use cli::CliApp;
