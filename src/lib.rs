//! TradeVault - Failed trades registry
//!
//! Keeps the last known state of every failed trade in memory and on disk.
//!
//! # Modules
//!
//! - `domain`: Trades and offers (persisted form plus runtime collaborators)
//! - `ports`: Trait abstractions (DurableStore, PersistenceResolver, IdentityPort, PriceFeedPort, WalletPort)
//! - `adapters`: External implementations (file store, codecs, key ring, wallet, price feed, CLI)
//! - `config`: Configuration loading and validation
//! - `application`: FailedTradesManager and the transient repair step

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod config;
pub mod application;
