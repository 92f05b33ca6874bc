//! Ports Layer - Trait definitions for the registry's collaborators
//!
//! Following hexagonal architecture, these traits abstract:
//! - Durable storage and the record codec
//! - Identity (offer ownership)
//! - Price feed and wallet, attached to records at runtime

pub mod storage;
pub mod identity;
pub mod price_feed;
pub mod wallet;
pub mod mocks;

pub use storage::{CodecError, DurableStore, PersistenceResolver, StorageError, StoreError, TradableStorage};
pub use identity::IdentityPort;
pub use price_feed::PriceFeedPort;
pub use wallet::WalletPort;
pub use mocks::MemoryStore;
