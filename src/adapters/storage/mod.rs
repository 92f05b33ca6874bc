//! Storage Adapters
//!
//! Durable store and codec implementations for the trade collection.

mod codec;
mod file_store;

pub use codec::{BincodeResolver, CodecKind, JsonResolver, STORE_VERSION};
pub use file_store::FileStore;
