//! Storage Port
//!
//! The durable store moves bytes under a logical name; the resolver turns
//! those bytes into trade records and back. `TradableStorage` binds the two to
//! one collection and is the storage handle handed to every trade.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

use crate::domain::trade::{PersistedTrade, Trade};

#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("Failed to read {0}")]
    ReadError(String),

    #[error("Failed to write {0}")]
    WriteError(String),

    #[error("Failed to create directory: {0}")]
    DirectoryError(String),

    #[error("Failed to move unreadable store aside: {0}")]
    QuarantineError(String),

    #[error("Failed to back up store: {0}")]
    BackupError(String),
}

#[derive(Error, Debug, Clone)]
pub enum CodecError {
    #[error("Failed to serialize trades: {0}")]
    SerializationError(String),

    #[error("Failed to deserialize trades: {0}")]
    DeserializationError(String),

    #[error("Unsupported store version {found}, expected {expected}")]
    UnsupportedVersion { found: u32, expected: u32 },
}

#[derive(Error, Debug, Clone)]
pub enum StorageError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Codec(#[from] CodecError),
}

/// Byte-level durable store
pub trait DurableStore: Send + Sync + fmt::Debug {
    /// Load the bytes stored under `name`, `None` if nothing was stored yet
    fn load(&self, name: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replace the bytes stored under `name`. Must be atomic.
    fn persist(&self, name: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Move unreadable content under `name` out of the way so the next
    /// `persist` cannot overwrite it. No content is not an error.
    fn quarantine(&self, name: &str) -> Result<(), StoreError>;

    /// Keep a copy of the content under `name`, leaving the original in place
    fn backup(&self, name: &str) -> Result<(), StoreError>;
}

/// Codec between persisted bytes and trade records
pub trait PersistenceResolver: Send + Sync + fmt::Debug {
    fn encode(&self, trades: &[PersistedTrade]) -> Result<Vec<u8>, CodecError>;

    fn decode(&self, bytes: &[u8]) -> Result<Vec<PersistedTrade>, CodecError>;
}

/// Storage handle for one named trade collection
#[derive(Debug)]
pub struct TradableStorage {
    store: Arc<dyn DurableStore>,
    resolver: Arc<dyn PersistenceResolver>,
    file_name: String,
    dirty: AtomicBool,
}

impl TradableStorage {
    pub fn new(
        store: Arc<dyn DurableStore>,
        resolver: Arc<dyn PersistenceResolver>,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            store,
            resolver,
            file_name: file_name.into(),
            dirty: AtomicBool::new(false),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Load and decode the collection. Nothing stored yet yields an empty list.
    pub fn load(&self) -> Result<Vec<PersistedTrade>, StorageError> {
        match self.store.load(&self.file_name)? {
            Some(bytes) => Ok(self.resolver.decode(&bytes)?),
            None => Ok(Vec::new()),
        }
    }

    /// Encode and write the full collection
    ///
    /// Clears the pending-save flag first; a failed write sets it again so
    /// the next flush retries.
    pub fn persist(&self, trades: &[Arc<Trade>]) -> Result<(), StorageError> {
        self.dirty.store(false, Ordering::SeqCst);

        let records: Vec<PersistedTrade> = trades.iter().map(|t| t.to_record()).collect();
        let result = self
            .resolver
            .encode(&records)
            .map_err(StorageError::from)
            .and_then(|bytes| {
                self.store
                    .persist(&self.file_name, &bytes)
                    .map_err(StorageError::from)
            });

        if result.is_err() {
            self.dirty.store(true, Ordering::SeqCst);
        }
        result
    }

    /// Mark the collection as changed since the last write
    pub fn queue_up_for_save(&self) {
        self.dirty.store(true, Ordering::SeqCst);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::SeqCst)
    }

    pub fn quarantine(&self) -> Result<(), StorageError> {
        Ok(self.store.quarantine(&self.file_name)?)
    }

    /// Copy the stored collection aside before it is rewritten
    pub fn backup(&self) -> Result<(), StorageError> {
        Ok(self.store.backup(&self.file_name)?)
    }
}
