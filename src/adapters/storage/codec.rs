//! Record codecs
//!
//! Both codecs wrap the trade list in a versioned envelope so a store written
//! by an incompatible build is rejected instead of half-read.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::domain::trade::PersistedTrade;
use crate::ports::storage::{CodecError, PersistenceResolver};

/// Current envelope version
pub const STORE_VERSION: u32 = 1;

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    trades: &'a [PersistedTrade],
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    trades: Vec<PersistedTrade>,
}

impl Envelope {
    fn into_trades(self) -> Result<Vec<PersistedTrade>, CodecError> {
        if self.version != STORE_VERSION {
            return Err(CodecError::UnsupportedVersion {
                found: self.version,
                expected: STORE_VERSION,
            });
        }
        Ok(self.trades)
    }
}

/// Codec selection, as named in the config file
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    #[default]
    Json,
    Bincode,
}

impl CodecKind {
    /// Build the resolver for this codec
    pub fn resolver(self) -> Arc<dyn PersistenceResolver> {
        match self {
            CodecKind::Json => Arc::new(JsonResolver::new()),
            CodecKind::Bincode => Arc::new(BincodeResolver),
        }
    }
}

/// Human-readable JSON codec
#[derive(Debug, Clone)]
pub struct JsonResolver {
    pretty: bool,
}

impl JsonResolver {
    pub fn new() -> Self {
        Self { pretty: true }
    }

    /// Single-line output
    pub fn compact() -> Self {
        Self { pretty: false }
    }
}

impl Default for JsonResolver {
    fn default() -> Self {
        Self::new()
    }
}

impl PersistenceResolver for JsonResolver {
    fn encode(&self, trades: &[PersistedTrade]) -> Result<Vec<u8>, CodecError> {
        let envelope = EnvelopeRef {
            version: STORE_VERSION,
            trades,
        };
        let result = if self.pretty {
            serde_json::to_vec_pretty(&envelope)
        } else {
            serde_json::to_vec(&envelope)
        };
        result.map_err(|e| CodecError::SerializationError(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<PersistedTrade>, CodecError> {
        let envelope: Envelope = serde_json::from_slice(bytes)
            .map_err(|e| CodecError::DeserializationError(e.to_string()))?;
        envelope.into_trades()
    }
}

/// Compact binary codec
#[derive(Debug, Clone, Default)]
pub struct BincodeResolver;

impl PersistenceResolver for BincodeResolver {
    fn encode(&self, trades: &[PersistedTrade]) -> Result<Vec<u8>, CodecError> {
        let envelope = EnvelopeRef {
            version: STORE_VERSION,
            trades,
        };
        bincode::serialize(&envelope).map_err(|e| CodecError::SerializationError(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<Vec<PersistedTrade>, CodecError> {
        let envelope: Envelope = bincode::deserialize(bytes)
            .map_err(|e| CodecError::DeserializationError(e.to_string()))?;
        envelope.into_trades()
    }
}
