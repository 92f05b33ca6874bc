//! Key Ring
//!
//! Node identity. Offers carry the maker's base58 public key; an offer is
//! ours when that key matches the key ring's.

use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signer};
use std::path::Path;
use thiserror::Error;

use crate::domain::offer::Offer;
use crate::ports::identity::IdentityPort;

#[derive(Debug, Error)]
pub enum KeyRingError {
    #[error("Failed to load identity key: {0}")]
    LoadError(String),
    #[error("Invalid identity key bytes: {0}")]
    InvalidKeypair(String),
}

/// Identity key material for this node
#[derive(Debug)]
pub struct KeyRing {
    keypair: Keypair,
}

impl KeyRing {
    /// Load from a keypair file (JSON array format)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, KeyRingError> {
        let bytes = super::read_keypair_bytes(path.as_ref()).map_err(KeyRingError::LoadError)?;
        Self::from_bytes(&bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, KeyRingError> {
        let keypair = Keypair::try_from(bytes)
            .map_err(|e| KeyRingError::InvalidKeypair(e.to_string()))?;
        Ok(Self { keypair })
    }

    /// Fresh identity, for dry runs and tests
    pub fn new_random() -> Self {
        Self {
            keypair: Keypair::new(),
        }
    }

    /// Public key as base58
    pub fn public_key(&self) -> String {
        self.keypair.pubkey().to_string()
    }

    pub fn pubkey(&self) -> Pubkey {
        self.keypair.pubkey()
    }
}

impl IdentityPort for KeyRing {
    fn is_owned_by(&self, offer: &Offer) -> bool {
        offer.owner_pub_key() == self.public_key()
    }
}
