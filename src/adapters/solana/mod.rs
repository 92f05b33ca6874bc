//! Solana key material
//!
//! Keypair files are JSON byte arrays as written by `solana-keygen`.

pub mod keyring;
pub mod wallet;

pub use keyring::{KeyRing, KeyRingError};
pub use wallet::{WalletError, WalletManager};

use std::fs;
use std::path::Path;

/// Read a keypair file into raw bytes
pub(crate) fn read_keypair_bytes(path: &Path) -> Result<Vec<u8>, String> {
    let contents = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;

    serde_json::from_str(&contents).map_err(|e| format!("Invalid JSON format: {}", e))
}
