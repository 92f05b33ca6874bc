use std::fmt;

/// Wallet handle attached to trades at runtime. Opaque to the registry.
pub trait WalletPort: Send + Sync + fmt::Debug {
    /// Receiving address of this wallet
    fn address(&self) -> String;
}
