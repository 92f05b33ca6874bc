//! Domain Layer - Trades and offers held by the registry
//!
//! Records are created by the settlement subsystem and mutated in place by it.
//! Each record has a persisted part and runtime-only collaborators that the
//! registry re-attaches after loading.

pub mod offer;
pub mod trade;

pub use offer::{Direction, Offer, OfferError, OfferPayload};
pub use trade::{DisputeState, PersistedTrade, Trade, TradeState, TransientFields};
