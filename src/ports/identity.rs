//! Identity Port
//!
//! Answers whether an offer was created by this node's own key.

use crate::domain::offer::Offer;

#[cfg_attr(test, mockall::automock)]
pub trait IdentityPort: Send + Sync {
    /// True if `offer` was created by this identity
    fn is_owned_by(&self, offer: &Offer) -> bool;
}
