//! Offer
//!
//! The offer a trade was taken from. Carries the maker's identity and a
//! runtime-only price feed slot that has to be re-attached after every load.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use crate::ports::identity::IdentityPort;
use crate::ports::price_feed::PriceFeedPort;

/// Length of a decoded ed25519 public key
const PUB_KEY_LEN: usize = 32;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum OfferError {
    #[error("Offer id cannot be empty")]
    EmptyId,

    #[error("Invalid owner public key: {0}")]
    InvalidOwnerKey(String),

    #[error("Currency code cannot be empty")]
    EmptyCurrency,

    #[error("Invalid fixed price: {0}")]
    InvalidPrice(f64),

    #[error("Market price margin must be within -1.0..1.0, got {0}")]
    InvalidMargin(f64),
}

/// Side of the offer from the maker's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    Buy,
    Sell,
}

/// Persisted part of an offer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OfferPayload {
    /// Offer id
    pub id: String,
    /// Maker public key (base58)
    pub owner_pub_key: String,
    /// Buy or sell
    pub direction: Direction,
    /// Counter currency (e.g. "USD")
    pub currency_code: String,
    /// Fixed price, if the offer is not market based
    #[serde(default)]
    pub fixed_price: Option<f64>,
    /// Distance from market price (0.01 = 1%)
    #[serde(default)]
    pub market_price_margin: f64,
}

/// Offer with its runtime price feed
#[derive(Debug)]
pub struct Offer {
    payload: OfferPayload,
    price_feed: RwLock<Option<Arc<dyn PriceFeedPort>>>,
}

impl Offer {
    /// Create an offer from its payload, validating it
    pub fn new(payload: OfferPayload) -> Result<Self, OfferError> {
        if payload.id.trim().is_empty() {
            return Err(OfferError::EmptyId);
        }

        let key = bs58::decode(&payload.owner_pub_key)
            .into_vec()
            .map_err(|e| OfferError::InvalidOwnerKey(e.to_string()))?;
        if key.len() != PUB_KEY_LEN {
            return Err(OfferError::InvalidOwnerKey(format!(
                "expected {} bytes, got {}",
                PUB_KEY_LEN,
                key.len()
            )));
        }

        if payload.currency_code.trim().is_empty() {
            return Err(OfferError::EmptyCurrency);
        }

        if let Some(price) = payload.fixed_price {
            if !price.is_finite() || price <= 0.0 {
                return Err(OfferError::InvalidPrice(price));
            }
        }

        if !(-1.0..1.0).contains(&payload.market_price_margin) {
            return Err(OfferError::InvalidMargin(payload.market_price_margin));
        }

        Ok(Self {
            payload,
            price_feed: RwLock::new(None),
        })
    }

    pub fn id(&self) -> &str {
        &self.payload.id
    }

    pub fn owner_pub_key(&self) -> &str {
        &self.payload.owner_pub_key
    }

    pub fn direction(&self) -> Direction {
        self.payload.direction
    }

    pub fn currency_code(&self) -> &str {
        &self.payload.currency_code
    }

    /// Persisted form of this offer
    pub fn payload(&self) -> &OfferPayload {
        &self.payload
    }

    /// Attach the price feed. Not persisted.
    pub fn set_price_feed(&self, price_feed: Arc<dyn PriceFeedPort>) {
        *self.price_feed.write() = Some(price_feed);
    }

    pub fn has_price_feed(&self) -> bool {
        self.price_feed.read().is_some()
    }

    /// Current offer price
    ///
    /// Fixed-price offers return their price. Market-based offers apply the
    /// margin to the feed's quote; sellers ask above market, buyers bid below.
    /// Returns `None` when no feed is attached or the feed has no quote.
    pub fn current_price(&self) -> Option<f64> {
        if let Some(price) = self.payload.fixed_price {
            return Some(price);
        }

        let feed = self.price_feed.read().clone()?;
        let market = feed.market_price(&self.payload.currency_code)?;
        let factor = match self.payload.direction {
            Direction::Sell => 1.0 + self.payload.market_price_margin,
            Direction::Buy => 1.0 - self.payload.market_price_margin,
        };
        Some(market * factor)
    }

    /// Whether this offer was created by the given identity
    pub fn is_my_offer(&self, identity: &dyn IdentityPort) -> bool {
        identity.is_owned_by(self)
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Buy => write!(f, "BUY"),
            Direction::Sell => write!(f, "SELL"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::market_data::PriceFeedService;
    use approx::assert_relative_eq;

    // 32 zero bytes in base58
    const OWNER: &str = "11111111111111111111111111111111";

    fn payload(fixed_price: Option<f64>, direction: Direction, margin: f64) -> OfferPayload {
        OfferPayload {
            id: "offer-1".to_string(),
            owner_pub_key: OWNER.to_string(),
            direction,
            currency_code: "USD".to_string(),
            fixed_price,
            market_price_margin: margin,
        }
    }

    #[test]
    fn test_valid_offer() {
        let offer = Offer::new(payload(Some(100.0), Direction::Buy, 0.0)).unwrap();
        assert_eq!(offer.id(), "offer-1");
        assert_eq!(offer.owner_pub_key(), OWNER);
        assert!(!offer.has_price_feed());
    }

    #[test]
    fn test_rejects_bad_owner_key() {
        let mut p = payload(None, Direction::Buy, 0.0);
        p.owner_pub_key = "not-base58-0OIl".to_string();
        assert!(matches!(Offer::new(p), Err(OfferError::InvalidOwnerKey(_))));

        let mut p = payload(None, Direction::Buy, 0.0);
        p.owner_pub_key = "1111".to_string();
        assert!(matches!(Offer::new(p), Err(OfferError::InvalidOwnerKey(_))));
    }

    #[test]
    fn test_rejects_empty_fields() {
        let mut p = payload(None, Direction::Buy, 0.0);
        p.id = " ".to_string();
        assert_eq!(Offer::new(p).unwrap_err(), OfferError::EmptyId);

        let mut p = payload(None, Direction::Buy, 0.0);
        p.currency_code = String::new();
        assert_eq!(Offer::new(p).unwrap_err(), OfferError::EmptyCurrency);
    }

    #[test]
    fn test_rejects_bad_price_and_margin() {
        assert!(matches!(
            Offer::new(payload(Some(0.0), Direction::Sell, 0.0)),
            Err(OfferError::InvalidPrice(_))
        ));
        assert!(matches!(
            Offer::new(payload(None, Direction::Sell, 1.5)),
            Err(OfferError::InvalidMargin(_))
        ));
    }

    #[test]
    fn test_fixed_price_ignores_feed() {
        let offer = Offer::new(payload(Some(250.0), Direction::Sell, 0.0)).unwrap();
        assert_eq!(offer.current_price(), Some(250.0));
    }

    #[test]
    fn test_market_price_needs_feed() {
        let offer = Offer::new(payload(None, Direction::Sell, 0.02)).unwrap();
        assert_eq!(offer.current_price(), None);

        let feed = Arc::new(PriceFeedService::new());
        offer.set_price_feed(feed.clone());
        assert!(offer.has_price_feed());
        // Feed attached but no quote yet
        assert_eq!(offer.current_price(), None);

        feed.update_price("USD", 100.0);
        assert_relative_eq!(offer.current_price().unwrap(), 102.0, epsilon = 1e-9);
    }

    #[test]
    fn test_buy_side_margin() {
        let offer = Offer::new(payload(None, Direction::Buy, 0.05)).unwrap();
        offer.set_price_feed(Arc::new(PriceFeedService::new().with_price("USD", 200.0)));
        assert_relative_eq!(offer.current_price().unwrap(), 190.0, epsilon = 1e-9);
    }
}
