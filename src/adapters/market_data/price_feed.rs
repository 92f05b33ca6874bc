use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::HashMap;

use crate::ports::price_feed::PriceFeedPort;

/// A quoted price and when it was received
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub price: f64,
    pub updated_at: DateTime<Utc>,
}

/// Thread-safe cache of the latest market price per currency
///
/// Whatever polls the market pushes quotes in with `update_price`; offers
/// read them through `PriceFeedPort`.
#[derive(Debug, Default)]
pub struct PriceFeedService {
    prices: RwLock<HashMap<String, PricePoint>>,
}

impl PriceFeedService {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to seed a price
    pub fn with_price(self, currency_code: &str, price: f64) -> Self {
        self.update_price(currency_code, price);
        self
    }

    /// Record a new quote. Non-finite or non-positive prices are ignored.
    pub fn update_price(&self, currency_code: &str, price: f64) {
        if !price.is_finite() || price <= 0.0 {
            tracing::warn!("Ignoring invalid price {} for {}", price, currency_code);
            return;
        }
        self.prices.write().insert(
            currency_code.to_uppercase(),
            PricePoint {
                price,
                updated_at: Utc::now(),
            },
        );
    }

    /// Full quote including its timestamp
    pub fn price_point(&self, currency_code: &str) -> Option<PricePoint> {
        self.prices.read().get(&currency_code.to_uppercase()).copied()
    }
}

impl PriceFeedPort for PriceFeedService {
    fn market_price(&self, currency_code: &str) -> Option<f64> {
        self.price_point(currency_code).map(|p| p.price)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_currency() {
        let feed = PriceFeedService::new();
        assert_eq!(feed.market_price("USD"), None);
    }

    #[test]
    fn test_update_overwrites() {
        let feed = PriceFeedService::new().with_price("usd", 100.0);
        assert_eq!(feed.market_price("USD"), Some(100.0));

        feed.update_price("USD", 101.5);
        assert_eq!(feed.market_price("usd"), Some(101.5));
        assert!(feed.price_point("USD").is_some());
    }

    #[test]
    fn test_rejects_invalid_price() {
        let feed = PriceFeedService::new().with_price("EUR", 90.0);
        feed.update_price("EUR", f64::NAN);
        feed.update_price("EUR", -1.0);
        assert_eq!(feed.market_price("EUR"), Some(90.0));
    }
}
