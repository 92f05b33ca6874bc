use std::fmt;

/// Source of market prices, attached to offers at runtime
pub trait PriceFeedPort: Send + Sync + fmt::Debug {
    /// Last known market price for a currency code, if any
    fn market_price(&self, currency_code: &str) -> Option<f64>;
}
