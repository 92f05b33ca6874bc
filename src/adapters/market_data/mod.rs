//! Market Data Adapters
//!
//! - `PriceFeedService`: last-price cache attached to offers at runtime

mod price_feed;

pub use price_feed::{PriceFeedService, PricePoint};
