//! Transient repair
//!
//! A decoded trade has no price feed, wallet or storage handle. `repair`
//! attaches the live collaborators and hands back a usable trade. It touches
//! nothing but the trade it is given.

use std::sync::Arc;

use crate::domain::trade::Trade;
use crate::ports::price_feed::PriceFeedPort;
use crate::ports::storage::TradableStorage;
use crate::ports::wallet::WalletPort;

/// Live collaborators to attach to loaded trades
#[derive(Debug, Clone)]
pub struct TransientContext {
    pub price_feed: Arc<dyn PriceFeedPort>,
    pub wallet: Arc<dyn WalletPort>,
    pub storage: Arc<TradableStorage>,
}

impl TransientContext {
    pub fn new(
        price_feed: Arc<dyn PriceFeedPort>,
        wallet: Arc<dyn WalletPort>,
        storage: Arc<TradableStorage>,
    ) -> Self {
        Self {
            price_feed,
            wallet,
            storage,
        }
    }

    /// Attach every transient collaborator to `trade`, replacing any present
    pub fn attach(&self, trade: &Trade) {
        trade.offer().set_price_feed(self.price_feed.clone());
        trade.set_transient_fields(self.storage.clone(), self.wallet.clone());
    }

    /// Attach only the collaborators `trade` is missing; upstream wiring stays
    pub fn attach_missing(&self, trade: &Trade) {
        if !trade.offer().has_price_feed() {
            trade.offer().set_price_feed(self.price_feed.clone());
        }
        if !trade.has_transient_fields() {
            trade.set_transient_fields(self.storage.clone(), self.wallet.clone());
        }
    }

    /// Consume a freshly decoded trade and return it fully wired
    pub fn repair(&self, trade: Trade) -> Trade {
        self.attach(&trade);
        trade
    }
}
