use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use super::offer::{Offer, OfferError, OfferPayload};
use crate::ports::storage::TradableStorage;
use crate::ports::wallet::WalletPort;

/// Protocol phase of a trade, in the order they are reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum TradeState {
    Preparation,
    TakerFeePublished,
    DepositPublished,
    DepositConfirmed,
    FiatSent,
    FiatReceived,
    PayoutPublished,
    Withdrawn,
}

/// Arbitration status of a trade
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DisputeState {
    #[default]
    NoDispute,
    DisputeRequested,
    DisputeStartedByPeer,
    DisputeClosed,
}

/// Persisted form of a trade
///
/// Only this is written to the durable store. Wallet, storage handle and the
/// offer's price feed are runtime-only and never appear here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersistedTrade {
    pub id: String,
    pub offer: OfferPayload,
    /// Trade amount in base units
    pub amount: u64,
    pub trade_price: f64,
    pub date: DateTime<Utc>,
    pub state: TradeState,
    #[serde(default)]
    pub dispute_state: DisputeState,
    #[serde(default)]
    pub error_message: Option<String>,
}

/// Runtime collaborators re-attached after every load
#[derive(Debug, Clone)]
pub struct TransientFields {
    pub storage: Arc<TradableStorage>,
    pub wallet: Arc<dyn WalletPort>,
}

/// Mutable part of a trade, driven by the settlement subsystem
#[derive(Debug, Clone)]
struct Progress {
    state: TradeState,
    dispute_state: DisputeState,
    error_message: Option<String>,
}

/// A trade as held in memory
#[derive(Debug)]
pub struct Trade {
    id: String,
    offer: Offer,
    amount: u64,
    trade_price: f64,
    date: DateTime<Utc>,
    progress: RwLock<Progress>,
    transient: RwLock<Option<TransientFields>>,
}

impl Trade {
    /// Creates a new trade in the given state, dated now
    pub fn new(id: impl Into<String>, offer: Offer, amount: u64, trade_price: f64, state: TradeState) -> Self {
        Self {
            id: id.into(),
            offer,
            amount,
            trade_price,
            date: Utc::now(),
            progress: RwLock::new(Progress {
                state,
                dispute_state: DisputeState::NoDispute,
                error_message: None,
            }),
            transient: RwLock::new(None),
        }
    }

    /// Rebuild a trade from its persisted form. Transient fields are left empty.
    pub fn from_record(record: PersistedTrade) -> Result<Self, OfferError> {
        let offer = Offer::new(record.offer)?;
        Ok(Self {
            id: record.id,
            offer,
            amount: record.amount,
            trade_price: record.trade_price,
            date: record.date,
            progress: RwLock::new(Progress {
                state: record.state,
                dispute_state: record.dispute_state,
                error_message: record.error_message,
            }),
            transient: RwLock::new(None),
        })
    }

    /// Snapshot of the persisted form
    pub fn to_record(&self) -> PersistedTrade {
        let progress = self.progress.read().clone();
        PersistedTrade {
            id: self.id.clone(),
            offer: self.offer.payload().clone(),
            amount: self.amount,
            trade_price: self.trade_price,
            date: self.date,
            state: progress.state,
            dispute_state: progress.dispute_state,
            error_message: progress.error_message,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn offer(&self) -> &Offer {
        &self.offer
    }

    pub fn amount(&self) -> u64 {
        self.amount
    }

    pub fn trade_price(&self) -> f64 {
        self.trade_price
    }

    pub fn date(&self) -> DateTime<Utc> {
        self.date
    }

    pub fn state(&self) -> TradeState {
        self.progress.read().state
    }

    pub fn dispute_state(&self) -> DisputeState {
        self.progress.read().dispute_state
    }

    pub fn error_message(&self) -> Option<String> {
        self.progress.read().error_message.clone()
    }

    pub fn set_state(&self, state: TradeState) {
        self.progress.write().state = state;
        self.request_persistence();
    }

    pub fn set_dispute_state(&self, dispute_state: DisputeState) {
        self.progress.write().dispute_state = dispute_state;
        self.request_persistence();
    }

    pub fn set_error_message(&self, message: impl Into<String>) {
        self.progress.write().error_message = Some(message.into());
        self.request_persistence();
    }

    pub fn is_deposit_published(&self) -> bool {
        self.state() >= TradeState::DepositPublished
    }

    pub fn is_payout_published(&self) -> bool {
        self.state() >= TradeState::PayoutPublished
    }

    /// Whether the trade still has funds in the deposit
    ///
    /// Funds are locked once the deposit is published and stay locked until
    /// either the payout is published or arbitration closes the dispute.
    pub fn is_funds_locked_in(&self) -> bool {
        let progress = self.progress.read();
        if progress.state < TradeState::DepositPublished {
            return false;
        }
        if progress.state >= TradeState::PayoutPublished {
            return false;
        }
        progress.dispute_state != DisputeState::DisputeClosed
    }

    /// Attach storage handle and wallet. Not persisted.
    pub fn set_transient_fields(&self, storage: Arc<TradableStorage>, wallet: Arc<dyn WalletPort>) {
        *self.transient.write() = Some(TransientFields { storage, wallet });
    }

    pub fn has_transient_fields(&self) -> bool {
        self.transient.read().is_some()
    }

    pub fn wallet(&self) -> Option<Arc<dyn WalletPort>> {
        self.transient.read().as_ref().map(|t| t.wallet.clone())
    }

    pub fn storage(&self) -> Option<Arc<TradableStorage>> {
        self.transient.read().as_ref().map(|t| t.storage.clone())
    }

    fn request_persistence(&self) {
        if let Some(storage) = self.storage() {
            storage.queue_up_for_save();
        }
    }
}

impl fmt::Display for TradeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

impl fmt::Display for Trade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} @ {} {} [{}]",
            self.id,
            self.offer.direction(),
            self.amount,
            self.trade_price,
            self.offer.currency_code(),
            self.state()
        )
    }
}
