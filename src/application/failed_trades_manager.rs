//! Failed Trades Manager
//!
//! Single in-memory view of the persisted failed trades.
//!
//! Construction wires collaborators only. `hydrate()` loads the collection
//! once and repairs every trade's runtime collaborators; every other call
//! before that fails with `NotHydrated`. `add()` checks membership, inserts
//! and flushes under one write lock.

use parking_lot::RwLock;
use serde::Deserialize;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;

use super::repair::TransientContext;
use crate::domain::offer::Offer;
use crate::domain::trade::Trade;
use crate::ports::identity::IdentityPort;
use crate::ports::price_feed::PriceFeedPort;
use crate::ports::storage::{DurableStore, PersistenceResolver, StorageError, TradableStorage};
use crate::ports::wallet::WalletPort;

/// Logical name of the failed trades collection
pub const FAILED_TRADES_FILE: &str = "FailedTrades";

#[derive(Error, Debug)]
pub enum FailedTradesError {
    #[error("Failed trades not loaded yet - hydrate() must run first")]
    NotHydrated,

    #[error("Failed trades already loaded")]
    AlreadyHydrated,

    /// The trade is in memory but not on disk. A later `flush_pending()` retries.
    #[error("Trade {id} added but not persisted: {source}")]
    Flush {
        id: String,
        #[source]
        source: StorageError,
    },

    #[error("Failed to persist failed trades: {0}")]
    Persist(#[from] StorageError),
}

/// How `add` decides a trade is already present
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum DuplicatePolicy {
    /// Same trade id
    #[default]
    #[serde(rename = "id")]
    ById,
    /// Same instance
    #[serde(rename = "identity")]
    ByIdentity,
}

impl DuplicatePolicy {
    pub fn is_duplicate(&self, existing: &Arc<Trade>, candidate: &Arc<Trade>) -> bool {
        match self {
            DuplicatePolicy::ById => existing.id() == candidate.id(),
            DuplicatePolicy::ByIdentity => Arc::ptr_eq(existing, candidate),
        }
    }
}

#[derive(Debug)]
enum RegistryState {
    Unhydrated,
    Hydrated(Vec<Arc<Trade>>),
}

/// Trades with funds still locked, filtered lazily on each iteration
#[derive(Debug, Clone)]
pub struct LockedTrades {
    trades: Vec<Arc<Trade>>,
}

fn funds_locked(trade: &Arc<Trade>) -> bool {
    trade.is_funds_locked_in()
}

impl LockedTrades {
    /// Iterate the trades whose funds are locked right now. Restartable.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Trade>> + '_ {
        self.trades.iter().filter(|t| t.is_funds_locked_in())
    }
}

impl IntoIterator for LockedTrades {
    type Item = Arc<Trade>;
    type IntoIter = std::iter::Filter<std::vec::IntoIter<Arc<Trade>>, fn(&Arc<Trade>) -> bool>;

    fn into_iter(self) -> Self::IntoIter {
        self.trades
            .into_iter()
            .filter(funds_locked as fn(&Arc<Trade>) -> bool)
    }
}

pub struct FailedTradesManager {
    identity: Arc<dyn IdentityPort>,
    price_feed: Arc<dyn PriceFeedPort>,
    wallet: Arc<dyn WalletPort>,
    storage: Arc<TradableStorage>,
    policy: DuplicatePolicy,
    state: RwLock<RegistryState>,
}

impl FailedTradesManager {
    /// Wire the manager. Performs no I/O.
    pub fn new(
        identity: Arc<dyn IdentityPort>,
        price_feed: Arc<dyn PriceFeedPort>,
        wallet: Arc<dyn WalletPort>,
        store: Arc<dyn DurableStore>,
        resolver: Arc<dyn PersistenceResolver>,
    ) -> Self {
        Self {
            identity,
            price_feed,
            wallet,
            storage: Arc::new(TradableStorage::new(store, resolver, FAILED_TRADES_FILE)),
            policy: DuplicatePolicy::default(),
            state: RwLock::new(RegistryState::Unhydrated),
        }
    }

    /// Set the duplicate check used by `add`
    pub fn with_policy(mut self, policy: DuplicatePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> DuplicatePolicy {
        self.policy
    }

    pub fn is_hydrated(&self) -> bool {
        matches!(*self.state.read(), RegistryState::Hydrated(_))
    }

    fn transient_context(&self) -> TransientContext {
        TransientContext::new(
            self.price_feed.clone(),
            self.wallet.clone(),
            self.storage.clone(),
        )
    }

    /// Load the persisted collection and repair every trade
    ///
    /// A store that cannot be read or decoded is moved aside and the registry
    /// starts empty; that is logged, not returned. Records that fail
    /// validation are skipped after a backup of the stored file is taken.
    /// Returns the number of trades loaded.
    pub fn hydrate(&self) -> Result<usize, FailedTradesError> {
        let mut state = self.state.write();
        if matches!(*state, RegistryState::Hydrated(_)) {
            return Err(FailedTradesError::AlreadyHydrated);
        }

        let context = self.transient_context();
        let trades: Vec<Arc<Trade>> = match self.storage.load() {
            Ok(records) => {
                let stored = records.len();
                let trades: Vec<Arc<Trade>> = records
                    .into_iter()
                    .filter_map(|record| {
                        let id = record.id.clone();
                        match Trade::from_record(record) {
                            Ok(trade) => Some(Arc::new(context.repair(trade))),
                            Err(e) => {
                                tracing::warn!("Skipping unreadable failed trade {}: {}", id, e);
                                None
                            }
                        }
                    })
                    .collect();

                // The next write drops skipped records; keep the file they came from
                if trades.len() < stored {
                    if let Err(e) = self.storage.backup() {
                        tracing::warn!("Could not back up {}: {}", self.storage.file_name(), e);
                    }
                }
                trades
            }
            Err(e) => {
                tracing::warn!(
                    "Could not load {}, starting with no failed trades: {}",
                    self.storage.file_name(),
                    e
                );
                if let Err(e) = self.storage.quarantine() {
                    tracing::warn!("Could not move {} aside: {}", self.storage.file_name(), e);
                }
                Vec::new()
            }
        };

        let count = trades.len();
        *state = RegistryState::Hydrated(trades);
        tracing::info!("Loaded {} failed trades", count);
        Ok(count)
    }

    /// Add a trade and persist the collection
    ///
    /// Returns `Ok(false)` without writing if the trade is already present
    /// under the active `DuplicatePolicy`. If the write fails the trade stays
    /// in memory and `FailedTradesError::Flush` is returned.
    pub fn add(&self, trade: Arc<Trade>) -> Result<bool, FailedTradesError> {
        let mut state = self.state.write();
        let trades = match &mut *state {
            RegistryState::Hydrated(trades) => trades,
            RegistryState::Unhydrated => return Err(FailedTradesError::NotHydrated),
        };

        if trades.iter().any(|existing| self.policy.is_duplicate(existing, &trade)) {
            tracing::debug!("Failed trade {} already registered", trade.id());
            return Ok(false);
        }

        self.transient_context().attach_missing(&trade);

        trades.push(trade.clone());
        self.storage
            .persist(trades)
            .map_err(|source| FailedTradesError::Flush {
                id: trade.id().to_string(),
                source,
            })?;

        tracing::info!("Failed trade {} registered ({} total)", trade.id(), trades.len());
        Ok(true)
    }

    /// Persist if any trade changed since the last write
    pub fn flush_pending(&self) -> Result<bool, FailedTradesError> {
        let state = self.state.write();
        let trades = match &*state {
            RegistryState::Hydrated(trades) => trades,
            RegistryState::Unhydrated => return Err(FailedTradesError::NotHydrated),
        };

        if !self.storage.is_dirty() {
            return Ok(false);
        }

        self.storage.persist(trades)?;
        tracing::debug!("Flushed {} failed trades", trades.len());
        Ok(true)
    }

    fn with_trades<R>(&self, f: impl FnOnce(&[Arc<Trade>]) -> R) -> Result<R, FailedTradesError> {
        match &*self.state.read() {
            RegistryState::Hydrated(trades) => Ok(f(trades)),
            RegistryState::Unhydrated => Err(FailedTradesError::NotHydrated),
        }
    }

    /// All failed trades in insertion order
    pub fn get_all(&self) -> Result<Vec<Arc<Trade>>, FailedTradesError> {
        self.with_trades(|trades| trades.to_vec())
    }

    /// First trade with the given id
    pub fn get_trade_by_id(&self, id: &str) -> Result<Option<Arc<Trade>>, FailedTradesError> {
        self.with_trades(|trades| trades.iter().find(|t| t.id() == id).cloned())
    }

    /// Trades whose funds are still locked, in insertion order
    pub fn locked_trades(&self) -> Result<LockedTrades, FailedTradesError> {
        self.with_trades(|trades| LockedTrades {
            trades: trades.to_vec(),
        })
    }

    pub fn len(&self) -> Result<usize, FailedTradesError> {
        self.with_trades(|trades| trades.len())
    }

    pub fn is_empty(&self) -> Result<bool, FailedTradesError> {
        self.with_trades(|trades| trades.is_empty())
    }

    /// Whether `offer` was created by this node. Does not need hydration.
    pub fn was_my_offer(&self, offer: &Offer) -> bool {
        offer.is_my_offer(self.identity.as_ref())
    }
}

impl fmt::Debug for FailedTradesManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FailedTradesManager")
            .field("storage", &self.storage.file_name())
            .field("policy", &self.policy)
            .field("hydrated", &self.is_hydrated())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::market_data::PriceFeedService;
    use crate::adapters::solana::WalletManager;
    use crate::adapters::storage::JsonResolver;
    use crate::domain::offer::{Direction, OfferPayload};
    use crate::domain::trade::{DisputeState, PersistedTrade, TradeState};
    use crate::ports::identity::MockIdentityPort;
    use crate::ports::mocks::MemoryStore;
    use approx::assert_relative_eq;

    const OWNER: &str = "11111111111111111111111111111111";

    fn create_test_trade(id: &str, state: TradeState) -> Arc<Trade> {
        let offer = Offer::new(OfferPayload {
            id: format!("offer-{}", id),
            owner_pub_key: OWNER.to_string(),
            direction: Direction::Buy,
            currency_code: "USD".to_string(),
            fixed_price: None,
            market_price_margin: 0.02,
        })
        .unwrap();
        Arc::new(Trade::new(id, offer, 10_000, 42_000.0, state))
    }

    fn manager_with(store: Arc<MemoryStore>) -> FailedTradesManager {
        let mut identity = MockIdentityPort::new();
        identity.expect_is_owned_by().returning(|_| false);
        FailedTradesManager::new(
            Arc::new(identity),
            Arc::new(PriceFeedService::new().with_price("USD", 40_000.0)),
            Arc::new(WalletManager::new_random()),
            store,
            Arc::new(JsonResolver::new()),
        )
    }

    /// Store preloaded with A(t1, locked) and B(t2, not locked)
    fn seeded_store() -> Arc<MemoryStore> {
        let records: Vec<PersistedTrade> = vec![
            create_test_trade("t1", TradeState::DepositConfirmed).to_record(),
            create_test_trade("t2", TradeState::PayoutPublished).to_record(),
        ];
        let bytes = JsonResolver::new().encode(&records).unwrap();
        Arc::new(MemoryStore::new().with_file(FAILED_TRADES_FILE, bytes))
    }

    fn ids(trades: impl IntoIterator<Item = Arc<Trade>>) -> Vec<String> {
        trades.into_iter().map(|t| t.id().to_string()).collect()
    }

    #[test]
    fn test_construction_does_no_io() {
        let store = Arc::new(MemoryStore::new());
        store.set_fail_reads(true);
        store.set_fail_writes(true);

        let manager = manager_with(store.clone());
        assert!(!manager.is_hydrated());
        assert_eq!(store.persist_count(), 0);
    }

    #[test]
    fn test_operations_require_hydration() {
        let manager = manager_with(Arc::new(MemoryStore::new()));

        assert!(matches!(manager.get_all(), Err(FailedTradesError::NotHydrated)));
        assert!(matches!(manager.get_trade_by_id("t1"), Err(FailedTradesError::NotHydrated)));
        assert!(matches!(manager.locked_trades(), Err(FailedTradesError::NotHydrated)));
        assert!(matches!(manager.len(), Err(FailedTradesError::NotHydrated)));
        assert!(matches!(manager.flush_pending(), Err(FailedTradesError::NotHydrated)));
        assert!(matches!(
            manager.add(create_test_trade("t1", TradeState::DepositPublished)),
            Err(FailedTradesError::NotHydrated)
        ));
    }

    #[test]
    fn test_hydrate_only_once() {
        let manager = manager_with(Arc::new(MemoryStore::new()));
        assert_eq!(manager.hydrate().unwrap(), 0);
        assert!(manager.is_hydrated());
        assert!(matches!(manager.hydrate(), Err(FailedTradesError::AlreadyHydrated)));
    }

    #[test]
    fn test_hydrate_empty_store() {
        let manager = manager_with(Arc::new(MemoryStore::new()));
        manager.hydrate().unwrap();
        assert!(manager.is_empty().unwrap());
        assert!(manager.locked_trades().unwrap().iter().next().is_none());
    }

    #[test]
    fn test_hydrate_unreadable_store_starts_empty() {
        let store = Arc::new(MemoryStore::new());
        store.set_fail_reads(true);

        let manager = manager_with(store);
        assert_eq!(manager.hydrate().unwrap(), 0);
        assert!(manager.get_all().unwrap().is_empty());
    }

    #[test]
    fn test_hydrate_corrupt_store_quarantines() {
        let store = Arc::new(MemoryStore::new().with_file(FAILED_TRADES_FILE, b"{ invalid json }".to_vec()));

        let manager = manager_with(store.clone());
        assert_eq!(manager.hydrate().unwrap(), 0);
        assert_eq!(store.quarantined(), vec![FAILED_TRADES_FILE.to_string()]);
    }

    #[test]
    fn test_hydrate_skips_invalid_record() {
        let mut bad = create_test_trade("bad", TradeState::FiatSent).to_record();
        bad.offer.owner_pub_key = "not a key".to_string();
        let records = vec![
            create_test_trade("t1", TradeState::FiatSent).to_record(),
            bad,
            create_test_trade("t3", TradeState::FiatSent).to_record(),
        ];
        let bytes = JsonResolver::new().encode(&records).unwrap();
        let store = Arc::new(MemoryStore::new().with_file(FAILED_TRADES_FILE, bytes));

        let manager = manager_with(store.clone());
        assert_eq!(manager.hydrate().unwrap(), 2);
        assert_eq!(ids(manager.get_all().unwrap()), vec!["t1", "t3"]);

        // The skipped record survives the next write in the backup
        manager.add(create_test_trade("t4", TradeState::FiatSent)).unwrap();
        let backups = store.backups();
        assert_eq!(backups.len(), 1);
        let kept: Vec<String> = JsonResolver::new()
            .decode(&backups[0].1)
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(kept, vec!["t1", "bad", "t3"]);
    }

    #[test]
    fn test_hydrate_valid_store_takes_no_backup() {
        let store = seeded_store();
        let manager = manager_with(store.clone());
        manager.hydrate().unwrap();
        assert!(store.backups().is_empty());
    }

    #[test]
    fn test_hydrate_repairs_every_trade() {
        let manager = manager_with(seeded_store());
        manager.hydrate().unwrap();

        for trade in manager.get_all().unwrap() {
            assert!(trade.offer().has_price_feed());
            assert!(trade.wallet().is_some());
            assert!(trade.storage().is_some());
        }
        // Market-based buy offer: 40_000 * (1 - 0.02)
        let t1 = manager.get_trade_by_id("t1").unwrap().unwrap();
        assert_relative_eq!(t1.offer().current_price().unwrap(), 39_200.0, epsilon = 1e-6);
    }

    #[test]
    fn test_seeded_scenario() {
        let manager = manager_with(seeded_store());
        manager.hydrate().unwrap();

        assert_eq!(ids(manager.get_all().unwrap()), vec!["t1", "t2"]);
        assert_eq!(ids(manager.locked_trades().unwrap()), vec!["t1"]);
        assert_eq!(manager.get_trade_by_id("t2").unwrap().unwrap().id(), "t2");
        assert!(manager.get_trade_by_id("t3").unwrap().is_none());
    }

    #[test]
    fn test_add_then_lookup() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager_with(store.clone());
        manager.hydrate().unwrap();

        let trade = create_test_trade("t9", TradeState::FiatSent);
        assert!(manager.add(trade.clone()).unwrap());

        let found = manager.get_trade_by_id("t9").unwrap().unwrap();
        assert!(Arc::ptr_eq(&found, &trade));
        assert_eq!(store.persist_count(), 1);
    }

    #[test]
    fn test_add_same_instance_twice_flushes_once() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager_with(store.clone());
        manager.hydrate().unwrap();

        let a = create_test_trade("t1", TradeState::DepositPublished);
        assert!(manager.add(a.clone()).unwrap());
        assert!(!manager.add(a).unwrap());

        assert_eq!(manager.len().unwrap(), 1);
        assert_eq!(store.persist_count(), 1);
    }

    #[test]
    fn test_identity_policy_keeps_distinct_instances() {
        let manager = manager_with(seeded_store()).with_policy(DuplicatePolicy::ByIdentity);
        manager.hydrate().unwrap();

        let c = create_test_trade("t1", TradeState::FiatSent);
        assert!(manager.add(c.clone()).unwrap());

        let all = manager.get_all().unwrap();
        assert_eq!(ids(all.clone()), vec!["t1", "t2", "t1"]);
        // Lookup returns the first match in insertion order
        let first = manager.get_trade_by_id("t1").unwrap().unwrap();
        assert!(Arc::ptr_eq(&first, &all[0]));
        assert!(!Arc::ptr_eq(&first, &c));
    }

    #[test]
    fn test_id_policy_rejects_same_id() {
        let store = seeded_store();
        let manager = manager_with(store.clone());
        manager.hydrate().unwrap();

        let c = create_test_trade("t1", TradeState::FiatSent);
        assert!(!manager.add(c).unwrap());
        assert_eq!(manager.len().unwrap(), 2);
        assert_eq!(store.persist_count(), 0);
    }

    #[test]
    fn test_no_duplicates_after_repeated_adds() {
        for policy in [DuplicatePolicy::ById, DuplicatePolicy::ByIdentity] {
            let manager = manager_with(Arc::new(MemoryStore::new())).with_policy(policy);
            manager.hydrate().unwrap();

            let trades: Vec<_> = (0..5)
                .map(|i| create_test_trade(&format!("t{}", i), TradeState::FiatSent))
                .collect();
            for _ in 0..3 {
                for trade in &trades {
                    manager.add(trade.clone()).unwrap();
                }
            }

            let all = manager.get_all().unwrap();
            assert_eq!(all.len(), 5);
            for (i, a) in all.iter().enumerate() {
                for b in &all[i + 1..] {
                    assert!(!Arc::ptr_eq(a, b));
                }
            }
        }
    }

    #[test]
    fn test_add_attaches_missing_transients() {
        let manager = manager_with(Arc::new(MemoryStore::new()));
        manager.hydrate().unwrap();

        let trade = create_test_trade("t1", TradeState::FiatSent);
        assert!(!trade.has_transient_fields());
        manager.add(trade.clone()).unwrap();

        assert!(trade.has_transient_fields());
        assert!(trade.offer().has_price_feed());
    }

    #[test]
    fn test_add_keeps_upstream_wiring_and_fills_price_feed() {
        let manager = manager_with(Arc::new(MemoryStore::new()));
        manager.hydrate().unwrap();

        let upstream_wallet = Arc::new(WalletManager::new_random());
        let upstream_storage = Arc::new(TradableStorage::new(
            Arc::new(MemoryStore::new()),
            Arc::new(JsonResolver::new()),
            "Upstream",
        ));
        let trade = create_test_trade("t1", TradeState::FiatSent);
        trade.set_transient_fields(upstream_storage.clone(), upstream_wallet.clone());
        assert!(!trade.offer().has_price_feed());

        manager.add(trade.clone()).unwrap();

        assert!(trade.offer().has_price_feed());
        assert_eq!(trade.wallet().unwrap().address(), upstream_wallet.address());
        assert!(Arc::ptr_eq(&trade.storage().unwrap(), &upstream_storage));
    }

    #[test]
    fn test_flush_failure_is_reported() {
        let store = Arc::new(MemoryStore::new());
        let manager = manager_with(store.clone());
        manager.hydrate().unwrap();

        store.set_fail_writes(true);
        let result = manager.add(create_test_trade("t1", TradeState::FiatSent));
        assert!(matches!(result, Err(FailedTradesError::Flush { ref id, .. }) if id == "t1"));

        // Kept in memory; retried on the next flush
        assert_eq!(manager.len().unwrap(), 1);
        store.set_fail_writes(false);
        assert!(manager.flush_pending().unwrap());
        assert_eq!(store.persist_count(), 1);
    }

    #[test]
    fn test_in_place_change_flushed_on_demand() {
        let store = seeded_store();
        let manager = manager_with(store.clone());
        manager.hydrate().unwrap();
        assert!(!manager.flush_pending().unwrap());

        let t1 = manager.get_trade_by_id("t1").unwrap().unwrap();
        t1.set_dispute_state(DisputeState::DisputeClosed);
        assert!(manager.locked_trades().unwrap().iter().next().is_none());

        assert!(manager.flush_pending().unwrap());
        assert_eq!(store.persist_count(), 1);

        let records = JsonResolver::new()
            .decode(&store.contents(FAILED_TRADES_FILE).unwrap())
            .unwrap();
        assert_eq!(records[0].dispute_state, DisputeState::DisputeClosed);
    }

    #[test]
    fn test_locked_trades_evaluated_lazily() {
        let manager = manager_with(Arc::new(MemoryStore::new()));
        manager.hydrate().unwrap();

        let a = create_test_trade("a", TradeState::TakerFeePublished);
        let b = create_test_trade("b", TradeState::DepositPublished);
        manager.add(a.clone()).unwrap();
        manager.add(b.clone()).unwrap();

        let locked = manager.locked_trades().unwrap();
        assert_eq!(locked.iter().count(), 1);

        a.set_state(TradeState::DepositPublished);
        let order: Vec<&str> = locked.iter().map(|t| t.id()).collect();
        assert_eq!(order, vec!["a", "b"]);
    }

    #[test]
    fn test_locked_subset_matches_filter() {
        let manager = manager_with(Arc::new(MemoryStore::new()));
        manager.hydrate().unwrap();

        let states = [
            TradeState::Preparation,
            TradeState::DepositPublished,
            TradeState::Withdrawn,
            TradeState::FiatReceived,
            TradeState::PayoutPublished,
        ];
        for (i, state) in states.iter().enumerate() {
            manager.add(create_test_trade(&format!("t{}", i), *state)).unwrap();
        }

        let expected: Vec<String> = manager
            .get_all()
            .unwrap()
            .into_iter()
            .filter(|t| t.is_funds_locked_in())
            .map(|t| t.id().to_string())
            .collect();
        assert_eq!(ids(manager.locked_trades().unwrap()), expected);
        assert_eq!(expected, vec!["t1", "t3"]);
    }

    #[test]
    fn test_was_my_offer_delegates_to_identity() {
        let mut identity = MockIdentityPort::new();
        identity
            .expect_is_owned_by()
            .withf(|offer: &Offer| offer.id() == "offer-mine")
            .times(1)
            .returning(|_| true);

        let store = Arc::new(MemoryStore::new());
        let manager = FailedTradesManager::new(
            Arc::new(identity),
            Arc::new(PriceFeedService::new()),
            Arc::new(WalletManager::new_random()),
            store.clone(),
            Arc::new(JsonResolver::new()),
        );

        let trade = create_test_trade("mine", TradeState::FiatSent);
        // Allowed before hydration, no storage access
        assert!(manager.was_my_offer(trade.offer()));
        assert_eq!(store.persist_count(), 0);
        assert!(!manager.is_hydrated());
    }
}
