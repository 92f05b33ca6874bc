//! Application Layer - The failed trades registry and its repair step

pub mod failed_trades_manager;
pub mod repair;

pub use failed_trades_manager::{
    DuplicatePolicy, FailedTradesError, FailedTradesManager, LockedTrades, FAILED_TRADES_FILE,
};
pub use repair::TransientContext;
