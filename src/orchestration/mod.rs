//! Multi-vault orchestration: provider refresh and aggregation.

pub mod aggregator;
pub mod refresh;

pub use aggregator::{AggregateTotal, VaultAggregator, VaultContribution};
pub use refresh::PositionRefresher;
