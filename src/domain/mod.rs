//! Domain types for the yield accrual engine.
//!
//! This module provides:
//! - Lossless numeric handling via Decimal wrapper
//! - Domain primitives: Timestamp, OwnerId, VaultId, AssetSymbol, Direction
//! - Vault positions, deposit events, cost basis and yield snapshots

pub mod decimal;
pub mod deposit;
pub mod primitives;
pub mod snapshot;
pub mod vault;

pub use decimal::Decimal;
pub use deposit::{history_fingerprint, DepositEvent};
pub use primitives::{
    AssetSymbol, Direction, OwnerId, Timestamp, VaultId, SECONDS_PER_DAY, SECONDS_PER_YEAR,
};
pub use snapshot::{CostBasis, YieldMode, YieldSnapshot};
pub use vault::{VaultAsset, VaultPosition, VaultStatus};
