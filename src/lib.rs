pub mod config;
pub mod datasource;
pub mod domain;
pub mod engine;
pub mod error;
pub mod orchestration;
pub mod telemetry;

pub use config::EngineConfig;
pub use datasource::{DataSource, DataSourceError, MockDataSource, RateCache, ShareBalance};
pub use domain::{
    AssetSymbol, CostBasis, Decimal, DepositEvent, Direction, OwnerId, Timestamp, VaultAsset,
    VaultId, VaultPosition, VaultStatus, YieldMode, YieldSnapshot, SECONDS_PER_YEAR,
};
pub use engine::{AccrualTicker, CachedCostBasisResolver, YieldCalculator, YieldRequest};
pub use error::AccrualError;
pub use orchestration::{PositionRefresher, VaultAggregator};
