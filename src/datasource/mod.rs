//! Data source abstraction for balances, rates, APY, history and spot prices.

use crate::domain::{AssetSymbol, Decimal, DepositEvent, OwnerId, VaultId};
use async_trait::async_trait;
use std::fmt;

pub mod cache;
pub mod mock;

pub use cache::RateCache;
pub use mock::MockDataSource;

/// Raw share balance as read from the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShareBalance {
    pub raw: i128,
    pub decimals: u32,
}

impl ShareBalance {
    pub fn units(&self) -> Decimal {
        Decimal::from_raw_units(self.raw, self.decimals).unwrap_or_default()
    }
}

/// Read-only providers consumed by the engine.
///
/// Implementations own transport, pagination and rate limiting. Every method
/// may be slow; none is called from the per-second tick path.
#[async_trait]
pub trait DataSource: Send + Sync + fmt::Debug {
    /// Current share balance of `owner` in `vault`.
    async fn fetch_share_balance(
        &self,
        owner: &OwnerId,
        vault: &VaultId,
    ) -> Result<ShareBalance, DataSourceError>;

    /// Shares → underlying conversion factor for `vault`.
    async fn fetch_exchange_rate(&self, vault: &VaultId) -> Result<Decimal, DataSourceError>;

    /// Trailing-window APY for `vault`, in percent.
    async fn fetch_apy(&self, vault: &VaultId) -> Result<Decimal, DataSourceError>;

    /// Deposit/withdraw events for `owner` in `vault`.
    ///
    /// # Returns
    /// Events ordered by timestamp. The resolver re-sorts, so ordering is not
    /// relied on.
    async fn fetch_history(
        &self,
        owner: &OwnerId,
        vault: &VaultId,
    ) -> Result<Vec<DepositEvent>, DataSourceError>;

    /// USD price of one unit of `asset`, or None if the feed has no quote.
    async fn fetch_spot_price(
        &self,
        asset: &AssetSymbol,
    ) -> Result<Option<Decimal>, DataSourceError>;
}

/// Error type for data source operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataSourceError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// Upstream answered with an error status.
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed response)
    ParseError(String),
    /// Rate limit exceeded (caller should implement backoff)
    RateLimited,
    /// Data not indexed yet.
    Pending,
    /// Other error
    Other(String),
}

impl DataSourceError {
    /// Whether retrying the same request can succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            DataSourceError::NetworkError(_)
            | DataSourceError::RateLimited
            | DataSourceError::Pending => true,
            DataSourceError::HttpError { status, .. } => *status >= 500,
            DataSourceError::ParseError(_) | DataSourceError::Other(_) => false,
        }
    }
}

impl fmt::Display for DataSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataSourceError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            DataSourceError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            DataSourceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            DataSourceError::RateLimited => write!(f, "Rate limited"),
            DataSourceError::Pending => write!(f, "Data pending"),
            DataSourceError::Other(msg) => write!(f, "Error: {}", msg),
        }
    }
}

impl std::error::Error for DataSourceError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_datasource_error_display() {
        let err = DataSourceError::NetworkError("connection timeout".to_string());
        assert_eq!(err.to_string(), "Network error: connection timeout");

        let err = DataSourceError::HttpError {
            status: 429,
            message: "Too many requests".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 429: Too many requests");

        assert_eq!(DataSourceError::RateLimited.to_string(), "Rate limited");
        assert_eq!(DataSourceError::Pending.to_string(), "Data pending");
    }

    #[test]
    fn test_transient_classification() {
        assert!(DataSourceError::RateLimited.is_transient());
        assert!(DataSourceError::Pending.is_transient());
        assert!(DataSourceError::HttpError {
            status: 503,
            message: String::new()
        }
        .is_transient());
        assert!(!DataSourceError::HttpError {
            status: 404,
            message: String::new()
        }
        .is_transient());
        assert!(!DataSourceError::ParseError("bad".to_string()).is_transient());
    }

    #[test]
    fn test_share_balance_units() {
        let balance = ShareBalance {
            raw: 250_000_000,
            decimals: 8,
        };
        assert_eq!(balance.units().to_canonical_string(), "2.5");
    }
}
