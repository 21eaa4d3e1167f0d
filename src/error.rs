use crate::datasource::DataSourceError;
use crate::domain::{AssetSymbol, Decimal, VaultId, YieldMode};
use thiserror::Error;

/// Failure taxonomy of the accrual engine.
///
/// None of these reach a display consumer: each is absorbed at the ticker,
/// resolver or aggregator boundary and logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccrualError {
    /// A provider fetch failed or is still pending.
    #[error("Data unavailable: {0}")]
    TransientDataUnavailable(#[from] DataSourceError),
    /// A zero result caused by cost basis not being loaded yet.
    #[error("Spurious zero for {mode} with positive balance {balance}")]
    SpuriousZero { mode: YieldMode, balance: Decimal },
    /// A numeric input was missing or not representable.
    #[error("Invalid calculation input: {0}")]
    CalculationInputInvalid(String),
    /// No USD quote for a non-USD vault asset.
    #[error("Spot price unavailable for {asset} (vault {vault})")]
    PriceUnavailable { asset: AssetSymbol, vault: VaultId },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AccrualError::from(DataSourceError::RateLimited);
        assert_eq!(err.to_string(), "Data unavailable: Rate limited");

        let err = AccrualError::SpuriousZero {
            mode: YieldMode::CurrentPrincipalGrowth,
            balance: Decimal::from(5),
        };
        assert_eq!(
            err.to_string(),
            "Spurious zero for CURRENT_PRINCIPAL_GROWTH with positive balance 5"
        );

        let err = AccrualError::PriceUnavailable {
            asset: AssetSymbol::new("WETH"),
            vault: VaultId::new("0xvault"),
        };
        assert_eq!(
            err.to_string(),
            "Spot price unavailable for WETH (vault 0xvault)"
        );
    }
}
