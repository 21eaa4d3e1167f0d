//! Vault position snapshot as delivered by the provider layer.

use crate::domain::{AssetSymbol, Decimal, Timestamp, VaultId};
use serde::{Deserialize, Serialize};

/// Whether a vault is accepting deposits yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VaultStatus {
    #[default]
    Active,
    /// Listed but not live; never contributes to totals.
    ComingSoon,
}

/// Underlying asset of a vault.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VaultAsset {
    pub symbol: AssetSymbol,
    /// True when one unit of the asset is worth one USD.
    pub usd_denominated: bool,
}

impl VaultAsset {
    pub fn usd(symbol: impl Into<String>) -> Self {
        Self {
            symbol: AssetSymbol::new(symbol),
            usd_denominated: true,
        }
    }

    pub fn priced(symbol: impl Into<String>) -> Self {
        Self {
            symbol: AssetSymbol::new(symbol),
            usd_denominated: false,
        }
    }
}

/// Read-only snapshot of an owner's position in one vault.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VaultPosition {
    pub vault_id: VaultId,
    pub chain_id: u64,
    pub asset: VaultAsset,
    pub status: VaultStatus,
    pub asset_decimals: u32,
    /// Share balance in raw integer units.
    pub share_balance: i128,
    /// Shares → underlying conversion factor.
    pub exchange_rate: Option<Decimal>,
    pub apy_percent: Option<Decimal>,
    pub last_activity_timestamp: Option<Timestamp>,
}

impl VaultPosition {
    /// Share balance scaled by `asset_decimals`.
    ///
    /// Balances that cannot be represented are treated as zero.
    pub fn share_balance_units(&self) -> Decimal {
        Decimal::from_raw_units(self.share_balance, self.asset_decimals).unwrap_or_default()
    }

    pub fn has_positive_balance(&self) -> bool {
        self.share_balance_units().is_positive()
    }

    pub fn is_active(&self) -> bool {
        self.status == VaultStatus::Active
    }
}
