//! Derived values: cost basis and yield snapshots.

use crate::domain::{Decimal, Timestamp};
use serde::{Deserialize, Serialize};

/// Which figure the calculator produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum YieldMode {
    /// Whole position value including interest since last activity.
    TotalUsd,
    /// Interest earned on the owner's own tracked principal.
    CurrentPrincipalGrowth,
}

impl std::fmt::Display for YieldMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            YieldMode::TotalUsd => write!(f, "TOTAL_USD"),
            YieldMode::CurrentPrincipalGrowth => write!(f, "CURRENT_PRINCIPAL_GROWTH"),
        }
    }
}

/// Principal still attributable to tracked deposits, and when it went in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostBasis {
    pub original_principal: Decimal,
    pub first_deposit_timestamp: Timestamp,
}

/// A computed yield figure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct YieldSnapshot {
    pub value: Decimal,
    pub computed_at: Timestamp,
    pub mode: YieldMode,
}
