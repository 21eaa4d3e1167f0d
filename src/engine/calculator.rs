//! Yield figures: the closed-form total and principal growth.

use super::cost_basis::CachedCostBasisResolver;
use crate::domain::{
    CostBasis, Decimal, DepositEvent, OwnerId, Timestamp, VaultId, YieldMode, SECONDS_PER_YEAR,
};
use std::sync::Arc;
use tracing::debug;

/// Interest earned by `principal` at `apy_percent` over `elapsed_secs`.
///
/// Negative durations earn nothing. Results that would overflow collapse to
/// zero.
pub fn interest(principal: Decimal, apy_percent: Decimal, elapsed_secs: i64) -> Decimal {
    if elapsed_secs <= 0 || !principal.is_positive() {
        return Decimal::zero();
    }
    let numerator = principal
        .inner()
        .checked_mul(apy_percent.inner())
        .and_then(|v| v.checked_mul(elapsed_secs.into()));
    let denominator = rust_decimal::Decimal::ONE_HUNDRED * rust_decimal::Decimal::from(SECONDS_PER_YEAR);
    numerator
        .and_then(|n| n.checked_div(denominator))
        .map(Decimal::new)
        .unwrap_or_default()
}

/// `balance * exchange_rate` plus interest from `from_ts` to `to_ts`.
///
/// All growth since `from_ts` counts as interest, regardless of when the
/// owner's deposits happened.
pub fn total_usd(
    balance: Option<Decimal>,
    exchange_rate: Option<Decimal>,
    apy_percent: Option<Decimal>,
    from_ts: Option<Timestamp>,
    to_ts: Option<Timestamp>,
) -> Decimal {
    let balance = balance.unwrap_or_default();
    if !balance.is_positive() {
        return Decimal::zero();
    }
    let principal_value = principal_value(balance, exchange_rate.unwrap_or_default());
    let elapsed = to_ts
        .unwrap_or_default()
        .seconds_since(from_ts.unwrap_or_default());
    principal_value
        .checked_add(interest(principal_value, apy_percent.unwrap_or_default(), elapsed))
        .unwrap_or_default()
        .non_negative()
}

/// Interest accrued on the tracked principal since its first deposit.
pub fn principal_growth(basis: &CostBasis, apy_percent: Decimal, to_ts: Timestamp) -> Decimal {
    interest(
        basis.original_principal,
        apy_percent,
        to_ts.seconds_since(basis.first_deposit_timestamp),
    )
}

fn principal_value(balance: Decimal, exchange_rate: Decimal) -> Decimal {
    balance
        .inner()
        .checked_mul(exchange_rate.inner())
        .map(Decimal::new)
        .unwrap_or_default()
        .non_negative()
}

/// Everything one calculation needs. Missing numeric inputs count as zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct YieldRequest {
    /// Share balance in token units.
    pub balance: Option<Decimal>,
    pub apy_percent: Option<Decimal>,
    /// Start of the window, normally the last activity on the position.
    pub from_ts: Option<Timestamp>,
    pub to_ts: Option<Timestamp>,
    pub mode: YieldMode,
    /// Use this history instead of fetching one.
    pub deposit_history: Option<Vec<DepositEvent>>,
    pub owner_id: OwnerId,
    pub exchange_rate: Option<Decimal>,
    pub vault_token_id: VaultId,
    pub asset_decimals: u32,
}

/// Result of a calculation together with the principal it accrues on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Evaluation {
    pub value: Decimal,
    /// Amount that keeps earning interest after the calculation time.
    pub principal: Decimal,
}

/// Computes yield figures; the principal-growth mode consults cost basis.
#[derive(Debug, Clone)]
pub struct YieldCalculator {
    resolver: Arc<CachedCostBasisResolver>,
}

impl YieldCalculator {
    pub fn new(resolver: Arc<CachedCostBasisResolver>) -> Self {
        Self { resolver }
    }

    pub fn resolver(&self) -> &Arc<CachedCostBasisResolver> {
        &self.resolver
    }

    /// Compute the yield figure for `request`.
    pub async fn calculate(&self, request: &YieldRequest) -> Decimal {
        self.evaluate(request).await.value
    }

    /// Compute the yield figure and the principal behind it.
    ///
    /// Only the principal-growth mode can suspend, to fetch the history.
    pub async fn evaluate(&self, request: &YieldRequest) -> Evaluation {
        let balance = request.balance.unwrap_or_default();
        if !balance.is_positive() {
            return Evaluation::default();
        }
        let exchange_rate = request.exchange_rate.unwrap_or_default();
        let apy = request.apy_percent.unwrap_or_default();

        match request.mode {
            YieldMode::TotalUsd => Evaluation {
                value: total_usd(
                    request.balance,
                    request.exchange_rate,
                    request.apy_percent,
                    request.from_ts,
                    request.to_ts,
                ),
                principal: principal_value(balance, exchange_rate),
            },
            YieldMode::CurrentPrincipalGrowth => {
                let current_underlying = principal_value(balance, exchange_rate);
                let last_activity = request.from_ts.unwrap_or_default();
                let basis = match &request.deposit_history {
                    Some(events) => self.resolver.resolve_events(
                        &request.owner_id,
                        &request.vault_token_id,
                        events,
                        request.asset_decimals,
                        current_underlying,
                        last_activity,
                    ),
                    None => {
                        self.resolver
                            .resolve(
                                &request.owner_id,
                                &request.vault_token_id,
                                request.asset_decimals,
                                current_underlying,
                                last_activity,
                            )
                            .await
                    }
                };

                match basis {
                    Some(basis) => Evaluation {
                        value: principal_growth(&basis, apy, request.to_ts.unwrap_or_default()),
                        principal: basis.original_principal,
                    },
                    None => {
                        debug!(
                            owner = %request.owner_id,
                            vault = %request.vault_token_id,
                            "no cost basis available, principal growth is zero"
                        );
                        Evaluation::default()
                    }
                }
            }
        }
    }
}
