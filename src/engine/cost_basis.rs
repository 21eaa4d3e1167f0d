//! FIFO cost-basis resolution over a deposit/withdraw history.

use crate::datasource::{DataSource, DataSourceError};
use crate::domain::{CostBasis, Decimal, DepositEvent, Direction, OwnerId, Timestamp, VaultId};
use crate::error::AccrualError;
use backoff::future::retry;
use backoff::ExponentialBackoffBuilder;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, warn};

/// An open deposit lot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Lot {
    pub amount: Decimal,
    pub timestamp: Timestamp,
}

/// Queue of open lots; withdrawals consume the oldest lot first.
#[derive(Debug, Clone, Default)]
pub struct FifoLots {
    lots: VecDeque<Lot>,
}

impl FifoLots {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one event with `amount` already in balance units.
    ///
    /// Non-positive amounts and cancellations are ignored. A withdrawal larger
    /// than every open lot empties the queue; the excess has nothing to consume.
    pub fn apply(&mut self, direction: Direction, amount: Decimal, timestamp: Timestamp) {
        if !amount.is_positive() {
            return;
        }
        match direction {
            Direction::In => self.lots.push_back(Lot { amount, timestamp }),
            Direction::Out => self.consume(amount),
            Direction::Cancel => {}
        }
    }

    fn consume(&mut self, mut remaining: Decimal) {
        while remaining.is_positive() {
            let Some(front) = self.lots.front_mut() else {
                return;
            };
            if front.amount > remaining {
                front.amount = front.amount - remaining;
                return;
            }
            remaining = remaining - front.amount;
            self.lots.pop_front();
        }
    }

    /// Sum of open lot amounts.
    pub fn principal(&self) -> Decimal {
        self.lots.iter().map(|lot| lot.amount).sum()
    }

    /// Timestamp of the oldest open lot.
    pub fn oldest(&self) -> Option<Timestamp> {
        self.lots.front().map(|lot| lot.timestamp)
    }

    pub fn is_empty(&self) -> bool {
        self.lots.is_empty()
    }

    pub fn lots(&self) -> impl Iterator<Item = &Lot> {
        self.lots.iter()
    }
}

/// Resolve the cost basis of `current_balance` from `events`.
///
/// Event amounts must be in the same units as `current_balance`. Returns None
/// when the balance is not positive. When every tracked lot has been
/// withdrawn but a balance remains (an untracked inflow), the whole balance is
/// treated as principal deposited at `last_activity`.
pub fn resolve(
    events: &[DepositEvent],
    current_balance: Decimal,
    last_activity: Timestamp,
) -> Option<CostBasis> {
    resolve_scaled(events, Decimal::from(1), current_balance, last_activity)
}

/// Like [`resolve`], with event amounts in raw base units of an asset with
/// `asset_decimals` decimals.
pub fn resolve_raw(
    events: &[DepositEvent],
    asset_decimals: u32,
    current_balance: Decimal,
    last_activity: Timestamp,
) -> Option<CostBasis> {
    let Some(unit) = Decimal::from_raw_units(1, asset_decimals) else {
        let err = AccrualError::CalculationInputInvalid(format!(
            "asset decimals {} out of range",
            asset_decimals
        ));
        warn!(error = %err, "cannot scale deposit amounts");
        return None;
    };
    resolve_scaled(events, unit, current_balance, last_activity)
}

fn resolve_scaled(
    events: &[DepositEvent],
    unit: Decimal,
    current_balance: Decimal,
    last_activity: Timestamp,
) -> Option<CostBasis> {
    if !current_balance.is_positive() {
        return None;
    }

    let mut ordered: Vec<&DepositEvent> = events.iter().collect();
    ordered.sort_by_key(|e| e.timestamp);

    let mut lots = FifoLots::new();
    for event in ordered {
        let amount = event
            .amount_underlying
            .checked_mul(unit)
            .unwrap_or_default();
        lots.apply(event.direction, amount, event.timestamp);
    }

    match lots.oldest() {
        Some(first_deposit_timestamp) => Some(CostBasis {
            original_principal: lots.principal(),
            first_deposit_timestamp,
        }),
        None => {
            debug!(
                balance = %current_balance,
                "no open lots against positive balance, using last activity as principal time"
            );
            Some(CostBasis {
                original_principal: current_balance,
                first_deposit_timestamp: last_activity,
            })
        }
    }
}

/// Resolves cost basis from the history source and remembers the last good
/// value per owner+vault.
///
/// A failed history fetch returns the remembered value (or None before the
/// first success), never a zero principal.
#[derive(Debug)]
pub struct CachedCostBasisResolver {
    source: Arc<dyn DataSource>,
    retry_max: Duration,
    resolved: Mutex<HashMap<(OwnerId, VaultId), CostBasis>>,
}

impl CachedCostBasisResolver {
    pub fn new(source: Arc<dyn DataSource>, retry_max: Duration) -> Self {
        Self {
            source,
            retry_max,
            resolved: Mutex::new(HashMap::new()),
        }
    }

    /// Fetch the history for `owner` in `vault` and resolve its cost basis.
    pub async fn resolve(
        &self,
        owner: &OwnerId,
        vault: &VaultId,
        asset_decimals: u32,
        current_balance: Decimal,
        last_activity: Timestamp,
    ) -> Option<CostBasis> {
        if !current_balance.is_positive() {
            self.forget(owner, vault);
            return None;
        }

        match self.fetch_history(owner, vault).await {
            Ok(events) => self.resolve_events(
                owner,
                vault,
                &events,
                asset_decimals,
                current_balance,
                last_activity,
            ),
            Err(err) => {
                let previous = self.previous(owner, vault);
                warn!(
                    owner = %owner,
                    vault = %vault,
                    error = %err,
                    has_previous = previous.is_some(),
                    "history unavailable, keeping previous cost basis"
                );
                previous
            }
        }
    }

    /// Resolve from a history the caller already holds, updating the cache.
    pub fn resolve_events(
        &self,
        owner: &OwnerId,
        vault: &VaultId,
        events: &[DepositEvent],
        asset_decimals: u32,
        current_balance: Decimal,
        last_activity: Timestamp,
    ) -> Option<CostBasis> {
        let relevant: Vec<DepositEvent> = events
            .iter()
            .filter(|e| &e.vault_id == vault)
            .cloned()
            .collect();

        let resolved = resolve_raw(&relevant, asset_decimals, current_balance, last_activity);
        let mut cache = self
            .resolved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        match resolved {
            Some(basis) => {
                cache.insert((owner.clone(), vault.clone()), basis);
            }
            None => {
                cache.remove(&(owner.clone(), vault.clone()));
            }
        }
        resolved
    }

    /// Last successfully resolved cost basis.
    pub fn previous(&self, owner: &OwnerId, vault: &VaultId) -> Option<CostBasis> {
        self.resolved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&(owner.clone(), vault.clone()))
            .copied()
    }

    fn forget(&self, owner: &OwnerId, vault: &VaultId) {
        self.resolved
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&(owner.clone(), vault.clone()));
    }

    async fn fetch_history(
        &self,
        owner: &OwnerId,
        vault: &VaultId,
    ) -> Result<Vec<DepositEvent>, AccrualError> {
        let backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(100).min(self.retry_max))
            .with_max_interval(Duration::from_secs(2))
            .with_max_elapsed_time(Some(self.retry_max))
            .build();

        retry(backoff, || async {
            self.source
                .fetch_history(owner, vault)
                .await
                .map_err(|e: DataSourceError| {
                    if e.is_transient() {
                        debug!(owner = %owner, vault = %vault, error = %e, "retrying history fetch");
                        backoff::Error::transient(e)
                    } else {
                        backoff::Error::permanent(e)
                    }
                })
        })
        .await
        .map_err(AccrualError::from)
    }
}
