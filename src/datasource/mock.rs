//! Mock data source for testing without network calls.

use super::{DataSource, DataSourceError, ShareBalance};
use crate::domain::{AssetSymbol, Decimal, DepositEvent, OwnerId, VaultId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

/// Provider operations, used for failure injection and call counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MockOperation {
    ShareBalance,
    ExchangeRate,
    Apy,
    History,
    SpotPrice,
}

#[derive(Debug, Default)]
struct MockState {
    balances: HashMap<(OwnerId, VaultId), ShareBalance>,
    rates: HashMap<VaultId, Decimal>,
    apys: HashMap<VaultId, Decimal>,
    histories: HashMap<(OwnerId, VaultId), Vec<DepositEvent>>,
    prices: HashMap<AssetSymbol, Decimal>,
    /// Error to return, and how many more times (None: until cleared).
    failures: HashMap<MockOperation, (DataSourceError, Option<usize>)>,
    calls: HashMap<MockOperation, usize>,
}

/// Mock data source that returns predefined test data.
///
/// Data and failures can be changed after construction so tests can model a
/// provider that recovers or degrades mid-run.
#[derive(Debug, Default)]
pub struct MockDataSource {
    state: Mutex<MockState>,
    history_delay: Option<Duration>,
}

impl MockDataSource {
    /// Create a new mock data source with empty data.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_share_balance(self, owner: &OwnerId, vault: &VaultId, raw: i128, decimals: u32) -> Self {
        self.state()
            .balances
            .insert((owner.clone(), vault.clone()), ShareBalance { raw, decimals });
        self
    }

    pub fn with_exchange_rate(self, vault: &VaultId, rate: Decimal) -> Self {
        self.set_exchange_rate(vault, rate);
        self
    }

    pub fn with_apy(self, vault: &VaultId, apy_percent: Decimal) -> Self {
        self.state().apys.insert(vault.clone(), apy_percent);
        self
    }

    pub fn with_history(self, owner: &OwnerId, vault: &VaultId, events: Vec<DepositEvent>) -> Self {
        self.set_history(owner, vault, events);
        self
    }

    pub fn with_spot_price(self, asset: &AssetSymbol, price: Decimal) -> Self {
        self.state().prices.insert(asset.clone(), price);
        self
    }

    /// Delay every history response, to model a slow indexer.
    pub fn with_history_delay(mut self, delay: Duration) -> Self {
        self.history_delay = Some(delay);
        self
    }

    pub fn set_exchange_rate(&self, vault: &VaultId, rate: Decimal) {
        self.state().rates.insert(vault.clone(), rate);
    }

    pub fn set_history(&self, owner: &OwnerId, vault: &VaultId, events: Vec<DepositEvent>) {
        self.state()
            .histories
            .insert((owner.clone(), vault.clone()), events);
    }

    /// Make every subsequent call to `op` fail with `err`.
    pub fn set_failure(&self, op: MockOperation, err: DataSourceError) {
        self.state().failures.insert(op, (err, None));
    }

    /// Make the next `times` calls to `op` fail with `err`, then recover.
    pub fn fail_times(&self, op: MockOperation, err: DataSourceError, times: usize) {
        if times > 0 {
            self.state().failures.insert(op, (err, Some(times)));
        }
    }

    pub fn clear_failure(&self, op: MockOperation) {
        self.state().failures.remove(&op);
    }

    /// Number of calls made to `op` so far, including failed ones.
    pub fn call_count(&self, op: MockOperation) -> usize {
        self.state().calls.get(&op).copied().unwrap_or(0)
    }

    fn record(&self, op: MockOperation) -> Result<(), DataSourceError> {
        let mut state = self.state();
        *state.calls.entry(op).or_insert(0) += 1;
        let Some((err, remaining)) = state.failures.get_mut(&op) else {
            return Ok(());
        };
        let err = err.clone();
        if let Some(left) = remaining {
            *left -= 1;
            if *left == 0 {
                state.failures.remove(&op);
            }
        }
        Err(err)
    }
}

#[async_trait]
impl DataSource for MockDataSource {
    async fn fetch_share_balance(
        &self,
        owner: &OwnerId,
        vault: &VaultId,
    ) -> Result<ShareBalance, DataSourceError> {
        self.record(MockOperation::ShareBalance)?;
        Ok(self
            .state()
            .balances
            .get(&(owner.clone(), vault.clone()))
            .copied()
            .unwrap_or(ShareBalance { raw: 0, decimals: 0 }))
    }

    async fn fetch_exchange_rate(&self, vault: &VaultId) -> Result<Decimal, DataSourceError> {
        self.record(MockOperation::ExchangeRate)?;
        self.state()
            .rates
            .get(vault)
            .copied()
            .ok_or_else(|| DataSourceError::Other(format!("no exchange rate for {}", vault)))
    }

    async fn fetch_apy(&self, vault: &VaultId) -> Result<Decimal, DataSourceError> {
        self.record(MockOperation::Apy)?;
        Ok(self.state().apys.get(vault).copied().unwrap_or_default())
    }

    async fn fetch_history(
        &self,
        owner: &OwnerId,
        vault: &VaultId,
    ) -> Result<Vec<DepositEvent>, DataSourceError> {
        if let Some(delay) = self.history_delay {
            tokio::time::sleep(delay).await;
        }
        self.record(MockOperation::History)?;
        Ok(self
            .state()
            .histories
            .get(&(owner.clone(), vault.clone()))
            .cloned()
            .unwrap_or_default())
    }

    async fn fetch_spot_price(
        &self,
        asset: &AssetSymbol,
    ) -> Result<Option<Decimal>, DataSourceError> {
        self.record(MockOperation::SpotPrice)?;
        Ok(self.state().prices.get(asset).copied())
    }
}
