//! Short-window exchange rate cache in front of any data source.

use super::{DataSource, DataSourceError, ShareBalance};
use crate::domain::{AssetSymbol, Decimal, DepositEvent, OwnerId, Timestamp, VaultId};
use crate::engine::Clock;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Caches exchange rates per vault for `ttl_secs`; every other call passes through.
///
/// When a refresh fails and a stale rate is on hand, the stale rate is served.
#[derive(Debug)]
pub struct RateCache {
    inner: Arc<dyn DataSource>,
    clock: Arc<dyn Clock>,
    ttl_secs: i64,
    rates: Mutex<HashMap<VaultId, (Decimal, Timestamp)>>,
}

impl RateCache {
    pub fn new(inner: Arc<dyn DataSource>, clock: Arc<dyn Clock>, ttl_secs: i64) -> Self {
        Self {
            inner,
            clock,
            ttl_secs,
            rates: Mutex::new(HashMap::new()),
        }
    }

    fn cached(&self, vault: &VaultId) -> Option<(Decimal, Timestamp)> {
        self.rates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(vault)
            .copied()
    }

    fn store(&self, vault: &VaultId, rate: Decimal, at: Timestamp) {
        self.rates
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(vault.clone(), (rate, at));
    }
}

#[async_trait]
impl DataSource for RateCache {
    async fn fetch_share_balance(
        &self,
        owner: &OwnerId,
        vault: &VaultId,
    ) -> Result<ShareBalance, DataSourceError> {
        self.inner.fetch_share_balance(owner, vault).await
    }

    async fn fetch_exchange_rate(&self, vault: &VaultId) -> Result<Decimal, DataSourceError> {
        let now = self.clock.now();
        let cached = self.cached(vault);
        if let Some((rate, fetched_at)) = cached {
            if now.seconds_since(fetched_at) < self.ttl_secs {
                debug!(vault = %vault, "exchange rate served from cache");
                return Ok(rate);
            }
        }

        match self.inner.fetch_exchange_rate(vault).await {
            Ok(rate) => {
                self.store(vault, rate, now);
                Ok(rate)
            }
            Err(err) => match cached {
                Some((rate, _)) => {
                    warn!(vault = %vault, error = %err, "exchange rate refresh failed, serving stale rate");
                    Ok(rate)
                }
                None => Err(err),
            },
        }
    }

    async fn fetch_apy(&self, vault: &VaultId) -> Result<Decimal, DataSourceError> {
        self.inner.fetch_apy(vault).await
    }

    async fn fetch_history(
        &self,
        owner: &OwnerId,
        vault: &VaultId,
    ) -> Result<Vec<DepositEvent>, DataSourceError> {
        self.inner.fetch_history(owner, vault).await
    }

    async fn fetch_spot_price(
        &self,
        asset: &AssetSymbol,
    ) -> Result<Option<Decimal>, DataSourceError> {
        self.inner.fetch_spot_price(asset).await
    }
}
