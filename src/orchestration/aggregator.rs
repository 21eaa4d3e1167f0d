use crate::config::EngineConfig;
use crate::datasource::DataSource;
use crate::domain::{AssetSymbol, Decimal, OwnerId, VaultId, VaultPosition, YieldMode};
use crate::engine::{AccrualTicker, Clock, TickerInputs, YieldCalculator};
use crate::error::AccrualError;
use futures::future::join_all;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// One vault's share of the aggregate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VaultContribution {
    pub vault_id: VaultId,
    /// TotalUsd figure in the vault's underlying asset.
    pub value_underlying: Decimal,
    /// USD price applied; None for USD assets and missing quotes.
    pub spot_price: Option<Decimal>,
    pub value_usd: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AggregateTotal {
    pub total_usd: Decimal,
    pub contributions: Vec<VaultContribution>,
}

/// Sums live TotalUsd figures across an owner's vaults.
///
/// Keeps one ticker per contributing vault between calls and ticks it on
/// demand; a ticker is dropped once its vault stops contributing. Vaults that
/// are not active or hold no balance are skipped without any provider call.
#[derive(Debug)]
pub struct VaultAggregator {
    owner: OwnerId,
    source: Arc<dyn DataSource>,
    calculator: Arc<YieldCalculator>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    tickers: Mutex<HashMap<VaultId, Arc<AccrualTicker>>>,
}

impl VaultAggregator {
    pub fn new(
        owner: OwnerId,
        source: Arc<dyn DataSource>,
        calculator: Arc<YieldCalculator>,
        clock: Arc<dyn Clock>,
        config: EngineConfig,
    ) -> Self {
        Self {
            owner,
            source,
            calculator,
            clock,
            config,
            tickers: Mutex::new(HashMap::new()),
        }
    }

    /// Aggregate USD value of `vaults`.
    pub async fn total(&self, vaults: &[VaultPosition]) -> Decimal {
        self.breakdown(vaults).await.total_usd
    }

    /// Aggregate USD value with per-vault contributions.
    pub async fn breakdown(&self, vaults: &[VaultPosition]) -> AggregateTotal {
        let contributing: Vec<&VaultPosition> = vaults
            .iter()
            .filter(|v| v.is_active() && v.has_positive_balance())
            .collect();

        let tickers = self.sync_tickers(&contributing);

        let mut values = Vec::with_capacity(contributing.len());
        for position in &contributing {
            let Some(ticker) = tickers.get(&position.vault_id) else {
                continue;
            };
            ticker.update(self.inputs_for(position)).await;
            values.push((*position, ticker.tick()));
        }

        let prices = self.fetch_prices(&contributing).await;

        let mut aggregate = AggregateTotal::default();
        for (position, value_underlying) in values {
            let (spot_price, value_usd) = if self.is_usd(position) {
                (None, value_underlying)
            } else {
                match prices.get(&position.asset.symbol).copied().flatten() {
                    Some(price) => match value_underlying.checked_mul(price) {
                        Some(value_usd) => (Some(price), value_usd),
                        None => {
                            let err = AccrualError::CalculationInputInvalid(format!(
                                "{} x {} overflows",
                                value_underlying, price
                            ));
                            warn!(vault = %position.vault_id, error = %err, "vault contributes zero");
                            (Some(price), Decimal::zero())
                        }
                    },
                    None => {
                        let err = AccrualError::PriceUnavailable {
                            asset: position.asset.symbol.clone(),
                            vault: position.vault_id.clone(),
                        };
                        warn!(error = %err, "vault contributes zero");
                        (None, Decimal::zero())
                    }
                }
            };
            let value_usd = match aggregate.total_usd.checked_add(value_usd) {
                Some(total) => {
                    aggregate.total_usd = total;
                    value_usd
                }
                None => {
                    warn!(vault = %position.vault_id, value = %value_usd, "total overflows, vault contributes zero");
                    Decimal::zero()
                }
            };
            aggregate.contributions.push(VaultContribution {
                vault_id: position.vault_id.clone(),
                value_underlying,
                spot_price,
                value_usd,
            });
        }

        debug!(
            owner = %self.owner,
            vaults = aggregate.contributions.len(),
            total = %aggregate.total_usd,
            "aggregate computed"
        );
        aggregate
    }

    /// Number of live tickers, one per contributing vault.
    pub fn ticker_count(&self) -> usize {
        self.tickers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }

    /// Create tickers for new vaults, drop those no longer contributing.
    fn sync_tickers(&self, contributing: &[&VaultPosition]) -> HashMap<VaultId, Arc<AccrualTicker>> {
        let mut tickers = self
            .tickers
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        tickers.retain(|vault_id, _| contributing.iter().any(|p| &p.vault_id == vault_id));
        for position in contributing {
            tickers
                .entry(position.vault_id.clone())
                .or_insert_with(|| {
                    Arc::new(AccrualTicker::new(
                        YieldMode::TotalUsd,
                        Arc::clone(&self.calculator),
                        Arc::clone(&self.clock),
                    ))
                });
        }
        tickers.clone()
    }

    fn inputs_for(&self, position: &VaultPosition) -> TickerInputs {
        TickerInputs {
            balance: Some(position.share_balance_units()),
            exchange_rate: position.exchange_rate,
            apy_percent: position.apy_percent,
            last_activity_timestamp: position.last_activity_timestamp,
            ..TickerInputs::new(
                self.owner.clone(),
                position.vault_id.clone(),
                position.asset_decimals,
            )
        }
    }

    fn is_usd(&self, position: &VaultPosition) -> bool {
        position.asset.usd_denominated || self.config.is_usd_asset(position.asset.symbol.as_str())
    }

    /// One concurrent lookup per distinct non-USD asset.
    async fn fetch_prices(
        &self,
        contributing: &[&VaultPosition],
    ) -> HashMap<AssetSymbol, Option<Decimal>> {
        let assets: BTreeSet<AssetSymbol> = contributing
            .iter()
            .filter(|p| !self.is_usd(p))
            .map(|p| p.asset.symbol.clone())
            .collect();

        let lookups = assets.into_iter().map(|asset| async move {
            let price = match self.source.fetch_spot_price(&asset).await {
                Ok(price) => price.filter(|p| p.is_positive()),
                Err(err) => {
                    warn!(asset = %asset, error = %err, "spot price fetch failed");
                    None
                }
            };
            (asset, price)
        });

        join_all(lookups).await.into_iter().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datasource::mock::{MockDataSource, MockOperation};
    use crate::domain::{Timestamp, VaultAsset, VaultStatus};
    use crate::engine::{CachedCostBasisResolver, ManualClock};
    use std::time::Duration;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn position(id: &str, asset: VaultAsset, raw: i128) -> VaultPosition {
        VaultPosition {
            vault_id: VaultId::new(id),
            chain_id: 1,
            asset,
            status: VaultStatus::Active,
            asset_decimals: 6,
            share_balance: raw,
            exchange_rate: Some(d("1")),
            apy_percent: Some(d("0")),
            last_activity_timestamp: Some(Timestamp::new(1_000)),
        }
    }

    fn aggregator(mock: Arc<MockDataSource>) -> VaultAggregator {
        let resolver = Arc::new(CachedCostBasisResolver::new(mock.clone(), Duration::ZERO));
        VaultAggregator::new(
            OwnerId::new("0xowner"),
            mock,
            Arc::new(YieldCalculator::new(resolver)),
            Arc::new(ManualClock::new(Timestamp::new(1_000))),
            EngineConfig::default(),
        )
    }

    #[tokio::test]
    async fn test_config_usd_symbol_needs_no_price() {
        let mock = Arc::new(MockDataSource::new());
        let agg = aggregator(mock.clone());
        // Not flagged USD on the asset, but listed in config.
        let vaults = vec![position("a", VaultAsset::priced("usdt"), 2_000_000)];

        assert_eq!(agg.total(&vaults).await, d("2"));
        assert_eq!(mock.call_count(MockOperation::SpotPrice), 0);
    }

    #[test]
    fn test_total_spawns_no_background_tasks() {
        // Driven outside any tokio runtime: spawning a timer would panic.
        let agg = aggregator(Arc::new(MockDataSource::new()));
        let vaults = vec![position("a", VaultAsset::usd("USDC"), 3_000_000)];

        let total = futures::executor::block_on(agg.total(&vaults));
        assert_eq!(total, d("3"));
        assert_eq!(agg.ticker_count(), 1);
    }

    #[tokio::test]
    async fn test_tickers_pruned_when_vault_empties() {
        let mock = Arc::new(MockDataSource::new());
        let agg = aggregator(mock);

        let mut vaults = vec![
            position("a", VaultAsset::usd("USDC"), 1_000_000),
            position("b", VaultAsset::usd("USDC"), 1_000_000),
        ];
        agg.total(&vaults).await;
        assert_eq!(agg.ticker_count(), 2);

        vaults[1].share_balance = 0;
        assert_eq!(agg.total(&vaults).await, d("1"));
        assert_eq!(agg.ticker_count(), 1);
    }

    #[tokio::test]
    async fn test_price_fetched_once_per_asset() {
        let mock = Arc::new(
            MockDataSource::new().with_spot_price(&AssetSymbol::new("WETH"), d("2000")),
        );
        let agg = aggregator(mock.clone());
        let vaults = vec![
            position("a", VaultAsset::priced("WETH"), 1_000_000),
            position("b", VaultAsset::priced("WETH"), 500_000),
        ];

        let breakdown = agg.breakdown(&vaults).await;
        assert_eq!(breakdown.total_usd, d("3000"));
        assert_eq!(breakdown.contributions[0].spot_price, Some(d("2000")));
        assert_eq!(mock.call_count(MockOperation::SpotPrice), 1);
    }
}
