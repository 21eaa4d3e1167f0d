use crate::datasource::DataSource;
use crate::domain::{OwnerId, VaultPosition};
use futures::future::join_all;
use std::sync::Arc;
use tracing::{debug, warn};

/// Brings vault listings up to date from the providers.
///
/// Failed fetches keep the listing's previous value for that field. Balance
/// is read first; a vault with no balance gets no rate or APY lookups.
#[derive(Debug, Clone)]
pub struct PositionRefresher {
    source: Arc<dyn DataSource>,
    owner: OwnerId,
}

impl PositionRefresher {
    pub fn new(source: Arc<dyn DataSource>, owner: OwnerId) -> Self {
        Self { source, owner }
    }

    pub async fn refresh_all(&self, listings: &[VaultPosition]) -> Vec<VaultPosition> {
        join_all(listings.iter().map(|listing| self.refresh(listing))).await
    }

    pub async fn refresh(&self, listing: &VaultPosition) -> VaultPosition {
        let mut position = listing.clone();
        if !position.is_active() {
            return position;
        }

        match self
            .source
            .fetch_share_balance(&self.owner, &position.vault_id)
            .await
        {
            Ok(balance) => {
                position.share_balance = balance.raw;
                position.asset_decimals = balance.decimals;
            }
            Err(err) => {
                warn!(vault = %position.vault_id, error = %err, "balance fetch failed, keeping previous");
            }
        }

        if !position.has_positive_balance() {
            debug!(vault = %position.vault_id, "no balance, skipping rate and apy");
            return position;
        }

        let (rate, apy) = futures::join!(
            self.source.fetch_exchange_rate(&position.vault_id),
            self.source.fetch_apy(&position.vault_id)
        );
        match rate {
            Ok(rate) => position.exchange_rate = Some(rate),
            Err(err) => {
                warn!(vault = %position.vault_id, error = %err, "exchange rate fetch failed, keeping previous")
            }
        }
        match apy {
            Ok(apy) => position.apy_percent = Some(apy),
            Err(err) => {
                warn!(vault = %position.vault_id, error = %err, "apy fetch failed, keeping previous")
            }
        }
        position
    }
}
