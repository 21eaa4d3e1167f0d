//! Deposit/withdrawal ledger event.

use crate::domain::{Decimal, Direction, Timestamp, VaultId};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// A deposit or withdrawal against a vault, as reported by the history source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepositEvent {
    /// Stable unique identifier for this event.
    ///
    /// Priority: `tx_hash` (if present) > hash of deterministic fields.
    pub id: String,
    /// Time of the event in seconds since Unix epoch.
    pub timestamp: Timestamp,
    /// Unsigned amount in raw base units of the vault's underlying asset.
    pub amount_underlying: Decimal,
    pub direction: Direction,
    pub vault_id: VaultId,
}

impl DepositEvent {
    /// Create a new event and compute its `id`.
    pub fn new(
        vault_id: VaultId,
        timestamp: Timestamp,
        amount_underlying: Decimal,
        direction: Direction,
        tx_hash: Option<String>,
    ) -> Self {
        let id = Self::compute_event_key(
            &vault_id,
            timestamp,
            &amount_underlying,
            direction,
            tx_hash.as_deref(),
        );
        Self {
            id,
            timestamp,
            amount_underlying,
            direction,
            vault_id,
        }
    }

    /// Deposit shorthand.
    pub fn deposit(vault_id: VaultId, timestamp: Timestamp, amount: Decimal) -> Self {
        Self::new(vault_id, timestamp, amount, Direction::In, None)
    }

    /// Withdrawal shorthand.
    pub fn withdrawal(vault_id: VaultId, timestamp: Timestamp, amount: Decimal) -> Self {
        Self::new(vault_id, timestamp, amount, Direction::Out, None)
    }

    /// Compute a stable unique key for this event.
    ///
    /// When `tx_hash` is unavailable the key is a SHA-256 of the deterministic
    /// fields truncated to 128 bits.
    pub fn compute_event_key(
        vault_id: &VaultId,
        timestamp: Timestamp,
        amount: &Decimal,
        direction: Direction,
        tx_hash: Option<&str>,
    ) -> String {
        if let Some(tx) = tx_hash.filter(|s| !s.trim().is_empty()) {
            return tx.trim().to_lowercase();
        }

        let mut hasher = Sha256::new();
        hash_var(&mut hasher, vault_id.as_str());
        hasher.update(timestamp.as_secs().to_le_bytes());
        hash_var(&mut hasher, &amount.to_canonical_string());
        hasher.update([direction as u8]);

        let hash = hasher.finalize();
        format!("hash:{}", hex::encode(&hash[..16]))
    }
}

fn hash_var(hasher: &mut Sha256, data: &str) {
    hasher.update((data.len() as u32).to_le_bytes());
    hasher.update(data.as_bytes());
}

/// Order-sensitive digest of an event history.
///
/// Two histories with the same fingerprint are treated as unchanged when
/// deciding whether a reconciliation is needed.
pub fn history_fingerprint(events: &[DepositEvent]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((events.len() as u64).to_le_bytes());
    for event in events {
        hash_var(&mut hasher, &event.id);
        hasher.update(event.timestamp.as_secs().to_le_bytes());
        hash_var(&mut hasher, &event.amount_underlying.to_canonical_string());
        hasher.update([event.direction as u8]);
    }
    hex::encode(&hasher.finalize()[..16])
}
