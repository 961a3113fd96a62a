//! Payout deduplication.
//!
//! Single source of truth for "has this redemption event been paid out",
//! keyed by the compound identity (txHash, fundKey, periodId, holder).

use std::collections::HashSet;

use crate::types::PayoutKey;

/// Tracks payout identity keys that have already been recorded.
///
/// Unlike trade-feed dedup, payout keys must never expire: a key evicted
/// from memory could be paid twice on redelivery. The set is seeded from
/// the durable payout log at startup and grows for the process lifetime;
/// at one key per redemption this stays small.
#[derive(Debug, Default)]
pub struct PayoutDeduplicator {
    recorded: HashSet<PayoutKey>,
}

impl PayoutDeduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed from keys recovered off the durable payout log.
    pub fn seed<I: IntoIterator<Item = PayoutKey>>(keys: I) -> Self {
        Self {
            recorded: keys.into_iter().collect(),
        }
    }

    /// Has this key already been recorded?
    pub fn is_duplicate(&self, key: &PayoutKey) -> bool {
        self.recorded.contains(key)
    }

    /// Mark a key as recorded.
    ///
    /// Returns `true` if the key was new, `false` if already present.
    pub fn mark_recorded(&mut self, key: PayoutKey) -> bool {
        self.recorded.insert(key)
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.recorded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recorded.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FundKey;
    use alloy::primitives::{Address, B256};

    fn key(period_id: u64) -> PayoutKey {
        PayoutKey {
            tx_hash: B256::ZERO,
            fund_key: FundKey::I,
            period_id,
            holder: Address::ZERO,
        }
    }

    #[test]
    fn new_key_then_duplicate() {
        let mut dedup = PayoutDeduplicator::new();
        assert!(!dedup.is_duplicate(&key(1)));
        assert!(dedup.mark_recorded(key(1)));
        assert!(dedup.is_duplicate(&key(1)));
        assert!(!dedup.mark_recorded(key(1)));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn seeded_keys_are_duplicates() {
        let dedup = PayoutDeduplicator::seed([key(1), key(2)]);
        assert!(dedup.is_duplicate(&key(1)));
        assert!(dedup.is_duplicate(&key(2)));
        assert!(!dedup.is_duplicate(&key(3)));
    }

    #[test]
    fn keys_never_evicted() {
        let mut dedup = PayoutDeduplicator::new();
        for i in 0..100_000u64 {
            dedup.mark_recorded(key(i));
        }
        assert!(dedup.is_duplicate(&key(0)));
        assert_eq!(dedup.len(), 100_000);
    }
}
