//! On-chain redemption events, audit events, and payout records.

use std::fmt;

use alloy::primitives::{Address, B256, U256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::FundKey;
use crate::serde_utils::u256_decimal;

/// A `RedemptionProcessed` event as emitted by a fund's contract.
///
/// All amounts were computed on-chain and are carried through verbatim;
/// the engine never recomputes them.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionOnChainEvent {
    pub fund_key: FundKey,
    pub holder: Address,
    pub period_id: u64,
    #[serde(with = "u256_decimal")]
    pub amount_tokens: U256,
    #[serde(with = "u256_decimal")]
    pub nav_per_token: U256,
    #[serde(with = "u256_decimal")]
    pub gross_value: U256,
    #[serde(with = "u256_decimal")]
    pub penalty_amount: U256,
    #[serde(with = "u256_decimal")]
    pub liquidity_fee_amount: U256,
    #[serde(with = "u256_decimal")]
    pub discount_amount: U256,
    #[serde(with = "u256_decimal")]
    pub net_payout: U256,
    /// Block timestamp from the event, seconds since epoch.
    pub event_timestamp: u64,
    pub tx_hash: B256,
}

impl RedemptionOnChainEvent {
    /// Deduplication identity of this event.
    pub fn payout_key(&self) -> PayoutKey {
        PayoutKey {
            tx_hash: self.tx_hash,
            fund_key: self.fund_key,
            period_id: self.period_id,
            holder: self.holder,
        }
    }
}

/// Compound identity key for payout deduplication.
///
/// A single transaction can emit redemption events for several holders or
/// periods, so the transaction hash alone is not a safe key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutKey {
    pub tx_hash: B256,
    pub fund_key: FundKey,
    pub period_id: u64,
    pub holder: Address,
}

impl fmt::Display for PayoutKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}",
            self.tx_hash, self.fund_key, self.period_id, self.holder
        )
    }
}

/// Dispatch outcome of a recorded payout.
///
/// `Pending` means the record is durably stored but the executor has not
/// been invoked yet; `Failed` is retryable out of band.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[serde(tag = "status")]
pub enum DispatchStatus {
    Pending,
    Dispatched,
    Failed { reason: String },
}

/// Canonical persisted form of a processed redemption event.
///
/// One-to-one with a dispatched payout; identity keys are unique across
/// the payout log.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayoutRecord {
    pub event: RedemptionOnChainEvent,
    pub recorded_at: DateTime<Utc>,
    pub dispatch_status: DispatchStatus,
}

impl PayoutRecord {
    /// Build a record from a freshly deduplicated event.
    pub fn from_event(event: RedemptionOnChainEvent) -> Self {
        Self {
            event,
            recorded_at: Utc::now(),
            dispatch_status: DispatchStatus::Pending,
        }
    }

    pub fn key(&self) -> PayoutKey {
        self.event.payout_key()
    }
}

/// One entry in the append-only audit trail.
///
/// `signature` stays `None` for now; it is reserved for future
/// notarization of the log.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub event_id: Uuid,
    pub timestamp: DateTime<Utc>,
    /// System or module responsible for the event.
    pub actor: String,
    pub event_type: String,
    pub event_data: serde_json::Value,
    pub signature: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_event(period_id: u64) -> RedemptionOnChainEvent {
        RedemptionOnChainEvent {
            fund_key: FundKey::I,
            holder: Address::ZERO,
            period_id,
            amount_tokens: U256::from(1_000u64),
            nav_per_token: U256::from(22u64),
            gross_value: U256::from(22_000u64),
            penalty_amount: U256::ZERO,
            liquidity_fee_amount: U256::from(10u64),
            discount_amount: U256::ZERO,
            net_payout: U256::from(21_990u64),
            event_timestamp: 1_735_689_600,
            tx_hash: B256::ZERO,
        }
    }

    #[test]
    fn payout_key_distinguishes_periods() {
        let a = sample_event(1).payout_key();
        let b = sample_event(2).payout_key();
        assert_ne!(a, b);
    }

    #[test]
    fn payout_key_ignores_delivery_metadata() {
        // Same identity fields, different amounts still collide by design:
        // identity is (txHash, fundKey, periodId, holder) only.
        let mut other = sample_event(1);
        other.net_payout = U256::from(5u64);
        assert_eq!(sample_event(1).payout_key(), other.payout_key());
    }

    #[test]
    fn payout_record_serde_round_trip() {
        let record = PayoutRecord::from_event(sample_event(7));
        let line = serde_json::to_string(&record).unwrap();
        let back: PayoutRecord = serde_json::from_str(&line).unwrap();
        assert_eq!(back, record);
        assert_eq!(back.dispatch_status, DispatchStatus::Pending);
    }
}
