//! Payout execution seam.
//!
//! Real money movement (stablecoin transfers, bank rails, internal ledger
//! updates) lives behind this trait in external integrations. The engine
//! only guarantees that an executor is invoked at most once per recorded
//! payout, under a caller-supplied timeout.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use crate::errors::DispatchError;
use crate::types::PayoutRecord;

/// External payout execution collaborator.
#[async_trait]
pub trait PayoutExecutor: Send + Sync {
    /// Execute the payout described by `record`.
    ///
    /// The record is already durably stored when this is called; a
    /// failure here is retryable out of band and must never cause the
    /// record to be written again.
    async fn execute(&self, record: &PayoutRecord) -> Result<(), DispatchError>;
}

/// Run an executor under a timeout.
///
/// A timeout counts as a failed (retryable) dispatch, never as success.
pub async fn execute_with_timeout(
    executor: &dyn PayoutExecutor,
    record: &PayoutRecord,
    timeout: Duration,
) -> Result<(), DispatchError> {
    match tokio::time::timeout(timeout, executor.execute(record)).await {
        Ok(result) => result,
        Err(_) => Err(DispatchError::Timeout {
            timeout_secs: timeout.as_secs(),
        }),
    }
}

/// Executor that only logs payout intent.
///
/// Stands in until the money-movement integrations are wired up.
#[derive(Debug, Default)]
pub struct LoggingPayoutExecutor;

#[async_trait]
impl PayoutExecutor for LoggingPayoutExecutor {
    async fn execute(&self, record: &PayoutRecord) -> Result<(), DispatchError> {
        let event = &record.event;
        info!(
            target: "settlement_engine::payout",
            fund = %event.fund_key,
            holder = %event.holder,
            period_id = event.period_id,
            net_payout = %event.net_payout,
            tx_hash = %event.tx_hash,
            "payout due"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{FundKey, RedemptionOnChainEvent};
    use alloy::primitives::{Address, B256, U256};

    struct SlowExecutor;

    #[async_trait]
    impl PayoutExecutor for SlowExecutor {
        async fn execute(&self, _record: &PayoutRecord) -> Result<(), DispatchError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(())
        }
    }

    fn record() -> PayoutRecord {
        PayoutRecord::from_event(RedemptionOnChainEvent {
            fund_key: FundKey::I,
            holder: Address::ZERO,
            period_id: 1,
            amount_tokens: U256::from(1u64),
            nav_per_token: U256::from(1u64),
            gross_value: U256::from(1u64),
            penalty_amount: U256::ZERO,
            liquidity_fee_amount: U256::ZERO,
            discount_amount: U256::ZERO,
            net_payout: U256::from(1u64),
            event_timestamp: 0,
            tx_hash: B256::ZERO,
        })
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_is_a_failed_dispatch() {
        let result =
            execute_with_timeout(&SlowExecutor, &record(), Duration::from_secs(5)).await;
        assert!(matches!(
            result,
            Err(DispatchError::Timeout { timeout_secs: 5 })
        ));
    }

    #[tokio::test]
    async fn logging_executor_succeeds() {
        let result =
            execute_with_timeout(&LoggingPayoutExecutor, &record(), Duration::from_secs(5))
                .await;
        assert!(result.is_ok());
    }
}
