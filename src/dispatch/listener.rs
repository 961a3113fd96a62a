//! Per-fund redemption event listener and payout dispatcher.
//!
//! The chain transport pushes decoded `RedemptionProcessed` events into a
//! bounded queue; one worker per fund pulls from it, so blocking store and
//! audit I/O never runs on the event-receipt path. Events across funds are
//! processed concurrently; within a fund the worker is strictly
//! sequential, which is all the ordering deduplication needs.
//!
//! Per event: dedup check first (before any audit append or payout
//! trigger), then durable record, audit append, and payout execution
//! under a timeout. A duplicate is a successful no-op. A single event's
//! failure never stops the subscription.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::executor::{execute_with_timeout, PayoutExecutor};
use super::payout_store::PayoutStore;
use crate::audit::AuditTrail;
use crate::config::Config;
use crate::prelude::*;
use crate::types::{DispatchStatus, FundKey, PayoutRecord, RedemptionOnChainEvent};

/// Audit actor recorded for every listener action.
const ACTOR: &str = "settlement-engine";

/// Listener lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    Idle,
    Listening,
    Processing,
    Recorded,
    Failed,
}

/// Counters reported when a listener shuts down.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ListenerStats {
    /// Events durably recorded as payouts.
    pub recorded: u64,
    /// Recorded payouts whose dispatch succeeded.
    pub dispatched: u64,
    /// Events discarded as duplicates (successful no-ops).
    pub duplicates: u64,
    /// Events that failed before or during dispatch.
    pub failures: u64,
}

/// Worker that turns one fund's redemption events into payout records.
pub struct FundListener {
    fund: FundKey,
    audit: Arc<AuditTrail>,
    store: Arc<PayoutStore>,
    executor: Arc<dyn PayoutExecutor>,
    dispatch_timeout: Duration,
    state: watch::Sender<ListenerState>,
    stats: ListenerStats,
}

impl FundListener {
    pub fn new(
        fund: FundKey,
        config: &Config,
        audit: Arc<AuditTrail>,
        store: Arc<PayoutStore>,
        executor: Arc<dyn PayoutExecutor>,
    ) -> Self {
        let (state, _) = watch::channel(ListenerState::Idle);
        Self {
            fund,
            audit,
            store,
            executor,
            dispatch_timeout: config.dispatch_timeout,
            state,
            stats: ListenerStats::default(),
        }
    }

    /// Subscribe to the listener's lifecycle state.
    ///
    /// Subscribe before `spawn`; the receiver tracks every transition for
    /// the life of the worker.
    pub fn state(&self) -> watch::Receiver<ListenerState> {
        self.state.subscribe()
    }

    fn set_state(&self, state: ListenerState) {
        self.state.send_replace(state);
    }

    /// Spawn the listener with a bounded event queue.
    ///
    /// Returns the sender side for the transport and a handle resolving
    /// to the final stats once the listener drains and exits.
    pub fn spawn(
        self,
        queue_capacity: usize,
        shutdown: watch::Receiver<bool>,
    ) -> (
        mpsc::Sender<RedemptionOnChainEvent>,
        JoinHandle<ListenerStats>,
    ) {
        let (tx, rx) = mpsc::channel(queue_capacity);
        let handle = tokio::spawn(self.run(rx, shutdown));
        (tx, handle)
    }

    /// Main worker loop.
    ///
    /// Exits when the shutdown flag flips or the transport drops the
    /// sender. An in-flight event always reaches Recorded or Failed
    /// before the loop observes shutdown.
    pub async fn run(
        mut self,
        mut events: mpsc::Receiver<RedemptionOnChainEvent>,
        mut shutdown: watch::Receiver<bool>,
    ) -> ListenerStats {
        self.set_state(ListenerState::Listening);
        info!(
            target: "settlement_engine::listener",
            fund = %self.fund,
            "listening for RedemptionProcessed events"
        );

        loop {
            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    match changed {
                        Ok(()) if *shutdown.borrow_and_update() => break,
                        Ok(()) => {}
                        // Shutdown sender dropped; treat as shutdown.
                        Err(_) => break,
                    }
                }
                maybe_event = events.recv() => {
                    match maybe_event {
                        Some(event) => self.process_event(event).await,
                        None => break,
                    }
                }
            }
        }

        events.close();
        self.set_state(ListenerState::Idle);
        info!(
            target: "settlement_engine::listener",
            fund = %self.fund,
            recorded = self.stats.recorded,
            dispatched = self.stats.dispatched,
            duplicates = self.stats.duplicates,
            failures = self.stats.failures,
            "listener stopped"
        );
        self.stats
    }

    async fn process_event(&mut self, event: RedemptionOnChainEvent) {
        self.set_state(ListenerState::Processing);
        let key = event.payout_key();

        if event.fund_key != self.fund {
            warn!(
                target: "settlement_engine::listener",
                fund = %self.fund,
                event_fund = %event.fund_key,
                "event delivered to the wrong fund listener, dropping"
            );
            self.set_state(ListenerState::Failed);
            self.stats.failures += 1;
            self.set_state(ListenerState::Idle);
            return;
        }

        // Idempotence gate. Nothing may be appended or dispatched for a
        // key that is already in the payout log.
        if self.store.is_recorded(&key) {
            debug!(
                target: "settlement_engine::listener",
                fund = %self.fund,
                key = %key,
                "duplicate redemption event, no-op"
            );
            self.stats.duplicates += 1;
            self.set_state(ListenerState::Idle);
            return;
        }

        let record = PayoutRecord::from_event(event);
        match self.persist(record.clone()).await {
            Ok(()) => {
                self.stats.recorded += 1;
            }
            Err(e) if e.is_duplicate() => {
                // Lost a race with another recorder for the same key.
                self.stats.duplicates += 1;
                self.set_state(ListenerState::Idle);
                return;
            }
            Err(e) => {
                error!(
                    target: "settlement_engine::listener",
                    fund = %self.fund,
                    key = %key,
                    error = %e,
                    "failed to record payout, dispatch not attempted"
                );
                self.stats.failures += 1;
                self.set_state(ListenerState::Failed);
                self.set_state(ListenerState::Idle);
                return;
            }
        }

        match execute_with_timeout(self.executor.as_ref(), &record, self.dispatch_timeout)
            .await
        {
            Ok(()) => {
                self.finish_dispatch(key, DispatchStatus::Dispatched, "PAYOUT_DISPATCHED")
                    .await;
                self.stats.dispatched += 1;
                self.set_state(ListenerState::Recorded);
            }
            Err(e) => {
                warn!(
                    target: "settlement_engine::listener",
                    fund = %self.fund,
                    key = %key,
                    error = %e,
                    "payout dispatch failed, record kept for reconciliation"
                );
                self.finish_dispatch(
                    key,
                    DispatchStatus::Failed {
                        reason: e.to_string(),
                    },
                    "PAYOUT_DISPATCH_FAILED",
                )
                .await;
                self.stats.failures += 1;
                self.set_state(ListenerState::Failed);
            }
        }
        self.set_state(ListenerState::Idle);
    }

    /// Durably record the payout and its audit event, off the async path.
    async fn persist(&self, record: PayoutRecord) -> Result<()> {
        let store = Arc::clone(&self.store);
        let audit = Arc::clone(&self.audit);
        tokio::task::spawn_blocking(move || -> Result<()> {
            store.record(&record)?;
            audit.append(ACTOR, "PAYOUT_RECORDED", serde_json::to_value(&record)?)?;
            Ok(())
        })
        .await
        .map_err(|e| Error::Audit(format!("persist task panicked: {e}")))?
    }

    /// Append the dispatch outcome to the payout log and audit trail.
    ///
    /// The payout itself is already durable; bookkeeping failures here
    /// are logged and swallowed so the listener keeps running.
    async fn finish_dispatch(
        &self,
        key: crate::types::PayoutKey,
        status: DispatchStatus,
        audit_type: &'static str,
    ) {
        let store = Arc::clone(&self.store);
        let audit = Arc::clone(&self.audit);
        let fund = self.fund;
        let result = tokio::task::spawn_blocking(move || -> Result<()> {
            store.set_dispatch_status(key, status.clone())?;
            audit.append(
                ACTOR,
                audit_type,
                serde_json::json!({ "key": key, "status": status }),
            )?;
            Ok(())
        })
        .await;

        match result {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(
                target: "settlement_engine::listener",
                fund = %fund,
                key = %key,
                error = %e,
                "failed to persist dispatch outcome"
            ),
            Err(e) => error!(
                target: "settlement_engine::listener",
                fund = %fund,
                key = %key,
                error = %e,
                "dispatch bookkeeping task panicked"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::{Address, B256, U256};
    use async_trait::async_trait;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicU64, Ordering};

    /// Executor that counts invocations and optionally fails.
    struct CountingExecutor {
        calls: Arc<AtomicU64>,
        fail: bool,
    }

    #[async_trait]
    impl PayoutExecutor for CountingExecutor {
        async fn execute(&self, _record: &PayoutRecord) -> Result<(), crate::errors::DispatchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(crate::errors::DispatchError::Execution(
                    "ledger offline".to_string(),
                ))
            } else {
                Ok(())
            }
        }
    }

    fn test_config() -> Config {
        Config {
            rpc_url: "http://localhost:8545".to_string(),
            fund_addresses: BTreeMap::new(),
            payout_log: "/tmp/unused".into(),
            audit_dir: "/tmp/unused".into(),
            revenue_dir: "/tmp/unused".into(),
            risk_dir: "/tmp/unused".into(),
            queue_capacity: 16,
            dispatch_timeout: Duration::from_secs(5),
        }
    }

    fn event(fund: FundKey, period_id: u64, tx_byte: u8) -> RedemptionOnChainEvent {
        RedemptionOnChainEvent {
            fund_key: fund,
            holder: Address::repeat_byte(1),
            period_id,
            amount_tokens: U256::from(500u64),
            nav_per_token: U256::from(22u64),
            gross_value: U256::from(11_000u64),
            penalty_amount: U256::from(100u64),
            liquidity_fee_amount: U256::from(50u64),
            discount_amount: U256::ZERO,
            net_payout: U256::from(10_850u64),
            event_timestamp: 1_735_689_600,
            tx_hash: B256::repeat_byte(tx_byte),
        }
    }

    struct Harness {
        _tmp: tempfile::TempDir,
        audit: Arc<AuditTrail>,
        store: Arc<PayoutStore>,
        calls: Arc<AtomicU64>,
        state: watch::Receiver<ListenerState>,
        tx: mpsc::Sender<RedemptionOnChainEvent>,
        shutdown_tx: watch::Sender<bool>,
        handle: Option<JoinHandle<ListenerStats>>,
    }

    fn start(fund: FundKey, fail: bool) -> Harness {
        let tmp = tempfile::tempdir().unwrap();
        let audit = Arc::new(AuditTrail::new(tmp.path().join("audits")).unwrap());
        let store = Arc::new(PayoutStore::open(tmp.path().join("payouts.jsonl")).unwrap());
        let calls = Arc::new(AtomicU64::new(0));
        let executor = Arc::new(CountingExecutor {
            calls: Arc::clone(&calls),
            fail,
        });
        let listener = FundListener::new(
            fund,
            &test_config(),
            Arc::clone(&audit),
            Arc::clone(&store),
            executor,
        );
        let state = listener.state();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (tx, handle) = listener.spawn(16, shutdown_rx);
        Harness {
            _tmp: tmp,
            audit,
            store,
            calls,
            state,
            tx,
            shutdown_tx,
            handle: Some(handle),
        }
    }

    impl Harness {
        // Takes `&mut self` so the tempdir stays alive for assertions
        // that read the audit trail after shutdown.
        async fn finish(&mut self) -> ListenerStats {
            self.shutdown_tx.send(true).unwrap();
            self.handle.take().unwrap().await.unwrap()
        }
    }

    #[tokio::test]
    async fn duplicate_event_is_idempotent() {
        let mut h = start(FundKey::I, false);

        // Same identity key, different delivery timestamps.
        let mut first = event(FundKey::I, 1, 7);
        let mut second = first.clone();
        first.event_timestamp = 100;
        second.event_timestamp = 200;

        h.tx.send(first).await.unwrap();
        h.tx.send(second).await.unwrap();
        // Give the worker time to drain before signalling shutdown.
        tokio::time::sleep(Duration::from_millis(200)).await;

        let stats = h.finish().await;

        assert_eq!(stats.recorded, 1);
        assert_eq!(stats.duplicates, 1);
        assert_eq!(h.store.len(), 1);
        assert_eq!(h.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn distinct_keys_all_processed() {
        let mut h = start(FundKey::I, false);

        h.tx.send(event(FundKey::I, 1, 7)).await.unwrap();
        h.tx.send(event(FundKey::I, 2, 7)).await.unwrap(); // same tx, new period
        h.tx.send(event(FundKey::I, 1, 8)).await.unwrap(); // new tx
        tokio::time::sleep(Duration::from_millis(200)).await;

        let stats = h.finish().await;

        assert_eq!(stats.recorded, 3);
        assert_eq!(stats.dispatched, 3);
        assert_eq!(h.store.len(), 3);
        assert!(h.store.undispatched().is_empty());
    }

    #[tokio::test]
    async fn dispatch_failure_keeps_record_and_continues() {
        let mut h = start(FundKey::I, true);

        h.tx.send(event(FundKey::I, 1, 7)).await.unwrap();
        h.tx.send(event(FundKey::I, 2, 7)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let stats = h.finish().await;

        // Both events recorded before their dispatch failed.
        assert_eq!(stats.recorded, 2);
        assert_eq!(stats.dispatched, 0);
        assert_eq!(stats.failures, 2);
        assert_eq!(h.store.undispatched().len(), 2);

        let events = h.audit.read(chrono::Utc::now().date_naive()).unwrap();
        let failed: Vec<_> = events
            .iter()
            .filter(|e| e.event_type == "PAYOUT_DISPATCH_FAILED")
            .collect();
        assert_eq!(failed.len(), 2);
    }

    #[tokio::test]
    async fn wrong_fund_event_dropped() {
        let mut h = start(FundKey::II, false);

        h.tx.send(event(FundKey::I, 1, 7)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        let stats = h.finish().await;

        assert_eq!(stats.failures, 1);
        assert_eq!(h.store.len(), 0);
    }

    #[tokio::test]
    async fn shutdown_resolves_with_stats() {
        let mut h = start(FundKey::I, false);
        h.tx.send(event(FundKey::I, 1, 7)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        let stats = h.finish().await;
        assert_eq!(stats.recorded, 1);
    }

    #[tokio::test]
    async fn state_is_observable_across_the_lifecycle() {
        let mut h = start(FundKey::I, false);

        // Spawn flips Idle to Listening.
        h.state.changed().await.unwrap();
        assert_eq!(*h.state.borrow_and_update(), ListenerState::Listening);

        // After an event the worker settles back on Idle.
        h.tx.send(event(FundKey::I, 1, 7)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(*h.state.borrow_and_update(), ListenerState::Idle);

        let stats = h.finish().await;
        assert_eq!(stats.recorded, 1);
        assert_eq!(*h.state.borrow(), ListenerState::Idle);
    }
}
