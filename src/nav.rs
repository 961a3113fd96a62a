//! NAV-per-token computation from trailing revenue windows.

use std::sync::Arc;

use alloy::primitives::U256;
use chrono::Utc;
use tracing::{debug, warn};

use crate::errors::NavError;
use crate::prelude::*;
use crate::revenue::RevenueStore;
use crate::types::{nav_scale, FundKey, NavSnapshot, RevenueRecord};

/// Computes a fixed-point NAV-per-token for a fund.
///
/// Pure read-and-compute over the revenue store; holds no state of its own
/// and produces identical snapshots for identical inputs.
pub struct NavEngine {
    store: Arc<dyn RevenueStore>,
}

impl NavEngine {
    pub fn new(store: Arc<dyn RevenueStore>) -> Self {
        Self { store }
    }

    /// Compute NAV per token over up to `window_months` trailing records.
    ///
    /// Records that fail structural validation are skipped without
    /// consuming a window slot; if none survive, the window is
    /// insufficient. Partial windows are averaged over however many
    /// usable records were found, not over `window_months`. The tokenized
    /// percentage is taken from the single most-recent selected record
    /// only: it reflects the current revenue-sharing structure, not
    /// history.
    ///
    /// The final scaling runs as one integer expression,
    /// `sum_cents * bps * 1e18 / (10_000 * n * 100 * total_supply)`,
    /// with floor division. No floating point touches the result.
    pub fn compute_nav(
        &self,
        fund: FundKey,
        window_months: u32,
        total_supply: U256,
    ) -> Result<NavSnapshot> {
        if window_months == 0 {
            return Err(NavError::EmptyWindow.into());
        }
        if total_supply.is_zero() {
            return Err(NavError::ZeroSupply { fund }.into());
        }

        let mut records = self.store.records_for_fund(fund)?;
        if records.is_empty() {
            return Err(NavError::NoData { fund }.into());
        }

        // Period labels are YYYY-MM, so lexicographic sort is chronological.
        records.sort_by(|a, b| b.period.cmp(&a.period));
        let selected: Vec<&RevenueRecord> = records
            .iter()
            .filter(|r| match r.validate() {
                Ok(()) => true,
                Err(e) => {
                    warn!(
                        target: "settlement_engine::nav",
                        fund = %fund,
                        period = %r.period,
                        error = %e,
                        "skipping unusable revenue record"
                    );
                    false
                }
            })
            .take(window_months as usize)
            .collect();
        if selected.is_empty() {
            return Err(NavError::InsufficientWindow {
                fund,
                window_months,
            }
            .into());
        }

        // Every selected record passed validation, so the sum is >= 0.
        let sum_cents: i128 = selected
            .iter()
            .map(|r| r.net_revenue_cents as i128)
            .sum::<i128>();
        let records_used = selected.len() as u32;
        let latest_bps = selected[0].tokenized_percent_bps;

        let numerator =
            U256::from(sum_cents as u128) * U256::from(latest_bps) * nav_scale();
        let denominator =
            U256::from(10_000u64 * records_used as u64 * 100) * total_supply;
        let nav_per_token = numerator / denominator;

        debug!(
            target: "settlement_engine::nav",
            fund = %fund,
            records_used,
            latest_bps,
            nav_per_token = %nav_per_token,
            "computed NAV"
        );

        Ok(NavSnapshot {
            fund_key: fund,
            window_months,
            records_used,
            nav_per_token,
            computed_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::revenue::InMemoryRevenueStore;

    fn record(period: &str, dollars: i64, bps: u32) -> RevenueRecord {
        RevenueRecord {
            fund_key: FundKey::I,
            period: period.to_string(),
            net_revenue_cents: dollars * 100,
            tokenized_percent_bps: bps,
        }
    }

    fn engine(records: Vec<RevenueRecord>) -> NavEngine {
        NavEngine::new(Arc::new(InMemoryRevenueStore::new(records)))
    }

    #[test]
    fn worked_example_is_exact() {
        // Two months at 100k and 120k, 20% tokenized, 1M tokens:
        // avg 110k -> portion 22k -> nav = 22000 * 1e18 / 1_000_000.
        let engine = engine(vec![
            record("2025-01", 100_000, 1500),
            record("2025-02", 120_000, 2000),
        ]);
        let snapshot = engine
            .compute_nav(FundKey::I, 3, U256::from(1_000_000u64))
            .unwrap();

        let expected = U256::from(22u64) * nav_scale() / U256::from(1000u64);
        assert_eq!(snapshot.nav_per_token, expected);
        assert_eq!(snapshot.records_used, 2);
    }

    #[test]
    fn deterministic_for_identical_inputs() {
        let records = vec![
            record("2025-01", 100_000, 2000),
            record("2025-02", 120_000, 2000),
            record("2025-03", 90_000, 2000),
        ];
        let a = engine(records.clone())
            .compute_nav(FundKey::I, 2, U256::from(777_777u64))
            .unwrap();
        let b = engine(records)
            .compute_nav(FundKey::I, 2, U256::from(777_777u64))
            .unwrap();
        assert_eq!(a.nav_per_token, b.nav_per_token);
    }

    #[test]
    fn zero_supply_fails() {
        let engine = engine(vec![record("2025-01", 100_000, 2000)]);
        let err = engine.compute_nav(FundKey::I, 3, U256::ZERO).unwrap_err();
        assert!(matches!(
            err,
            Error::Nav(NavError::ZeroSupply { fund: FundKey::I })
        ));
    }

    #[test]
    fn no_data_fails() {
        let engine = engine(vec![]);
        let err = engine
            .compute_nav(FundKey::I, 3, U256::from(1u64))
            .unwrap_err();
        assert!(matches!(err, Error::Nav(NavError::NoData { .. })));
    }

    #[test]
    fn empty_window_fails() {
        let engine = engine(vec![record("2025-01", 100_000, 2000)]);
        let err = engine
            .compute_nav(FundKey::I, 0, U256::from(1u64))
            .unwrap_err();
        assert!(matches!(err, Error::Nav(NavError::EmptyWindow)));
    }

    #[test]
    fn all_records_unusable_is_insufficient_window() {
        // Records exist for the fund, but none survive validation.
        let engine = engine(vec![
            record("2025-01", -5_000, 2000),
            record("2025-02", 100_000, 20_000),
        ]);
        let err = engine
            .compute_nav(FundKey::I, 3, U256::from(1u64))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Nav(NavError::InsufficientWindow {
                fund: FundKey::I,
                window_months: 3,
            })
        ));
    }

    #[test]
    fn unusable_records_do_not_consume_window_slots() {
        // The corrupt 2025-03 record is skipped; the window of 2 still
        // averages the two usable months.
        let engine = engine(vec![
            record("2025-01", 100_000, 2000),
            record("2025-02", 120_000, 2000),
            record("2025-03", -1, 2000),
        ]);
        let snapshot = engine
            .compute_nav(FundKey::I, 2, U256::from(1_000_000u64))
            .unwrap();
        let expected = U256::from(22u64) * nav_scale() / U256::from(1000u64);
        assert_eq!(snapshot.nav_per_token, expected);
        assert_eq!(snapshot.records_used, 2);
    }

    #[test]
    fn window_takes_most_recent_records() {
        // Window of 2 must use 2025-03 and 2025-02 only.
        let engine = engine(vec![
            record("2025-01", 1_000_000, 2000),
            record("2025-02", 100_000, 2000),
            record("2025-03", 120_000, 2000),
        ]);
        let snapshot = engine
            .compute_nav(FundKey::I, 2, U256::from(1_000_000u64))
            .unwrap();
        let expected = U256::from(22u64) * nav_scale() / U256::from(1000u64);
        assert_eq!(snapshot.nav_per_token, expected);
    }

    #[test]
    fn bps_taken_from_latest_record_only() {
        // Older record has a wildly different bps; only the latest counts.
        let engine = engine(vec![
            record("2025-01", 100_000, 9000),
            record("2025-02", 120_000, 2000),
        ]);
        let snapshot = engine
            .compute_nav(FundKey::I, 3, U256::from(1_000_000u64))
            .unwrap();
        let expected = U256::from(22u64) * nav_scale() / U256::from(1000u64);
        assert_eq!(snapshot.nav_per_token, expected);
    }

    #[test]
    fn partial_window_averages_over_found_records() {
        // One record, window of 6: average over 1, not 6.
        let engine = engine(vec![record("2025-01", 100_000, 2000)]);
        let snapshot = engine
            .compute_nav(FundKey::I, 6, U256::from(1_000_000u64))
            .unwrap();
        // portion = 20000 -> nav = 20000 * 1e18 / 1e6
        let expected = U256::from(20u64) * nav_scale() / U256::from(1000u64);
        assert_eq!(snapshot.nav_per_token, expected);
        assert_eq!(snapshot.records_used, 1);
        assert_eq!(snapshot.window_months, 6);
    }
}
