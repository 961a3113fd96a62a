//! NAV, risk adjustment, and settlement record types.

use std::collections::BTreeMap;

use alloy::primitives::U256;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::FundKey;
use crate::serde_utils::u256_decimal;

/// Fixed-point scale for NAV and settlement amounts (1e18, on-chain units).
pub fn nav_scale() -> U256 {
    U256::from(10u64).pow(U256::from(18u64))
}

/// A computed NAV-per-token for a fund.
///
/// Derived on demand from the trailing revenue window; never persisted on
/// its own and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NavSnapshot {
    pub fund_key: FundKey,
    /// Requested trailing window length in months.
    pub window_months: u32,
    /// Number of records actually averaged (<= window_months for partial windows).
    pub records_used: u32,
    /// NAV per token, scaled 1e18.
    #[serde(with = "u256_decimal")]
    pub nav_per_token: U256,
    pub computed_at: DateTime<Utc>,
}

/// Risk-exposure profile for a business.
///
/// Lookup returns `Option<RiskProfile>`; a business with no profile on
/// file is a valid, neutral case.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskProfile {
    pub business_id: String,
    /// Named metric -> value, e.g. `revenueVolatility`, `industryRiskTier`.
    #[serde(default)]
    pub risk_factors: BTreeMap<String, f64>,
}

/// Deterministic insurance risk adjustment.
///
/// Pure function output with no identity; never persisted on its own.
/// The multiplier is carried in basis points so the terminal multiply
/// stays in integer math.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InsuranceAdjustment {
    pub risk_score: u32,
    /// Adjustment multiplier in basis points, always in [8500, 10000].
    pub multiplier_bps: u32,
    /// Copy of the factors the score was derived from.
    pub factors: BTreeMap<String, f64>,
}

impl InsuranceAdjustment {
    /// Neutral adjustment (no profile on file).
    pub fn neutral() -> Self {
        Self {
            risk_score: 0,
            multiplier_bps: 10_000,
            factors: BTreeMap::new(),
        }
    }

    /// Multiplier as a decimal, for operator-facing output.
    pub fn multiplier(&self) -> f64 {
        self.multiplier_bps as f64 / 10_000.0
    }

    /// Apply the multiplier to a terminal payable value (floor division).
    pub fn apply(&self, value: U256) -> U256 {
        value * U256::from(self.multiplier_bps) / U256::from(10_000u64)
    }
}

/// Redemption terms computed by the fund's contract.
///
/// Opaque to this engine: penalties, fees, and discounts are the
/// contract's business. All amounts are 1e18-scaled settlement currency.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionTerms {
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
}

/// Finalized settlement of one redemption request.
///
/// Created once per request, immutable after creation, persisted via the
/// audit trail by the caller.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettlementRecord {
    pub business_id: String,
    pub fund_key: FundKey,
    pub nav: NavSnapshot,
    #[serde(with = "u256_decimal")]
    pub token_amount: U256,
    pub redemption_terms: RedemptionTerms,
    pub insurance_adjustment: InsuranceAdjustment,
    /// `redemption_terms.net_payout` after the insurance multiplier.
    #[serde(with = "u256_decimal")]
    pub adjusted_redemption_value: U256,
    pub timestamp: DateTime<Utc>,
}
