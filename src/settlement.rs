//! Redemption settlement orchestration.
//!
//! Combines NAV, contract-computed redemption terms, and the insurance
//! adjustment into a finalized settlement record. Persistence is the
//! caller's responsibility (typically an immediate audit append).

use std::sync::Arc;

use alloy::primitives::U256;
use chrono::Utc;
use tracing::info;

use crate::config::Config;
use crate::insurance::{compute_adjustment, RiskProfileSource};
use crate::nav::NavEngine;
use crate::prelude::*;
use crate::types::{FundKey, RedemptionTerms, SettlementRecord};

/// Trailing revenue window used for NAV unless the caller overrides it.
pub const DEFAULT_NAV_WINDOW_MONTHS: u32 = 3;

/// The fund's redemption contract, treated as a black box.
///
/// Penalty, fee, and discount policy live on-chain; this engine only
/// passes NAV and a token amount in and carries the terms through.
pub trait RedemptionContract: Send + Sync {
    /// Current total token supply of the fund.
    fn total_supply(&self, fund: FundKey) -> Result<U256>;

    /// Compute redemption terms for `token_amount` tokens at `nav_per_token`.
    fn compute_terms(
        &self,
        fund: FundKey,
        nav_per_token: U256,
        token_amount: U256,
    ) -> Result<RedemptionTerms>;
}

/// Orchestrates one redemption settlement end to end.
pub struct SettlementOrchestrator {
    config: Arc<Config>,
    nav_engine: NavEngine,
    risk_source: Arc<dyn RiskProfileSource>,
    contract: Arc<dyn RedemptionContract>,
    window_months: u32,
}

impl SettlementOrchestrator {
    pub fn new(
        config: Arc<Config>,
        nav_engine: NavEngine,
        risk_source: Arc<dyn RiskProfileSource>,
        contract: Arc<dyn RedemptionContract>,
    ) -> Self {
        Self {
            config,
            nav_engine,
            risk_source,
            contract,
            window_months: DEFAULT_NAV_WINDOW_MONTHS,
        }
    }

    /// Override the trailing NAV window.
    pub fn with_window_months(mut self, window_months: u32) -> Self {
        self.window_months = window_months;
        self
    }

    /// Settle a redemption request.
    ///
    /// Fails with `UnknownFund` when the fund has no configured contract
    /// address. NavEngine and contract failures propagate unchanged; the
    /// insurance multiplier applies to the terminal `net_payout` only,
    /// never to individual penalty/fee/discount components.
    pub fn settle(
        &self,
        business_id: &str,
        fund: FundKey,
        token_amount: U256,
    ) -> Result<SettlementRecord> {
        // Configuration gate first: an unconfigured fund is a request
        // error regardless of what revenue data exists.
        self.config.fund_address(fund)?;

        let total_supply = self.contract.total_supply(fund)?;
        let nav = self
            .nav_engine
            .compute_nav(fund, self.window_months, total_supply)?;

        let terms = self
            .contract
            .compute_terms(fund, nav.nav_per_token, token_amount)?;

        let profile = self.risk_source.lookup(business_id)?;
        let adjustment = compute_adjustment(profile.as_ref());
        let adjusted_redemption_value = adjustment.apply(terms.net_payout);

        info!(
            target: "settlement_engine::settlement",
            business_id,
            fund = %fund,
            nav_per_token = %nav.nav_per_token,
            net_payout = %terms.net_payout,
            risk_score = adjustment.risk_score,
            multiplier_bps = adjustment.multiplier_bps,
            adjusted = %adjusted_redemption_value,
            "settlement computed"
        );

        Ok(SettlementRecord {
            business_id: business_id.to_string(),
            fund_key: fund,
            nav,
            token_amount,
            redemption_terms: terms,
            insurance_adjustment: adjustment,
            adjusted_redemption_value,
            timestamp: Utc::now(),
        })
    }
}
