//! Deterministic insurance risk adjustment.
//!
//! Scores a business's risk-exposure profile and converts the score into
//! a redemption-value multiplier. Intentionally simple; structured so the
//! insurance vertical can grow it into a full underwriting model.

use std::fs;
use std::path::PathBuf;

use crate::prelude::*;
use crate::types::{InsuranceAdjustment, RiskProfile};

/// Factor names recognized by the scoring rules.
const FACTOR_REVENUE_VOLATILITY: &str = "revenueVolatility";
const FACTOR_INDUSTRY_RISK_TIER: &str = "industryRiskTier";

/// Source of per-business risk profiles.
///
/// A business with no profile on file is a valid state and must surface
/// as `Ok(None)`, never as an error or an ambient file-existence check by
/// the caller.
pub trait RiskProfileSource: Send + Sync {
    fn lookup(&self, business_id: &str) -> Result<Option<RiskProfile>>;
}

/// Compute the insurance adjustment for an optional risk profile.
///
/// Deterministic scoring rules:
/// - `revenueVolatility`: > 0.20 adds 3, > 0.10 adds 2, > 0.05 adds 1.
/// - `industryRiskTier`: added directly (truncated, floored at zero).
///
/// The multiplier is `max(0.85, 1.0 - 0.02 * riskScore)`, carried in
/// basis points. No profile yields the neutral adjustment (exactly 1.0).
/// Score arithmetic saturates, so an absurd tier in an uploaded profile
/// lands on the 0.85 floor instead of wrapping.
pub fn compute_adjustment(profile: Option<&RiskProfile>) -> InsuranceAdjustment {
    let profile = match profile {
        Some(p) => p,
        None => return InsuranceAdjustment::neutral(),
    };

    let mut risk_score: u32 = 0;

    if let Some(&volatility) = profile.risk_factors.get(FACTOR_REVENUE_VOLATILITY) {
        if volatility > 0.20 {
            risk_score += 3;
        } else if volatility > 0.10 {
            risk_score += 2;
        } else if volatility > 0.05 {
            risk_score += 1;
        }
    }

    if let Some(&tier) = profile.risk_factors.get(FACTOR_INDUSTRY_RISK_TIER) {
        if tier > 0.0 {
            risk_score = risk_score.saturating_add(tier as u32);
        }
    }

    let multiplier_bps = 10_000u32
        .saturating_sub(200u32.saturating_mul(risk_score))
        .max(8_500);

    InsuranceAdjustment {
        risk_score,
        multiplier_bps,
        factors: profile.risk_factors.clone(),
    }
}

/// Risk profile source over the business-uploads directory.
///
/// Looks for `<dir>/<business_id>/insurance_exposure.json`; a missing
/// file maps to `Ok(None)` (neutral), a present but malformed file is a
/// validation error.
pub struct DirRiskProfileSource {
    dir: PathBuf,
}

impl DirRiskProfileSource {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl RiskProfileSource for DirRiskProfileSource {
    fn lookup(&self, business_id: &str) -> Result<Option<RiskProfile>> {
        let path = self.dir.join(business_id).join("insurance_exposure.json");
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let profile: RiskProfile = serde_json::from_str(&raw).map_err(|e| {
            Error::Validation(format!(
                "malformed insurance_exposure.json for business {business_id}: {e}"
            ))
        })?;
        Ok(Some(profile))
    }
}

/// In-memory source, for tests and embedded use.
#[derive(Debug, Default)]
pub struct InMemoryRiskProfileSource {
    profiles: Vec<RiskProfile>,
}

impl InMemoryRiskProfileSource {
    pub fn new(profiles: Vec<RiskProfile>) -> Self {
        Self { profiles }
    }
}

impl RiskProfileSource for InMemoryRiskProfileSource {
    fn lookup(&self, business_id: &str) -> Result<Option<RiskProfile>> {
        Ok(self
            .profiles
            .iter()
            .find(|p| p.business_id == business_id)
            .cloned())
    }
}
