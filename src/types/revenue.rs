//! Fund identity and revenue record types.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::Error;

/// Identifier of a redemption fund.
///
/// The fund roster is fixed (I through IV); each fund optionally carries
/// an on-chain redemption contract address in the configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize)]
pub enum FundKey {
    I,
    II,
    III,
    IV,
}

impl FundKey {
    /// All configured fund keys, in roster order.
    pub const ALL: [FundKey; 4] = [FundKey::I, FundKey::II, FundKey::III, FundKey::IV];

    /// Label used in revenue file names, e.g. `fundI`.
    pub fn business_label(&self) -> String {
        format!("fund{self}")
    }
}

impl fmt::Display for FundKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FundKey::I => "I",
            FundKey::II => "II",
            FundKey::III => "III",
            FundKey::IV => "IV",
        };
        f.write_str(s)
    }
}

impl FromStr for FundKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "I" => Ok(FundKey::I),
            "II" => Ok(FundKey::II),
            "III" => Ok(FundKey::III),
            "IV" => Ok(FundKey::IV),
            other => Err(Error::UnknownFund {
                key: other.to_string(),
            }),
        }
    }
}

/// One month of canonical revenue data for a fund.
///
/// Immutable once ingested; exactly one record exists per (fund, period).
/// Currency is carried as integer cents so that averaging and the final
/// fixed-point scaling never touch floating point.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct RevenueRecord {
    /// Owning fund.
    pub fund_key: FundKey,
    /// Period label, `YYYY-MM`. Lexicographic order is chronological.
    pub period: String,
    /// Net revenue for the period, in cents.
    pub net_revenue_cents: i64,
    /// Basis points of net revenue allocated to token holders (0..=10000).
    pub tokenized_percent_bps: u32,
}

impl RevenueRecord {
    /// Structural validation applied at the ingestion boundary.
    pub fn validate(&self) -> Result<(), Error> {
        if self.period.is_empty() {
            return Err(Error::Validation(format!(
                "revenue record for fund {} has an empty period label",
                self.fund_key
            )));
        }
        if self.tokenized_percent_bps > 10_000 {
            return Err(Error::Validation(format!(
                "tokenizedPercentBps {} out of range for fund {} period {}",
                self.tokenized_percent_bps, self.fund_key, self.period
            )));
        }
        if self.net_revenue_cents < 0 {
            return Err(Error::Validation(format!(
                "negative netRevenue for fund {} period {}",
                self.fund_key, self.period
            )));
        }
        Ok(())
    }
}

/// Convert a decimal currency amount to cents.
///
/// Rounds half away from zero; this is the only place a floating-point
/// revenue figure crosses into the integer domain.
pub fn decimal_to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fund_key_round_trip() {
        for key in FundKey::ALL {
            let parsed: FundKey = key.to_string().parse().unwrap();
            assert_eq!(parsed, key);
        }
    }

    #[test]
    fn unknown_fund_key_rejected() {
        let err = "V".parse::<FundKey>().unwrap_err();
        assert!(matches!(err, Error::UnknownFund { .. }));
    }

    #[test]
    fn business_label() {
        assert_eq!(FundKey::II.business_label(), "fundII");
    }

    #[test]
    fn decimal_to_cents_rounds() {
        assert_eq!(decimal_to_cents(136600.0), 13_660_000);
        assert_eq!(decimal_to_cents(0.005), 1);
        assert_eq!(decimal_to_cents(99.994), 9999);
    }

    #[test]
    fn validate_rejects_out_of_range_bps() {
        let record = RevenueRecord {
            fund_key: FundKey::I,
            period: "2025-01".to_string(),
            net_revenue_cents: 100,
            tokenized_percent_bps: 10_001,
        };
        assert!(record.validate().is_err());
    }
}
