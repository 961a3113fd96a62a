//! Read-only access to canonical per-fund monthly revenue records.

use std::fs;
use std::path::PathBuf;

use serde::Deserialize;
use tracing::warn;

use crate::prelude::*;
use crate::types::{decimal_to_cents, FundKey, RevenueRecord};

/// Read-only source of canonical revenue records.
///
/// Ingestion and schema validation happen upstream; implementations only
/// surface whatever records exist for a fund.
pub trait RevenueStore: Send + Sync {
    /// All records for a fund, in no particular order.
    fn records_for_fund(&self, fund: FundKey) -> Result<Vec<RevenueRecord>>;
}

/// On-disk shape of one monthly revenue file.
///
/// Produced by the upstream revenue pipeline; gross/refund/fee breakdowns
/// in the file are not needed here and are ignored.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RevenueFile {
    month: String,
    business_id: String,
    net_revenue: f64,
    #[serde(default)]
    tokenized_percent_bps: u32,
}

/// Revenue store over a directory of JSON files.
///
/// One file per (fund, month), named `fund<KEY>-<YYYY-MM>.json`. The file
/// name carries the fund; the embedded `businessId` must agree or the
/// record is skipped with a warning.
pub struct DirRevenueStore {
    dir: PathBuf,
}

impl DirRevenueStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl RevenueStore for DirRevenueStore {
    fn records_for_fund(&self, fund: FundKey) -> Result<Vec<RevenueRecord>> {
        let label = fund.business_label();
        let mut records = Vec::new();

        let entries = fs::read_dir(&self.dir)?;
        for entry in entries {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if !name.to_lowercase().ends_with(".json") {
                continue;
            }
            // File names are `fundI-2025-01.json`; prefix match keeps
            // `fundI` from also matching `fundII`.
            if !name.starts_with(&format!("{label}-")) {
                continue;
            }

            let raw = fs::read_to_string(entry.path())?;
            let file: RevenueFile = serde_json::from_str(&raw).map_err(|e| {
                Error::Validation(format!("malformed revenue file {name}: {e}"))
            })?;

            if file.business_id != label {
                warn!(
                    target: "settlement_engine::revenue",
                    file = %name,
                    expected = %label,
                    found = %file.business_id,
                    "revenue file businessId disagrees with file name, skipping"
                );
                continue;
            }

            let record = RevenueRecord {
                fund_key: fund,
                period: file.month,
                net_revenue_cents: decimal_to_cents(file.net_revenue),
                tokenized_percent_bps: file.tokenized_percent_bps,
            };
            record.validate()?;
            records.push(record);
        }

        Ok(records)
    }
}

/// In-memory store, for tests and for callers that already hold records.
#[derive(Debug, Default)]
pub struct InMemoryRevenueStore {
    records: Vec<RevenueRecord>,
}

impl InMemoryRevenueStore {
    pub fn new(records: Vec<RevenueRecord>) -> Self {
        Self { records }
    }
}

impl RevenueStore for InMemoryRevenueStore {
    fn records_for_fund(&self, fund: FundKey) -> Result<Vec<RevenueRecord>> {
        Ok(self
            .records
            .iter()
            .filter(|r| r.fund_key == fund)
            .cloned()
            .collect())
    }
}
