//! Durable payout log.
//!
//! Canonical persisted form of processed redemption events: a JSONL file
//! that is only ever appended. A record line is written before any
//! payout is attempted; dispatch outcomes are appended as status lines so
//! a failed dispatch stays distinguishable from one never attempted,
//! without rewriting any prior line.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::dedup::PayoutDeduplicator;
use crate::prelude::*;
use crate::types::{DispatchStatus, PayoutKey, PayoutRecord};

/// One line of the payout log.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
#[serde(tag = "kind")]
enum LogLine {
    /// A newly recorded payout (dispatch not yet attempted).
    Record(PayoutRecord),
    /// A dispatch outcome for an already recorded payout.
    Status {
        key: PayoutKey,
        #[serde(flatten)]
        status: DispatchStatus,
        at: DateTime<Utc>,
    },
}

struct Inner {
    file: File,
    dedup: PayoutDeduplicator,
    statuses: HashMap<PayoutKey, DispatchStatus>,
}

/// Append-only store of payout records with startup recovery.
///
/// Opening replays the whole log: record lines seed the dedup set, status
/// lines settle each key's latest dispatch outcome. A single mutex
/// serializes appends; no line is ever rewritten.
pub struct PayoutStore {
    path: PathBuf,
    inner: Mutex<Inner>,
}

impl PayoutStore {
    /// Open the payout log at `path`, creating it (and parent dirs) if absent.
    pub fn open(path: PathBuf) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut recovered = Vec::new();
        let mut statuses = HashMap::new();

        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            for line in reader.lines() {
                let line = line?;
                if line.trim().is_empty() {
                    continue;
                }
                match serde_json::from_str::<LogLine>(&line) {
                    Ok(LogLine::Record(record)) => {
                        let key = record.key();
                        recovered.push(key);
                        statuses.insert(key, record.dispatch_status);
                    }
                    Ok(LogLine::Status { key, status, at: _ }) => {
                        statuses.insert(key, status);
                    }
                    Err(e) => {
                        return Err(Error::Validation(format!(
                            "corrupt payout log line in {}: {e}",
                            path.display()
                        )));
                    }
                }
            }
        }

        let dedup = PayoutDeduplicator::seed(recovered.iter().copied());
        if dedup.len() != recovered.len() {
            warn!(
                target: "settlement_engine::payout",
                repeated = recovered.len() - dedup.len(),
                "payout log contains repeated record lines"
            );
        }

        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            inner: Mutex::new(Inner {
                file,
                dedup,
                statuses,
            }),
        })
    }

    /// Is a payout with this identity key already recorded?
    pub fn is_recorded(&self, key: &PayoutKey) -> bool {
        self.lock().dedup.is_duplicate(key)
    }

    /// Durably record a new payout.
    ///
    /// Fails with `DuplicatePayout` if the identity key is already known;
    /// in that case nothing is written.
    pub fn record(&self, record: &PayoutRecord) -> Result<()> {
        let key = record.key();
        let line = serde_json::to_string(&LogLine::Record(record.clone()))?;

        let mut inner = self.lock();
        if inner.dedup.is_duplicate(&key) {
            return Err(Error::DuplicatePayout {
                key: key.to_string(),
            });
        }
        inner.file.write_all(line.as_bytes())?;
        inner.file.write_all(b"\n")?;
        inner.file.flush()?;
        inner.dedup.mark_recorded(key);
        inner
            .statuses
            .insert(key, record.dispatch_status.clone());
        Ok(())
    }

    /// Append a dispatch outcome for an already recorded payout.
    pub fn set_dispatch_status(&self, key: PayoutKey, status: DispatchStatus) -> Result<()> {
        let line = serde_json::to_string(&LogLine::Status {
            key,
            status: status.clone(),
            at: Utc::now(),
        })?;

        let mut inner = self.lock();
        if !inner.dedup.is_duplicate(&key) {
            return Err(Error::Validation(format!(
                "dispatch status for unrecorded payout {key}"
            )));
        }
        inner.file.write_all(line.as_bytes())?;
        inner.file.write_all(b"\n")?;
        inner.file.flush()?;
        inner.statuses.insert(key, status);
        Ok(())
    }

    /// Latest dispatch status for a key, if recorded.
    pub fn dispatch_status(&self, key: &PayoutKey) -> Option<DispatchStatus> {
        self.lock().statuses.get(key).cloned()
    }

    /// Keys whose payout has not been successfully dispatched.
    ///
    /// Input for an out-of-band reconciliation process; retrying one of
    /// these must go through `set_dispatch_status`, never a re-record.
    pub fn undispatched(&self) -> Vec<PayoutKey> {
        self.lock()
            .statuses
            .iter()
            .filter(|(_, status)| !matches!(status, DispatchStatus::Dispatched))
            .map(|(key, _)| *key)
            .collect()
    }

    /// Number of recorded payouts.
    pub fn len(&self) -> usize {
        self.lock().dedup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().dedup.is_empty()
    }

    /// Path of the underlying log file.
    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock means a writer panicked mid-append; the file
        // itself is still line-consistent, so continue with the state.
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
