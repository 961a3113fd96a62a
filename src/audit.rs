//! Append-only, date-partitioned audit trail.
//!
//! Every settlement-affecting action lands here as one JSON line in
//! `<dir>/YYYY-MM-DD.jsonl`. Lines are only ever appended; no update or
//! delete operation exists. Retained for reconciliation and future
//! cryptographic notarization.

use std::fs::{self, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::sync::Mutex;

use chrono::{NaiveDate, Utc};
use tracing::debug;
use uuid::Uuid;

use crate::prelude::*;
use crate::types::AuditEvent;

/// Append-only audit event store.
///
/// Appends across all callers are serialized by a single mutex so no two
/// events interleave mid-line and none are lost. Reads take no lock:
/// appended lines are complete before the lock is released.
pub struct AuditTrail {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl AuditTrail {
    /// Open (creating if needed) an audit trail rooted at `dir`.
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    /// Append one event, assigning a fresh id and the current timestamp.
    ///
    /// The partition is the UTC date of the assigned timestamp. Returns
    /// the constructed event; a failure here must abort whatever action
    /// was being recorded.
    pub fn append(
        &self,
        actor: &str,
        event_type: &str,
        event_data: serde_json::Value,
    ) -> Result<AuditEvent> {
        let event = AuditEvent {
            event_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            actor: actor.to_string(),
            event_type: event_type.to_string(),
            event_data,
            signature: None,
        };

        let path = self.partition_path(event.timestamp.date_naive());
        let line = serde_json::to_string(&event)?;

        {
            let _guard = self
                .write_lock
                .lock()
                .map_err(|_| Error::Audit("audit write lock poisoned".to_string()))?;
            let mut file = OpenOptions::new().create(true).append(true).open(&path)?;
            file.write_all(line.as_bytes())?;
            file.write_all(b"\n")?;
        }

        debug!(
            target: "settlement_engine::audit",
            event_id = %event.event_id,
            event_type,
            actor,
            "audit event appended"
        );
        Ok(event)
    }

    /// Read all events of one date partition, in append order.
    ///
    /// A partition that was never written reads as empty. Out of the hot
    /// path; used for reconciliation.
    pub fn read(&self, date: NaiveDate) -> Result<Vec<AuditEvent>> {
        let path = self.partition_path(date);
        let file = match fs::File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut events = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            events.push(serde_json::from_str(&line)?);
        }
        Ok(events)
    }

    fn partition_path(&self, date: NaiveDate) -> PathBuf {
        self.dir.join(format!("{}.jsonl", date.format("%Y-%m-%d")))
    }
}
