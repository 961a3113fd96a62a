//! Event transport seam.
//!
//! The chain subscription itself (RPC endpoint, log decoding, reconnects)
//! is an external collaborator; it only has to push decoded events into
//! each fund's queue. `FileEventSource` is the in-repo implementation,
//! used for replay and reconciliation runs against a captured event file.

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::prelude::*;
use crate::types::{FundKey, RedemptionOnChainEvent};

/// Pushes decoded `RedemptionProcessed` events into per-fund queues.
///
/// Implementations run until their source is exhausted or fails; a full
/// queue applies backpressure through the bounded sender.
#[async_trait]
pub trait ChainEventSource: Send + Sync {
    async fn run(
        &self,
        senders: HashMap<FundKey, mpsc::Sender<RedemptionOnChainEvent>>,
    ) -> Result<()>;
}

/// Replays events from a JSONL capture file.
///
/// One `RedemptionOnChainEvent` per line. Events for funds without a
/// listener are skipped with a warning; a closed queue ends the replay
/// for that fund.
pub struct FileEventSource {
    path: PathBuf,
}

impl FileEventSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl ChainEventSource for FileEventSource {
    async fn run(
        &self,
        senders: HashMap<FundKey, mpsc::Sender<RedemptionOnChainEvent>>,
    ) -> Result<()> {
        let file = File::open(&self.path).await?;
        let mut lines = BufReader::new(file).lines();
        let mut replayed = 0u64;

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let event: RedemptionOnChainEvent = serde_json::from_str(&line)
                .map_err(|e| Error::Validation(format!("bad event line: {e}")))?;

            match senders.get(&event.fund_key) {
                Some(tx) => {
                    if tx.send(event).await.is_err() {
                        // Listener already shut down.
                        break;
                    }
                    replayed += 1;
                }
                None => {
                    warn!(
                        target: "settlement_engine::listener",
                        fund = %event.fund_key,
                        "event for unsubscribed fund, skipping"
                    );
                }
            }
        }

        info!(
            target: "settlement_engine::listener",
            replayed,
            path = %self.path.display(),
            "event replay finished"
        );
        Ok(())
    }
}
