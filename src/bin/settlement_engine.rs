//! Settlement engine daemon.
//!
//! Spawns one redemption-event listener per configured fund, records and
//! dispatches payouts, and shuts down cleanly on ctrl-c. The chain
//! transport pushes events into the listeners' queues; `--events` replays
//! a captured JSONL event file instead (reconciliation / dry runs).

use std::collections::HashMap;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use settlement_engine::{
    AuditTrail, ChainEventSource, Config, FileEventSource, FundListener,
    LoggingPayoutExecutor, PayoutStore,
};

#[derive(Parser)]
#[command(name = "settlement_engine")]
#[command(version, about = "Redemption settlement engine daemon", long_about = None)]
struct Cli {
    /// Replay a JSONL file of captured redemption events instead of
    /// attaching the live chain transport
    #[arg(long)]
    events: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

async fn run(cli: Cli) -> Result<(), settlement_engine::Error> {
    let config = Arc::new(Config::from_env()?);

    let funds = config.subscribed_funds();
    if funds.is_empty() {
        return Err(settlement_engine::Error::Config(
            "no fund addresses configured, nothing to subscribe".to_string(),
        ));
    }

    let audit = Arc::new(AuditTrail::new(config.audit_dir.clone())?);
    let store = Arc::new(PayoutStore::open(config.payout_log.clone())?);
    let executor = Arc::new(LoggingPayoutExecutor);

    info!(
        rpc = %config.rpc_url,
        payout_log = %store.path().display(),
        recovered = store.len(),
        "settlement engine starting"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut senders = HashMap::new();
    let mut handles = Vec::new();

    for fund in funds {
        let address = config.fund_address(fund)?;
        info!(fund = %fund, address = %address, "listening for RedemptionProcessed");

        let listener = FundListener::new(
            fund,
            &config,
            Arc::clone(&audit),
            Arc::clone(&store),
            Arc::clone(&executor) as Arc<dyn settlement_engine::PayoutExecutor>,
        );
        let (tx, handle) = listener.spawn(config.queue_capacity, shutdown_rx.clone());
        senders.insert(fund, tx);
        handles.push((fund, handle));
    }

    if let Some(path) = cli.events {
        // Replay mode: dropping the senders after the replay lets each
        // listener drain its queue fully and exit on channel close.
        let source = FileEventSource::new(path);
        source.run(senders).await?;
    } else {
        // The live transport (an external integration) owns these
        // senders; here we only hold the subscriptions open.
        let _senders = senders;
        tokio::signal::ctrl_c()
            .await
            .map_err(settlement_engine::Error::Storage)?;
        info!("ctrl-c received, shutting down");
        let _ = shutdown_tx.send(true);
    }

    for (fund, handle) in handles {
        match handle.await {
            Ok(stats) => info!(
                fund = %fund,
                recorded = stats.recorded,
                dispatched = stats.dispatched,
                duplicates = stats.duplicates,
                failures = stats.failures,
                "listener drained"
            ),
            Err(e) => error!(fund = %fund, error = %e, "listener task panicked"),
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let requested = matches!(
                e.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            );
            let _ = e.print();
            return ExitCode::from(if requested { 0 } else { 1 });
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.clone())),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("fatal: {e}");
            eprintln!("error: {e}");
            ExitCode::from(1)
        }
    }
}
