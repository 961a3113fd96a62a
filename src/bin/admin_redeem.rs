//! Administrative redemption processing.
//!
//! Computes NAV for a fund, obtains redemption terms, applies the
//! insurance risk adjustment, writes the audit snapshot, and prints a
//! settlement summary for the operator.

use std::process::ExitCode;
use std::sync::Arc;

use alloy::primitives::U256;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use settlement_engine::{
    AuditTrail, Config, DirRevenueStore, DirRiskProfileSource, FundKey, NavEngine,
    RedemptionContract, RedemptionTerms, SettlementOrchestrator, SettlementRecord,
    DEFAULT_NAV_WINDOW_MONTHS,
};

#[derive(Parser)]
#[command(name = "admin_redeem")]
#[command(version, about = "Process a fund redemption administratively", long_about = None)]
struct Cli {
    /// Business whose risk profile applies
    business_id: String,

    /// Fund key: I, II, III or IV
    fund_key: String,

    /// Token amount to redeem (integer token units)
    #[arg(value_parser = parse_u256)]
    token_amount: U256,

    /// Total token supply of the fund
    #[arg(long, value_parser = parse_u256)]
    total_supply: U256,

    /// Trailing revenue window in months
    #[arg(long, default_value_t = DEFAULT_NAV_WINDOW_MONTHS)]
    window_months: u32,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn")]
    log_level: String,
}

fn parse_u256(raw: &str) -> Result<U256, String> {
    raw.parse::<U256>()
        .map_err(|e| format!("invalid amount \"{raw}\": {e}"))
}

/// Terms collaborator used for administrative runs.
///
/// The production terms computation lives on the fund contract and is
/// reached through an RPC client integration; this stand-in carries the
/// gross value through without penalties, fees, or discounts.
struct PassthroughContract {
    total_supply: U256,
}

impl RedemptionContract for PassthroughContract {
    fn total_supply(&self, _fund: FundKey) -> Result<U256, settlement_engine::Error> {
        Ok(self.total_supply)
    }

    fn compute_terms(
        &self,
        _fund: FundKey,
        nav_per_token: U256,
        token_amount: U256,
    ) -> Result<RedemptionTerms, settlement_engine::Error> {
        let gross = nav_per_token * token_amount;
        Ok(RedemptionTerms {
            gross_value: gross,
            penalty_amount: U256::ZERO,
            liquidity_fee_amount: U256::ZERO,
            discount_amount: U256::ZERO,
            net_payout: gross,
        })
    }
}

fn print_summary(record: &SettlementRecord) {
    println!("Settlement summary");
    println!("  business:        {}", record.business_id);
    println!("  fund:            {}", record.fund_key);
    println!(
        "  NAV per token:   {} (1e18-scaled, {} of {} months)",
        record.nav.nav_per_token, record.nav.records_used, record.nav.window_months
    );
    println!("  token amount:    {}", record.token_amount);
    let terms = &record.redemption_terms;
    println!("  gross value:     {}", terms.gross_value);
    println!("  penalty:         {}", terms.penalty_amount);
    println!("  liquidity fee:   {}", terms.liquidity_fee_amount);
    println!("  discount:        {}", terms.discount_amount);
    println!("  net payout:      {}", terms.net_payout);
    let adj = &record.insurance_adjustment;
    println!(
        "  insurance:       score {} -> multiplier {:.2}",
        adj.risk_score,
        adj.multiplier()
    );
    println!("  adjusted value:  {}", record.adjusted_redemption_value);
}

fn run(cli: Cli) -> Result<(), settlement_engine::Error> {
    let fund: FundKey = cli.fund_key.parse()?;
    let config = Arc::new(Config::from_env()?);

    let revenue = Arc::new(DirRevenueStore::new(config.revenue_dir.clone()));
    let risk = Arc::new(DirRiskProfileSource::new(config.risk_dir.clone()));
    let contract = Arc::new(PassthroughContract {
        total_supply: cli.total_supply,
    });
    let orchestrator = SettlementOrchestrator::new(
        Arc::clone(&config),
        NavEngine::new(revenue),
        risk,
        contract,
    )
    .with_window_months(cli.window_months);

    let record = orchestrator.settle(&cli.business_id, fund, cli.token_amount)?;

    let audit = AuditTrail::new(config.audit_dir.clone())?;
    audit.append(
        "admin_redeem",
        "ADMIN_REDEMPTION",
        serde_json::to_value(&record)?,
    )?;

    print_summary(&record);
    Ok(())
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let requested = matches!(
                e.kind(),
                clap::error::ErrorKind::DisplayHelp | clap::error::ErrorKind::DisplayVersion
            );
            let _ = e.print();
            // Operator contract: usage plus exit code 1 on bad arguments.
            return ExitCode::from(if requested { 0 } else { 1 });
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(cli.log_level.clone())),
        )
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(1)
        }
    }
}
