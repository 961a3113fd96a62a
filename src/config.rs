//! Engine configuration.
//!
//! Built once at startup (typically from the environment) and passed by
//! reference to every component that needs it; nothing reads the
//! environment after construction.

use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use alloy::primitives::Address;

use crate::prelude::*;
use crate::types::FundKey;

/// Default capacity of each per-fund event queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Default timeout for a single payout execution.
pub const DEFAULT_DISPATCH_TIMEOUT_SECS: u64 = 30;

/// Settlement engine configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Chain RPC endpoint for the event transport.
    pub rpc_url: String,
    /// Redemption contract address per fund. Funds without an address are
    /// simply not subscribed.
    pub fund_addresses: BTreeMap<FundKey, Address>,
    /// JSONL payout log path (canonical dedup store).
    pub payout_log: PathBuf,
    /// Directory of date-partitioned audit log files.
    pub audit_dir: PathBuf,
    /// Directory of per-fund monthly revenue JSON files.
    pub revenue_dir: PathBuf,
    /// Directory of per-business risk profile uploads.
    pub risk_dir: PathBuf,
    /// Bounded event queue capacity per fund listener.
    pub queue_capacity: usize,
    /// Timeout applied to each payout executor invocation.
    pub dispatch_timeout: Duration,
}

impl Config {
    /// Build the configuration from environment variables.
    ///
    /// `RPC_URL` must be set and non-empty. `REDEMPTION_FUND_<KEY>_ADDRESS`
    /// may be absent per fund; a present but malformed address is a
    /// startup error, not a skipped fund.
    pub fn from_env() -> Result<Self> {
        let rpc_url = env::var("RPC_URL").unwrap_or_default();
        if rpc_url.is_empty() {
            return Err(Error::Config("RPC_URL is not set".to_string()));
        }

        let mut fund_addresses = BTreeMap::new();
        for fund in FundKey::ALL {
            let var = format!("REDEMPTION_FUND_{fund}_ADDRESS");
            match env::var(&var) {
                Ok(raw) if !raw.is_empty() => {
                    let address = raw
                        .parse::<Address>()
                        .map_err(|e| Error::Config(format!("{var}: {e}")))?;
                    fund_addresses.insert(fund, address);
                }
                _ => {}
            }
        }

        let dispatch_timeout_secs = match env::var("PAYOUT_DISPATCH_TIMEOUT_SECS") {
            Ok(raw) => raw
                .parse::<u64>()
                .map_err(|_| Error::Config(format!("invalid PAYOUT_DISPATCH_TIMEOUT_SECS \"{raw}\"")))?,
            Err(_) => DEFAULT_DISPATCH_TIMEOUT_SECS,
        };

        Ok(Self {
            rpc_url,
            fund_addresses,
            payout_log: path_from_env("PAYOUT_LOG_FILE", "./payout-log.jsonl"),
            audit_dir: path_from_env("AUDIT_LOG_DIR", "./audits/logs"),
            revenue_dir: path_from_env("REVENUE_DATA_DIR", "./br_rms_data"),
            risk_dir: path_from_env("RISK_PROFILE_DIR", "./business_uploads"),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            dispatch_timeout: Duration::from_secs(dispatch_timeout_secs),
        })
    }

    /// Funds that have a contract address configured, in roster order.
    pub fn subscribed_funds(&self) -> Vec<FundKey> {
        self.fund_addresses.keys().copied().collect()
    }

    /// Address for a fund, or `UnknownFund` if it is not configured.
    pub fn fund_address(&self, fund: FundKey) -> Result<Address> {
        self.fund_addresses
            .get(&fund)
            .copied()
            .ok_or_else(|| Error::UnknownFund {
                key: fund.to_string(),
            })
    }
}

fn path_from_env(var: &str, default: &str) -> PathBuf {
    match env::var(var) {
        Ok(raw) if !raw.is_empty() => PathBuf::from(raw),
        _ => PathBuf::from(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Env-var tests mutate process state; keep them in one test so they
    // cannot race each other under the parallel test runner.
    #[test]
    fn from_env_reads_required_and_optional() {
        env::remove_var("RPC_URL");
        env::remove_var("PAYOUT_DISPATCH_TIMEOUT_SECS");
        for fund in FundKey::ALL {
            env::remove_var(format!("REDEMPTION_FUND_{fund}_ADDRESS"));
        }

        assert!(Config::from_env().is_err());

        env::set_var("RPC_URL", "http://localhost:8545");
        env::set_var(
            "REDEMPTION_FUND_I_ADDRESS",
            "0x0000000000000000000000000000000000000001",
        );
        env::set_var("PAYOUT_LOG_FILE", "/tmp/payouts.jsonl");

        let config = Config::from_env().unwrap();
        assert_eq!(config.subscribed_funds(), vec![FundKey::I]);
        assert_eq!(config.payout_log, PathBuf::from("/tmp/payouts.jsonl"));
        assert_eq!(
            config.dispatch_timeout,
            Duration::from_secs(DEFAULT_DISPATCH_TIMEOUT_SECS)
        );
        assert!(config.fund_address(FundKey::I).is_ok());
        assert!(config.fund_address(FundKey::III).is_err());

        env::set_var(
            "REDEMPTION_FUND_II_ADDRESS",
            "not-an-address",
        );
        assert!(Config::from_env().is_err());
        env::remove_var("REDEMPTION_FUND_II_ADDRESS");
    }
}
