use thiserror::Error;

use crate::types::FundKey;

/// NAV computation errors.
///
/// Each variant is fatal for the settlement attempt that triggered it but
/// leaves the fund usable for other requests.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavError {
    /// Total token supply is zero; NAV is undefined.
    #[error("total supply is zero, cannot compute NAV for fund {fund}")]
    ZeroSupply { fund: FundKey },

    /// No revenue records exist for the fund at all.
    #[error("no revenue records found for fund {fund}")]
    NoData { fund: FundKey },

    /// Records exist for the fund but none fall in the requested window.
    #[error("no usable revenue records in a {window_months}-month window for fund {fund}")]
    InsufficientWindow { fund: FundKey, window_months: u32 },

    /// A zero-length window was requested.
    #[error("window must cover at least one month")]
    EmptyWindow,
}

/// Payout dispatch errors.
///
/// By the time one of these is raised the PayoutRecord has already been
/// durably stored, so the failure is retryable out of band and must never
/// re-append the record.
#[derive(Error, Debug, Clone)]
pub enum DispatchError {
    /// The executor reported a failure.
    #[error("payout execution failed: {0}")]
    Execution(String),

    /// The executor did not complete within the configured timeout.
    #[error("payout execution timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
}

/// Main settlement engine error type.
#[derive(Error, Debug)]
pub enum Error {
    /// NAV computation failed.
    #[error(transparent)]
    Nav(#[from] NavError),

    /// Fund key does not map to a configured fund.
    #[error("unknown fund key \"{key}\", expected one of I, II, III, IV")]
    UnknownFund { key: String },

    /// Malformed or missing upstream revenue/risk data.
    #[error("validation error: {0}")]
    Validation(String),

    /// Startup configuration is missing or malformed.
    #[error("configuration error: {0}")]
    Config(String),

    /// Filesystem-backed store failure.
    #[error("storage error: {0}")]
    Storage(#[from] std::io::Error),

    /// Serialization failure in a persisted record.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Audit trail append failed; the in-flight action must abort.
    #[error("audit append failed: {0}")]
    Audit(String),

    /// A payout record with the same identity key is already stored.
    ///
    /// Surfaced internally only; the listener treats it as a successful
    /// no-op, never as an operator-visible error.
    #[error("duplicate payout record: {key}")]
    DuplicatePayout { key: String },

    /// Payout execution failed after the record was stored.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// External contract collaborator failure.
    #[error("redemption contract error: {0}")]
    Contract(String),
}

impl Error {
    /// True when the error is the internal duplicate-payout signal.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Error::DuplicatePayout { .. })
    }
}
