#![deny(unreachable_pub)]

// Core modules
mod errors;
mod prelude;

// Shared utilities
pub mod serde_utils;
pub mod types;

// Feature modules
pub mod audit;
pub mod config;
pub mod dispatch;
pub mod insurance;
pub mod nav;
pub mod revenue;
pub mod settlement;

// Re-exports
pub use audit::AuditTrail;
pub use config::Config;
pub use dispatch::{
    ChainEventSource, FileEventSource, FundListener, ListenerState, ListenerStats,
    LoggingPayoutExecutor, PayoutExecutor, PayoutStore,
};
pub use errors::{DispatchError, Error, NavError};
pub use insurance::{compute_adjustment, DirRiskProfileSource, RiskProfileSource};
pub use nav::NavEngine;
pub use revenue::{DirRevenueStore, RevenueStore};
pub use settlement::{RedemptionContract, SettlementOrchestrator, DEFAULT_NAV_WINDOW_MONTHS};
pub use types::*;
