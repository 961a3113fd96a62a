//! Event-driven payout dispatch.
//!
//! ```text
//! Chain transport (external)
//!          |
//!          v  bounded queue per fund
//! +------------------+
//! |   FundListener   |
//! |  (single dedup)  |
//! +------------------+
//!     |           |
//!     v           v
//! PayoutStore  AuditTrail
//!     |
//!     v
//! PayoutExecutor (external)
//! ```

mod dedup;
mod executor;
mod listener;
mod payout_store;
mod source;

pub use dedup::PayoutDeduplicator;
pub use executor::{execute_with_timeout, LoggingPayoutExecutor, PayoutExecutor};
pub use listener::{FundListener, ListenerState, ListenerStats};
pub use payout_store::PayoutStore;
pub use source::{ChainEventSource, FileEventSource};
