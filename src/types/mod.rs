//! Consolidated type definitions for the settlement engine.
//!
//! This module contains the domain data model shared across the NAV
//! engine, settlement orchestration, audit trail, and payout dispatch.

mod events;
mod revenue;
mod settlement;

pub use events::*;
pub use revenue::*;
pub use settlement::*;
