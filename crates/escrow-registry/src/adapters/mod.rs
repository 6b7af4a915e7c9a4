//! # Adapters Layer (Outer Hexagon)
//!
//! In-memory implementations of the driven ports.

pub mod event_log;
pub mod token_ledger;

pub use event_log::*;
pub use token_ledger::*;
