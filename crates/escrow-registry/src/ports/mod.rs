//! # Ports Layer (Middle Hexagon)
//!
//! Trait definitions between the escrow domain and the outside world.
//!
//! - **Driving Port (Inbound)**: `EscrowRegistryApi`
//! - **Driven Ports (Outbound)**: `TokenLedger`, `EventSink`

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
