//! # Event Schema
//!
//! Append-only events observable by external indexers.
//!
//! | Event | Emitter |
//! |-------|---------|
//! | `EscrowCreated` | Registry |
//! | `SecretRevealedToReleaseTo` | Escrow instance |
//! | `TokensReleased` | Escrow instance |
//! | `EscrowClosed` | Registry |
//!
//! A call's events are published only once the call has fully succeeded.

use crate::domain::value_objects::{Address, EscrowId, U256};
use serde::{Deserialize, Serialize};

// =============================================================================
// EVENTS
// =============================================================================

/// Events emitted by the registry and its escrows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum EscrowEvent {
    /// A new escrow instance was created.
    EscrowCreated {
        id: EscrowId,
        escrow: Address,
        token: Address,
        seller: Address,
        buyer: Address,
        amount: U256,
    },
    /// A reveal counted one vote for `to`.
    SecretRevealedToReleaseTo { to: Address },
    /// The deal amount was released.
    TokensReleased {
        token: Address,
        to: Address,
        amount: U256,
    },
    /// The escrow resolved and was closed.
    EscrowClosed {
        id: EscrowId,
        escrow: Address,
        token: Address,
        seller: Address,
        buyer: Address,
        amount: U256,
    },
}

impl EscrowEvent {
    /// Stable event name, matching the variant.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::EscrowCreated { .. } => "EscrowCreated",
            Self::SecretRevealedToReleaseTo { .. } => "SecretRevealedToReleaseTo",
            Self::TokensReleased { .. } => "TokensReleased",
            Self::EscrowClosed { .. } => "EscrowClosed",
        }
    }

    /// Topic the event is published on.
    #[must_use]
    pub fn topic(&self) -> &'static str {
        match self {
            Self::EscrowCreated { .. } => topics::ESCROW_CREATED,
            Self::SecretRevealedToReleaseTo { .. } => topics::SECRET_REVEALED,
            Self::TokensReleased { .. } => topics::TOKENS_RELEASED,
            Self::EscrowClosed { .. } => topics::ESCROW_CLOSED,
        }
    }
}

/// An event together with the address that emitted it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Registry or escrow instance address.
    pub emitter: Address,
    /// Event payload.
    #[serde(flatten)]
    pub event: EscrowEvent,
}

impl EventRecord {
    /// Pairs an event with its emitter.
    #[must_use]
    pub fn new(emitter: Address, event: EscrowEvent) -> Self {
        Self { emitter, event }
    }

    /// One-line JSON form for log shipping.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

// =============================================================================
// TOPICS
// =============================================================================

/// Topic names for event routing.
pub mod topics {
    /// Escrow instance created by the registry.
    pub const ESCROW_CREATED: &str = "escrow_registry.escrow.created";

    /// Reveal counted by an escrow instance.
    pub const SECRET_REVEALED: &str = "escrow_registry.escrow.revealed";

    /// Funds released by an escrow instance.
    pub const TOKENS_RELEASED: &str = "escrow_registry.escrow.released";

    /// Escrow instance closed after resolution.
    pub const ESCROW_CLOSED: &str = "escrow_registry.escrow.closed";
}

// =============================================================================
// TESTS
// =============================================================================
