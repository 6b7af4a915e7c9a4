//! # Escrow Registry - Hash-Locked 2-of-3 Escrow
//!
//! A registry (factory + directory) that creates escrow instances at
//! addresses computable before creation, and the per-deal escrow state
//! machine that releases funds once two of three parties agree.
//!
//! ## Commit-Reveal Protocol
//!
//! Each of seller, buyer and arbitrator commits two secrets at creation: one
//! that releases to the seller and one that releases to the buyer. Only the
//! double hash `H(H(secret))` is stored. To vote, a party submits `H(secret)`;
//! the escrow re-hashes it and looks up the target. The first address to
//! collect [`RELEASE_THRESHOLD`](domain::entities::RELEASE_THRESHOLD) votes
//! wins, so the arbitrator breaks a 1-1 tie simply by voting.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement Location |
//! |-----------|---------------------|
//! | Ledger ids contiguous from zero | `domain/invariants.rs` - `check_ledger_contiguity_invariant()` |
//! | Balance fully conserved at settlement | `domain/invariants.rs` - `check_conservation_invariant()` |
//! | Winner receives exactly the deal amount | `domain/invariants.rs` - `check_exact_release_invariant()` |
//! | Surplus only swept to the registry | `domain/invariants.rs` - `check_sweep_target_invariant()` |
//! | Resolution exactly at threshold | `domain/invariants.rs` - `check_threshold_invariant()` |
//! | No call succeeds after resolution | `service.rs` - tombstone set |
//!
//! ## Deterministic Addressing
//!
//! | Function | Rule |
//! |----------|------|
//! | `compute_contract_address` | registry at `H(rlp([deployer, nonce]))[12:]` |
//! | `compute_escrow_address` | CREATE2 over `creation_code ++ abi(args)` |
//!
//! ## Outbound Dependencies
//!
//! | Collaborator | Trait | Purpose |
//! |--------------|-------|---------|
//! | Token ledger | `TokenLedger` | Balances and all-or-nothing settlement |
//! | Indexers | `EventSink` | Event publication |
//!
//! ## Usage Example
//!
//! ```ignore
//! use escrow_registry::prelude::*;
//!
//! let service = create_test_service();
//! let escrow = service.create_escrow(CallOrigin::direct(seller), request).await?;
//! service.ledger().mint(token, escrow, amount)?;
//!
//! service.reveal_secret_to_release_to(CallOrigin::direct(seller), escrow, reveal_hash(b"s0")).await?;
//! let receipt = service.reveal_secret_to_release_to(CallOrigin::direct(buyer), escrow, reveal_hash(b"b0")).await?;
//! assert!(receipt.resolved());
//! ```

// Crate-level lints
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::similar_names)]

// =============================================================================
// MODULES
// =============================================================================

pub mod adapters;
pub mod config;
pub mod domain;
pub mod errors;
pub mod events;
pub mod ports;
pub mod service;

// =============================================================================
// PRELUDE
// =============================================================================

/// Convenient re-exports for common usage.
pub mod prelude {
    // Domain entities
    pub use crate::domain::entities::{
        CallOrigin, Escrow, EscrowParams, EscrowSnapshot, EscrowStatus, RepeatRevealPolicy,
        Settlement, Transfer, Vote, RELEASE_THRESHOLD,
    };

    // Value objects
    pub use crate::domain::value_objects::{Address, EscrowId, Hash, ParseHexError, U256};

    // Domain services
    pub use crate::domain::services::{
        commitment_of, compute_contract_address, compute_contract_address_create2,
        compute_escrow_address, double_hash, encode_escrow_args, escrow_init_code,
        generate_secret, keccak256, reveal_hash, salt_from_label,
    };

    // Invariants
    pub use crate::domain::invariants::{
        check_all_invariants, InvariantCheckResult, InvariantViolation,
    };

    // Ports
    pub use crate::ports::inbound::{
        CreateEscrowRequest, EscrowRegistryApi, Resolution, RevealReceipt,
    };
    pub use crate::ports::outbound::{EventSink, TokenLedger};

    // Events
    pub use crate::events::{topics, EscrowEvent, EventRecord};

    // Errors
    pub use crate::errors::{ConfigError, EscrowError, TokenError};

    // Configuration
    pub use crate::config::{RegistryConfig, DEFAULT_ESCROW_CREATION_CODE};

    // Adapters
    pub use crate::adapters::{InMemoryEventLog, InMemoryTokenLedger};

    // Service
    pub use crate::service::{
        create_in_memory_service, create_test_service, EscrowRegistryService, ServiceStats,
    };
}

// =============================================================================
// CRATE METADATA
// =============================================================================

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const CRATE_NAME: &str = env!("CARGO_PKG_NAME");
