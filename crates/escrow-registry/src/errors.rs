//! # Error Types
//!
//! All error types for the registry and its escrow instances.

use crate::domain::value_objects::{Address, Hash, U256};
use thiserror::Error;

// =============================================================================
// ESCROW ERRORS
// =============================================================================

/// Errors surfaced by registry and escrow operations.
///
/// Every variant leaves registry and escrow state exactly as it was before
/// the failing call.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EscrowError {
    /// The revealed value does not open any stored commitment.
    #[error("wrong secret")]
    WrongSecret,

    /// The commitment was already counted and repeat reveals are rejected.
    #[error("secret already revealed: {0:?}")]
    SecretAlreadyRevealed(Hash),

    /// The derived instance address is already occupied (live or closed).
    #[error("escrow instance already exists at address: {0:?}")]
    InstanceAlreadyExists(Address),

    /// No escrow was ever created at this address.
    #[error("no escrow at address: {0:?}")]
    UnknownEscrow(Address),

    /// The escrow has resolved and no longer accepts calls.
    #[error("escrow closed: {0:?}")]
    EscrowClosed(Address),

    /// The escrow holds less than the deal amount at resolution time.
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds { required: U256, available: U256 },

    /// Token ledger failure.
    #[error("token error: {0}")]
    Token(#[from] TokenError),

    /// A settlement invariant failed; nothing was transferred.
    #[error("invariant violated: {0}")]
    InvariantViolated(String),
}

impl EscrowError {
    /// Returns true if the caller supplied something the escrow rejects.
    #[must_use]
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::WrongSecret
                | Self::SecretAlreadyRevealed(_)
                | Self::UnknownEscrow(_)
                | Self::EscrowClosed(_)
                | Self::InstanceAlreadyExists(_)
        )
    }

    /// Returns true if the same call may succeed later without changes.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::InsufficientFunds { .. } | Self::Token(TokenError::Unavailable(_))
        )
    }
}

// =============================================================================
// TOKEN ERRORS
// =============================================================================

/// Errors from the token ledger collaborator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    /// Holder cannot cover the transfer.
    #[error("insufficient balance for {holder:?}: required {required}, available {available}")]
    InsufficientBalance {
        holder: Address,
        required: U256,
        available: U256,
    },

    /// Crediting would overflow 256 bits.
    #[error("balance overflow")]
    Overflow,

    /// Ledger could not be reached.
    #[error("token ledger unavailable: {0}")]
    Unavailable(String),
}

// =============================================================================
// CONFIG ERRORS
// =============================================================================

/// Errors from loading or validating [`crate::config::RegistryConfig`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Escrow creation code must identify some initialization logic.
    #[error("escrow creation code is empty")]
    EmptyCreationCode,

    /// An address-valued variable could not be parsed.
    #[error("invalid address in {var}: {value}")]
    InvalidAddress { var: String, value: String },

    /// Creation code is not valid hex.
    #[error("invalid creation code hex: {0}")]
    InvalidCreationCode(String),

    /// Nonce is not an unsigned integer.
    #[error("invalid deployer nonce: {0}")]
    InvalidNonce(String),

    /// Unknown repeat-reveal policy name.
    #[error("invalid repeat-reveal policy: {0} (expected reject or permit)")]
    InvalidPolicy(String),
}

// =============================================================================
// TESTS
// =============================================================================
