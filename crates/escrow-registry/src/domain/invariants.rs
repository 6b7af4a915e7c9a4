//! # Domain Invariants
//!
//! Conditions that must hold before an escrow is allowed to move funds.
//! The service evaluates these after planning a settlement and refuses to
//! touch the ledger if any of them fails.
//!
//! - Conservation: everything the escrow held leaves it, nothing more.
//! - Exact release: the winner receives exactly the deal amount.
//! - Sweep target: surplus only ever goes to the registry.
//! - Party targets: every commitment releases to the seller or the buyer.
//! - Threshold: resolution happens only at the release threshold.
//!
//! The registry ledger has one more: ids are contiguous from zero.

use crate::domain::entities::{Escrow, Settlement, Vote, RELEASE_THRESHOLD};
use crate::domain::value_objects::{Address, EscrowId, U256};
use std::collections::BTreeMap;

// =============================================================================
// INVARIANT CHECKS
// =============================================================================

/// Released plus swept equals the escrow's balance at resolution.
#[must_use]
pub fn check_conservation_invariant(settlement: &Settlement, balance: U256) -> bool {
    settlement
        .release
        .amount
        .checked_add(settlement.swept())
        .is_some_and(|total| total == balance)
}

/// The winner receives exactly the agreed amount.
#[must_use]
pub fn check_exact_release_invariant(settlement: &Settlement, escrow: &Escrow) -> bool {
    settlement.release.amount == escrow.amount()
}

/// Any surplus is returned to the creating registry.
#[must_use]
pub fn check_sweep_target_invariant(settlement: &Settlement, escrow: &Escrow) -> bool {
    settlement
        .sweep
        .map_or(true, |sweep| sweep.to == escrow.params().registry)
}

/// Every stored commitment targets one of the two parties.
#[must_use]
pub fn check_party_targets_invariant(escrow: &Escrow) -> bool {
    escrow
        .commitments()
        .all(|(_, to)| *to == escrow.seller() || *to == escrow.buyer())
}

/// A resolving vote lands exactly on the threshold, and goes to a party.
#[must_use]
pub fn check_threshold_invariant(vote: &Vote, escrow: &Escrow) -> bool {
    vote.votes_after == RELEASE_THRESHOLD && (vote.to == escrow.seller() || vote.to == escrow.buyer())
}

/// The registry ledger holds exactly `escrow_count` entries keyed `0..escrow_count`.
#[must_use]
pub fn check_ledger_contiguity_invariant(
    escrow_count: u64,
    escrows: &BTreeMap<EscrowId, Address>,
) -> bool {
    escrows.len() as u64 == escrow_count
        && escrows.keys().copied().eq(0..escrow_count)
}

/// Check all settlement invariants at once.
#[must_use]
pub fn check_all_invariants(
    escrow: &Escrow,
    vote: &Vote,
    settlement: &Settlement,
    balance: U256,
) -> InvariantCheckResult {
    let mut violations = Vec::new();

    if !check_conservation_invariant(settlement, balance) {
        violations.push(InvariantViolation::FundsNotConserved {
            balance,
            released: settlement.release.amount,
            swept: settlement.swept(),
        });
    }

    if !check_exact_release_invariant(settlement, escrow) {
        violations.push(InvariantViolation::WrongReleaseAmount {
            expected: escrow.amount(),
            actual: settlement.release.amount,
        });
    }

    if !check_sweep_target_invariant(settlement, escrow) {
        if let Some(sweep) = settlement.sweep {
            violations.push(InvariantViolation::SweepMisdirected { to: sweep.to });
        }
    }

    if !check_party_targets_invariant(escrow) {
        violations.push(InvariantViolation::UnknownTarget);
    }

    if !check_threshold_invariant(vote, escrow) {
        violations.push(InvariantViolation::ThresholdNotMet {
            votes: vote.votes_after,
        });
    }

    if violations.is_empty() {
        InvariantCheckResult::Valid
    } else {
        InvariantCheckResult::Invalid(violations)
    }
}

// =============================================================================
// INVARIANT TYPES
// =============================================================================

/// Result of checking all invariants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvariantCheckResult {
    /// All invariants hold.
    Valid,
    /// One or more invariants violated.
    Invalid(Vec<InvariantViolation>),
}

impl InvariantCheckResult {
    /// Returns true if all invariants hold.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }
}

/// Specific invariant violation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum InvariantViolation {
    /// Transfers do not add up to the balance.
    FundsNotConserved {
        balance: U256,
        released: U256,
        swept: U256,
    },
    /// Release differs from the agreed amount.
    WrongReleaseAmount { expected: U256, actual: U256 },
    /// Surplus sent somewhere other than the registry.
    SweepMisdirected { to: Address },
    /// A commitment targets neither party.
    UnknownTarget,
    /// Resolution attempted off the threshold.
    ThresholdNotMet { votes: u32 },
}

impl std::fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::FundsNotConserved {
                balance,
                released,
                swept,
            } => write!(
                f,
                "funds not conserved: balance {balance} != released {released} + swept {swept}"
            ),
            Self::WrongReleaseAmount { expected, actual } => {
                write!(f, "wrong release amount: expected {expected}, got {actual}")
            }
            Self::SweepMisdirected { to } => write!(f, "surplus swept to {to}"),
            Self::UnknownTarget => write!(f, "commitment targets neither party"),
            Self::ThresholdNotMet { votes } => {
                write!(f, "resolution with {votes} votes (threshold {RELEASE_THRESHOLD})")
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
