//! # Core Domain Entities
//!
//! The escrow state machine and the values that flow through it.
//!
//! An [`Escrow`] is created once with six commitments, counts votes as
//! secrets are revealed, and resolves exactly once when some address reaches
//! [`RELEASE_THRESHOLD`] votes. Fund movement is planned here as a
//! [`Settlement`] but executed by the service through the token ledger port.

use crate::domain::services::commitment_of;
use crate::domain::value_objects::{Address, EscrowId, Hash, U256};
use crate::errors::EscrowError;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Votes an address needs before the escrow releases to it.
pub const RELEASE_THRESHOLD: u32 = 2;

// =============================================================================
// ESCROW PARAMETERS
// =============================================================================

/// Immutable constructor arguments of an escrow instance.
///
/// These are exactly the values folded into the deterministic address.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowParams {
    /// Trusted forwarder copied from the registry.
    pub relay_identity: Address,
    /// Registry that created (and receives sweeps from) the escrow.
    pub registry: Address,
    /// Identifier assigned by the registry.
    pub registry_id: EscrowId,
    /// Token the deal is denominated in.
    pub token: Address,
    /// Amount released to the winning side.
    pub amount: U256,
    /// Seller address.
    pub seller: Address,
    /// Buyer address.
    pub buyer: Address,
    /// Seller's commitments: `[to seller, to buyer]`.
    pub seller_commitments: [Hash; 2],
    /// Buyer's commitments: `[to seller, to buyer]`.
    pub buyer_commitments: [Hash; 2],
    /// Arbitrator's commitments: `[to seller, to buyer]`.
    pub arbitrator_commitments: [Hash; 2],
}

// =============================================================================
// CALL ORIGIN (relay identity)
// =============================================================================

/// Who sent a call, including the original sender embedded by a relay.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallOrigin {
    /// Immediate sender of the call.
    pub sender: Address,
    /// Original sender appended by a forwarding relay, if any.
    pub forwarded_for: Option<Address>,
}

impl CallOrigin {
    /// A call sent directly by `sender`.
    #[must_use]
    pub const fn direct(sender: Address) -> Self {
        Self {
            sender,
            forwarded_for: None,
        }
    }

    /// A call forwarded by `relay` on behalf of `original`.
    #[must_use]
    pub const fn relayed(relay: Address, original: Address) -> Self {
        Self {
            sender: relay,
            forwarded_for: Some(original),
        }
    }

    /// Resolves the effective caller against the configured relay identity.
    ///
    /// The embedded sender is only honoured when the call actually came from
    /// the trusted relay; anyone else gets their own address back.
    #[must_use]
    pub fn effective_sender(&self, relay_identity: Address) -> Address {
        match self.forwarded_for {
            Some(original) if !relay_identity.is_zero() && self.sender == relay_identity => {
                original
            }
            _ => self.sender,
        }
    }
}

// =============================================================================
// REPEAT-REVEAL POLICY
// =============================================================================

/// Whether the same commitment may be counted more than once.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RepeatRevealPolicy {
    /// A commitment counts at most once.
    #[default]
    Reject,
    /// Every reveal counts, so one party can resolve alone by revealing twice.
    Permit,
}

impl std::str::FromStr for RepeatRevealPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "reject" | "forbid" => Ok(Self::Reject),
            "permit" | "allow" => Ok(Self::Permit),
            other => Err(other.to_string()),
        }
    }
}

// =============================================================================
// VOTE / SETTLEMENT
// =============================================================================

/// A validated but not yet applied vote.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Vote {
    /// Commitment opened by the reveal.
    pub commitment: Hash,
    /// Address the vote releases to.
    pub to: Address,
    /// Tally of `to` once this vote is applied.
    pub votes_after: u32,
}

impl Vote {
    /// True if applying this vote resolves the escrow.
    #[must_use]
    pub fn reaches_threshold(&self) -> bool {
        self.votes_after >= RELEASE_THRESHOLD
    }
}

/// A single token movement out of an escrow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    /// Recipient.
    pub to: Address,
    /// Amount.
    pub amount: U256,
}

/// Token movements performed at resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settlement {
    /// Deal amount to the winning address.
    pub release: Transfer,
    /// Surplus returned to the registry.
    pub sweep: Option<Transfer>,
}

impl Settlement {
    /// Plans the settlement for an escrow holding `balance`.
    pub fn plan(
        amount: U256,
        balance: U256,
        to: Address,
        registry: Address,
    ) -> Result<Self, EscrowError> {
        if balance < amount {
            return Err(EscrowError::InsufficientFunds {
                required: amount,
                available: balance,
            });
        }
        let surplus = balance - amount;
        Ok(Self {
            release: Transfer { to, amount },
            sweep: (!surplus.is_zero()).then_some(Transfer {
                to: registry,
                amount: surplus,
            }),
        })
    }

    /// Transfers in execution order.
    #[must_use]
    pub fn transfers(&self) -> Vec<Transfer> {
        std::iter::once(self.release).chain(self.sweep).collect()
    }

    /// Surplus swept to the registry (zero when there is none).
    #[must_use]
    pub fn swept(&self) -> U256 {
        self.sweep.map_or_else(U256::zero, |t| t.amount)
    }

    /// Sum of all transfers.
    #[must_use]
    pub fn total(&self) -> U256 {
        self.release.amount.saturating_add(self.swept())
    }
}

// =============================================================================
// ESCROW
// =============================================================================

/// Lifecycle state of an escrow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EscrowStatus {
    /// Accepting reveals.
    Open,
    /// Funds released; no further operation is possible.
    Resolved {
        /// Winning address.
        to: Address,
    },
}

/// A single deal: commitments, tallies and terms.
#[derive(Clone, Debug)]
pub struct Escrow {
    address: Address,
    params: EscrowParams,
    commitments: HashMap<Hash, Address>,
    votes: HashMap<Address, u32>,
    counted: HashSet<Hash>,
    status: EscrowStatus,
}

impl Escrow {
    /// Creates an open escrow at `address`.
    ///
    /// Commitments are inserted seller, buyer, arbitrator; within each pair
    /// the first releases to the seller and the second to the buyer. A
    /// commitment repeated in a later slot overwrites the earlier target.
    #[must_use]
    pub fn new(address: Address, params: EscrowParams) -> Self {
        let mut commitments = HashMap::with_capacity(6);
        for pair in [
            params.seller_commitments,
            params.buyer_commitments,
            params.arbitrator_commitments,
        ] {
            commitments.insert(pair[0], params.seller);
            commitments.insert(pair[1], params.buyer);
        }

        Self {
            address,
            params,
            commitments,
            votes: HashMap::new(),
            counted: HashSet::new(),
            status: EscrowStatus::Open,
        }
    }

    /// Instance address.
    #[must_use]
    pub fn address(&self) -> Address {
        self.address
    }

    /// Constructor arguments.
    #[must_use]
    pub fn params(&self) -> &EscrowParams {
        &self.params
    }

    /// Identifier assigned by the registry.
    #[must_use]
    pub fn registry_id(&self) -> EscrowId {
        self.params.registry_id
    }

    /// Deal token.
    #[must_use]
    pub fn token(&self) -> Address {
        self.params.token
    }

    /// Seller.
    #[must_use]
    pub fn seller(&self) -> Address {
        self.params.seller
    }

    /// Buyer.
    #[must_use]
    pub fn buyer(&self) -> Address {
        self.params.buyer
    }

    /// Expected deal amount.
    #[must_use]
    pub fn amount(&self) -> U256 {
        self.params.amount
    }

    /// Trusted forwarder.
    #[must_use]
    pub fn relay_identity(&self) -> Address {
        self.params.relay_identity
    }

    /// True if `address` is the configured trusted forwarder.
    #[must_use]
    pub fn is_trusted_forwarder(&self, address: &Address) -> bool {
        !self.params.relay_identity.is_zero() && *address == self.params.relay_identity
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn status(&self) -> EscrowStatus {
        self.status
    }

    /// True once funds have been released.
    #[must_use]
    pub fn is_resolved(&self) -> bool {
        matches!(self.status, EscrowStatus::Resolved { .. })
    }

    /// Target of a commitment, or the zero address if unknown.
    #[must_use]
    pub fn secret_to_address(&self, commitment: &Hash) -> Address {
        self.commitments
            .get(commitment)
            .copied()
            .unwrap_or(Address::ZERO)
    }

    /// Votes counted for `to` so far.
    #[must_use]
    pub fn to_address_votes(&self, to: &Address) -> u32 {
        self.votes.get(to).copied().unwrap_or(0)
    }

    /// Iterates over all stored commitments and their targets.
    pub fn commitments(&self) -> impl Iterator<Item = (&Hash, &Address)> {
        self.commitments.iter()
    }

    /// Validates a reveal without mutating anything.
    pub fn tally(&self, revealed: &Hash, policy: RepeatRevealPolicy) -> Result<Vote, EscrowError> {
        if self.is_resolved() {
            return Err(EscrowError::EscrowClosed(self.address));
        }

        let commitment = commitment_of(revealed);
        let to = *self
            .commitments
            .get(&commitment)
            .ok_or(EscrowError::WrongSecret)?;

        if policy == RepeatRevealPolicy::Reject && self.counted.contains(&commitment) {
            return Err(EscrowError::SecretAlreadyRevealed(commitment));
        }

        Ok(Vote {
            commitment,
            to,
            votes_after: self.to_address_votes(&to).saturating_add(1),
        })
    }

    /// Applies a vote previously returned by [`Escrow::tally`].
    pub fn apply(&mut self, vote: &Vote) {
        self.votes.insert(vote.to, vote.votes_after);
        self.counted.insert(vote.commitment);
        if vote.reaches_threshold() {
            self.status = EscrowStatus::Resolved { to: vote.to };
        }
    }

    /// Serializable view of the escrow.
    #[must_use]
    pub fn snapshot(&self) -> EscrowSnapshot {
        EscrowSnapshot {
            address: self.address,
            registry_id: self.params.registry_id,
            token: self.params.token,
            amount: self.params.amount,
            seller: self.params.seller,
            buyer: self.params.buyer,
            relay_identity: self.params.relay_identity,
            seller_votes: self.to_address_votes(&self.params.seller),
            buyer_votes: self.to_address_votes(&self.params.buyer),
            status: self.status,
        }
    }
}

/// Read-only view of an escrow for clients and indexers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EscrowSnapshot {
    /// Instance address.
    pub address: Address,
    /// Registry identifier.
    pub registry_id: EscrowId,
    /// Deal token.
    pub token: Address,
    /// Deal amount.
    pub amount: U256,
    /// Seller.
    pub seller: Address,
    /// Buyer.
    pub buyer: Address,
    /// Trusted forwarder.
    pub relay_identity: Address,
    /// Votes releasing to the seller.
    pub seller_votes: u32,
    /// Votes releasing to the buyer.
    pub buyer_votes: u32,
    /// Lifecycle state.
    pub status: EscrowStatus,
}

// =============================================================================
// TESTS
// =============================================================================
