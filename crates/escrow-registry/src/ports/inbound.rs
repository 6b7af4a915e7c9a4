//! # Driving Ports (API - Inbound)
//!
//! The public surface of the registry and of the escrow instances it owns.
//! Every mutating call carries a [`CallOrigin`] so forwarded calls resolve to
//! their original sender.

use crate::domain::entities::{CallOrigin, EscrowParams, EscrowSnapshot};
use crate::domain::value_objects::{Address, EscrowId, Hash, U256};
use crate::errors::EscrowError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// =============================================================================
// REQUESTS / RECEIPTS
// =============================================================================

/// Arguments to [`EscrowRegistryApi::create_escrow`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEscrowRequest {
    /// Deal token.
    pub token: Address,
    /// Deal amount.
    pub amount: U256,
    /// Seller.
    pub seller: Address,
    /// Buyer.
    pub buyer: Address,
    /// Seller's `[to seller, to buyer]` commitments.
    pub seller_commitments: [Hash; 2],
    /// Buyer's `[to seller, to buyer]` commitments.
    pub buyer_commitments: [Hash; 2],
    /// Arbitrator's `[to seller, to buyer]` commitments.
    pub arbitrator_commitments: [Hash; 2],
    /// CREATE2 salt.
    pub salt: Hash,
}

impl CreateEscrowRequest {
    /// Constructor arguments for an escrow created by `registry` under `id`.
    #[must_use]
    pub fn to_params(&self, relay_identity: Address, registry: Address, id: EscrowId) -> EscrowParams {
        EscrowParams {
            relay_identity,
            registry,
            registry_id: id,
            token: self.token,
            amount: self.amount,
            seller: self.seller,
            buyer: self.buyer,
            seller_commitments: self.seller_commitments,
            buyer_commitments: self.buyer_commitments,
            arbitrator_commitments: self.arbitrator_commitments,
        }
    }
}

/// How a resolving reveal settled the escrow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resolution {
    /// Address the funds were released to.
    pub to: Address,
    /// Amount released.
    pub released: U256,
    /// Surplus swept to the registry.
    pub swept: U256,
}

/// Outcome of an accepted reveal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevealReceipt {
    /// Escrow instance.
    pub escrow: Address,
    /// Address the reveal voted for.
    pub to: Address,
    /// Tally of `to` after this reveal.
    pub votes: u32,
    /// Present when this reveal resolved the escrow.
    pub resolution: Option<Resolution>,
}

impl RevealReceipt {
    /// True if this reveal resolved the escrow.
    #[must_use]
    pub fn resolved(&self) -> bool {
        self.resolution.is_some()
    }
}

// =============================================================================
// REGISTRY / ESCROW API
// =============================================================================

/// Primary API of the registry and its escrow instances.
#[async_trait]
pub trait EscrowRegistryApi: Send + Sync {
    /// Creates an escrow at its deterministic address and records it.
    async fn create_escrow(
        &self,
        origin: CallOrigin,
        request: CreateEscrowRequest,
    ) -> Result<Address, EscrowError>;

    /// Reveals `H(secret)` to the escrow at `escrow`, counting one vote.
    async fn reveal_secret_to_release_to(
        &self,
        origin: CallOrigin,
        escrow: Address,
        revealed: Hash,
    ) -> Result<RevealReceipt, EscrowError>;

    /// Address the registry itself lives at.
    fn registry_address(&self) -> Address;

    /// Trusted forwarder.
    fn relay_identity(&self) -> Address;

    /// True if `address` is the trusted forwarder.
    fn is_trusted_forwarder(&self, address: &Address) -> bool {
        let relay = self.relay_identity();
        !relay.is_zero() && *address == relay
    }

    /// Number of escrows created so far (also the next id).
    async fn escrow_count(&self) -> u64;

    /// Instance address recorded under `id`.
    async fn escrows(&self, id: EscrowId) -> Option<Address>;

    /// Address `request` would be created at if it received `id`.
    fn predict_escrow_address(&self, id: EscrowId, request: &CreateEscrowRequest) -> Address;

    /// Read-only view of a live escrow.
    async fn escrow_snapshot(&self, escrow: Address) -> Result<EscrowSnapshot, EscrowError>;

    /// Target of `commitment` in `escrow` (zero address if unknown).
    async fn secret_to_address(&self, escrow: Address, commitment: Hash) -> Result<Address, EscrowError>;

    /// Votes counted for `to` in `escrow`.
    async fn to_address_votes(&self, escrow: Address, to: Address) -> Result<u32, EscrowError>;

    /// Registry id of `escrow`.
    async fn registry_id(&self, escrow: Address) -> Result<EscrowId, EscrowError> {
        Ok(self.escrow_snapshot(escrow).await?.registry_id)
    }

    /// Deal token of `escrow`.
    async fn token(&self, escrow: Address) -> Result<Address, EscrowError> {
        Ok(self.escrow_snapshot(escrow).await?.token)
    }

    /// Seller of `escrow`.
    async fn seller(&self, escrow: Address) -> Result<Address, EscrowError> {
        Ok(self.escrow_snapshot(escrow).await?.seller)
    }

    /// Buyer of `escrow`.
    async fn buyer(&self, escrow: Address) -> Result<Address, EscrowError> {
        Ok(self.escrow_snapshot(escrow).await?.buyer)
    }

    /// Deal amount of `escrow`.
    async fn amount(&self, escrow: Address) -> Result<U256, EscrowError> {
        Ok(self.escrow_snapshot(escrow).await?.amount)
    }

    /// Trusted forwarder copied into `escrow`.
    async fn escrow_relay_identity(&self, escrow: Address) -> Result<Address, EscrowError> {
        Ok(self.escrow_snapshot(escrow).await?.relay_identity)
    }
}
