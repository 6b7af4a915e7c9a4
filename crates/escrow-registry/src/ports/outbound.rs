//! # Driven Ports (SPI - Outbound)
//!
//! Collaborators the registry depends on:
//! - `TokenLedger`: the fungible-token value store escrows move funds through
//! - `EventSink`: where emitted events go once a call has succeeded

use crate::domain::entities::Transfer;
use crate::domain::value_objects::{Address, U256};
use crate::errors::TokenError;
use crate::events::EventRecord;
use async_trait::async_trait;

// =============================================================================
// TOKEN LEDGER
// =============================================================================

/// Minimal fungible-token ledger.
///
/// Balances are keyed by `(token, holder)`. Escrows only ever read balances
/// and move value; minting is left to concrete adapters for fixtures.
#[async_trait]
pub trait TokenLedger: Send + Sync {
    /// Balance of `holder` in `token` (zero if never credited).
    async fn balance_of(&self, token: Address, holder: Address) -> Result<U256, TokenError>;

    /// Moves `amount` of `token` from `from` to `to`.
    async fn transfer(
        &self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), TokenError>;

    /// Applies a batch of transfers out of `from`, all or nothing.
    ///
    /// # Implementation Notes
    ///
    /// If any transfer in the batch fails, no balance may have changed when
    /// this returns.
    async fn settle(
        &self,
        token: Address,
        from: Address,
        transfers: &[Transfer],
    ) -> Result<(), TokenError>;
}

// =============================================================================
// EVENT SINK
// =============================================================================

/// Destination for published events.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Publishes the events of one successful call, in order.
    async fn publish(&self, records: Vec<EventRecord>);
}
