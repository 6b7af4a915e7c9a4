//! In-memory token ledger.
//!
//! Implements `TokenLedger` over a single map of `(token, holder)` balances.
//! `mint` exists for fixtures and the demo; escrows never call it.

use crate::domain::entities::Transfer;
use crate::domain::value_objects::{Address, U256};
use crate::errors::TokenError;
use crate::ports::outbound::TokenLedger;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// In-memory multi-token ledger for tests, demos and local runs.
pub struct InMemoryTokenLedger {
    balances: RwLock<HashMap<(Address, Address), U256>>,
    available: AtomicBool,
}

impl InMemoryTokenLedger {
    /// Create an empty ledger.
    pub fn new() -> Self {
        Self {
            balances: RwLock::new(HashMap::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Credits `amount` of `token` to `to` out of thin air.
    pub fn mint(&self, token: Address, to: Address, amount: U256) -> Result<(), TokenError> {
        let mut balances = self.balances.write();
        let entry = balances.entry((token, to)).or_insert_with(U256::zero);
        *entry = entry.checked_add(amount).ok_or(TokenError::Overflow)?;
        debug!(token = %token, to = %to, %amount, "minted");
        Ok(())
    }

    /// Balance without going through the async port.
    pub fn balance(&self, token: Address, holder: Address) -> U256 {
        self.balances
            .read()
            .get(&(token, holder))
            .copied()
            .unwrap_or_default()
    }

    /// Simulates the ledger going offline (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<(), TokenError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(TokenError::Unavailable("ledger offline".into()))
        }
    }
}

impl Default for InMemoryTokenLedger {
    fn default() -> Self {
        Self::new()
    }
}

/// Applies transfers to `balances`, leaving it untouched on error.
fn apply_transfers(
    balances: &mut HashMap<(Address, Address), U256>,
    token: Address,
    from: Address,
    transfers: &[Transfer],
) -> Result<(), TokenError> {
    // Validate against a scratch copy of the touched entries first
    let mut staged: HashMap<Address, U256> = HashMap::new();
    let read = |staged: &HashMap<Address, U256>, holder: Address| {
        staged
            .get(&holder)
            .copied()
            .or_else(|| balances.get(&(token, holder)).copied())
            .unwrap_or_default()
    };

    for transfer in transfers {
        let available = read(&staged, from);
        let remaining = available
            .checked_sub(transfer.amount)
            .ok_or(TokenError::InsufficientBalance {
                holder: from,
                required: transfer.amount,
                available,
            })?;
        staged.insert(from, remaining);

        let credited = read(&staged, transfer.to)
            .checked_add(transfer.amount)
            .ok_or(TokenError::Overflow)?;
        staged.insert(transfer.to, credited);
    }

    for (holder, balance) in staged {
        balances.insert((token, holder), balance);
    }
    Ok(())
}

#[async_trait]
impl TokenLedger for InMemoryTokenLedger {
    async fn balance_of(&self, token: Address, holder: Address) -> Result<U256, TokenError> {
        self.ensure_available()?;
        Ok(self.balance(token, holder))
    }

    async fn transfer(
        &self,
        token: Address,
        from: Address,
        to: Address,
        amount: U256,
    ) -> Result<(), TokenError> {
        self.settle(token, from, &[Transfer { to, amount }]).await
    }

    async fn settle(
        &self,
        token: Address,
        from: Address,
        transfers: &[Transfer],
    ) -> Result<(), TokenError> {
        self.ensure_available()?;
        let mut balances = self.balances.write();
        apply_transfers(&mut balances, token, from, transfers)?;
        debug!(token = %token, from = %from, count = transfers.len(), "settled transfers");
        Ok(())
    }
}
