//! # Escrow Registry Service
//!
//! The registry factory and every escrow instance it created, behind one
//! injected service object.
//!
//! ## Atomicity
//!
//! Creation and reveal each run under a single lock over the registry state.
//! Nothing is mutated until every check, including the ledger settlement,
//! has passed, and events are published last. A failed call leaves state,
//! balances and the event log exactly as they were.
//!
//! ## Lifecycle
//!
//! `create_escrow` → zero or more `reveal_secret_to_release_to` → the vote
//! that reaches the threshold settles funds and tombstones the instance.
//! Tombstoned addresses reject every later call and can never be reused.

use crate::adapters::{InMemoryEventLog, InMemoryTokenLedger};
use crate::config::RegistryConfig;
use crate::domain::entities::{CallOrigin, Escrow, EscrowSnapshot, Settlement, Vote};
use crate::domain::invariants::{check_all_invariants, check_ledger_contiguity_invariant, InvariantCheckResult};
use crate::domain::services::compute_escrow_address;
use crate::domain::value_objects::{Address, EscrowId, Hash, U256};
use crate::errors::{ConfigError, EscrowError};
use crate::events::{EscrowEvent, EventRecord};
use crate::ports::inbound::{CreateEscrowRequest, EscrowRegistryApi, Resolution, RevealReceipt};
use crate::ports::outbound::{EventSink, TokenLedger};

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn, Span};
use uuid::Uuid;

/// Statistics for the registry service.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct ServiceStats {
    /// Escrows created.
    pub escrows_created: u64,
    /// Escrows resolved and closed.
    pub escrows_resolved: u64,
    /// Reveals counted.
    pub reveals_accepted: u64,
    /// Reveals rejected for any reason.
    pub reveals_rejected: u64,
    /// Creations rejected.
    pub creations_rejected: u64,
    /// Total released to winners.
    pub total_released: U256,
    /// Total swept back to the registry.
    pub total_swept: U256,
}

/// Mutable registry state: the id ledger plus live and closed instances.
#[derive(Debug, Default)]
struct RegistryState {
    escrow_count: u64,
    escrows: BTreeMap<EscrowId, Address>,
    instances: HashMap<Address, Escrow>,
    tombstones: HashSet<Address>,
}

impl RegistryState {
    fn live(&self, address: Address) -> Result<&Escrow, EscrowError> {
        if self.tombstones.contains(&address) {
            return Err(EscrowError::EscrowClosed(address));
        }
        self.instances
            .get(&address)
            .ok_or(EscrowError::UnknownEscrow(address))
    }

    fn live_mut(&mut self, address: Address) -> Result<&mut Escrow, EscrowError> {
        if self.tombstones.contains(&address) {
            return Err(EscrowError::EscrowClosed(address));
        }
        self.instances
            .get_mut(&address)
            .ok_or(EscrowError::UnknownEscrow(address))
    }

    fn is_occupied(&self, address: &Address) -> bool {
        self.instances.contains_key(address) || self.tombstones.contains(address)
    }
}

/// The registry and its escrow instances.
///
/// This service:
/// 1. Creates escrows at deterministic addresses and records them by id
/// 2. Verifies reveals and tallies votes per escrow
/// 3. Settles funds through the token ledger when a vote reaches the threshold
/// 4. Publishes events and maintains statistics
pub struct EscrowRegistryService<L: TokenLedger, E: EventSink> {
    /// Registry configuration.
    config: RegistryConfig,
    /// Resolved registry address.
    registry_address: Address,
    /// Token ledger adapter.
    ledger: Arc<L>,
    /// Event sink adapter.
    events: Arc<E>,
    /// Registry state, serialized per call.
    state: Mutex<RegistryState>,
    /// Service statistics.
    stats: Arc<RwLock<ServiceStats>>,
}

impl<L: TokenLedger, E: EventSink> EscrowRegistryService<L, E> {
    /// Create a new registry service.
    pub fn new(config: RegistryConfig, ledger: Arc<L>, events: Arc<E>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config, ledger, events))
    }

    fn build(config: RegistryConfig, ledger: Arc<L>, events: Arc<E>) -> Self {
        let registry_address = config.registry_address();
        info!(
            registry = %registry_address,
            relay = %config.relay_identity,
            policy = ?config.repeat_reveals,
            "escrow registry initialized"
        );
        Self {
            config,
            registry_address,
            ledger,
            events,
            state: Mutex::new(RegistryState::default()),
            stats: Arc::new(RwLock::new(ServiceStats::default())),
        }
    }

    /// Registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Token ledger adapter.
    pub fn ledger(&self) -> &Arc<L> {
        &self.ledger
    }

    /// Event sink adapter.
    pub fn events(&self) -> &Arc<E> {
        &self.events
    }

    /// Get current service statistics.
    pub async fn stats(&self) -> ServiceStats {
        self.stats.read().await.clone()
    }

    /// Address the next creation of `request` would land at.
    pub async fn predict_next_escrow_address(&self, request: &CreateEscrowRequest) -> Address {
        let id = self.state.lock().await.escrow_count;
        self.predict_escrow_address(id, request)
    }

    /// Records the effective caller on the current span.
    fn record_caller(&self, origin: &CallOrigin) {
        let caller = origin.effective_sender(self.config.relay_identity);
        Span::current().record("caller", tracing::field::display(caller));
    }

    async fn try_create(&self, request: CreateEscrowRequest) -> Result<Address, EscrowError> {
        let mut state = self.state.lock().await;

        if !check_ledger_contiguity_invariant(state.escrow_count, &state.escrows) {
            error!(count = state.escrow_count, entries = state.escrows.len(), "registry ledger is not contiguous");
            return Err(EscrowError::InvariantViolated("registry ledger is not contiguous".into()));
        }

        let id = state.escrow_count;
        let params = request.to_params(self.config.relay_identity, self.registry_address, id);
        let address = compute_escrow_address(
            self.registry_address,
            request.salt,
            &self.config.escrow_creation_code,
            &params,
        );

        if state.is_occupied(&address) {
            return Err(EscrowError::InstanceAlreadyExists(address));
        }

        state.instances.insert(address, Escrow::new(address, params));
        state.escrows.insert(id, address);
        state.escrow_count += 1;

        info!(id, escrow = %address, amount = %request.amount, "escrow created");

        self.events
            .publish(vec![EventRecord::new(
                self.registry_address,
                EscrowEvent::EscrowCreated {
                    id,
                    escrow: address,
                    token: request.token,
                    seller: request.seller,
                    buyer: request.buyer,
                    amount: request.amount,
                },
            )])
            .await;

        Ok(address)
    }

    async fn try_reveal(&self, escrow: Address, revealed: Hash) -> Result<RevealReceipt, EscrowError> {
        let mut state = self.state.lock().await;
        let policy = self.config.repeat_reveals;

        let instance = state.live(escrow)?;
        let vote = instance.tally(&revealed, policy)?;

        if !vote.reaches_threshold() {
            state.live_mut(escrow)?.apply(&vote);
            debug!(escrow = %escrow, to = %vote.to, votes = vote.votes_after, "vote counted");
            self.events
                .publish(vec![EventRecord::new(
                    escrow,
                    EscrowEvent::SecretRevealedToReleaseTo { to: vote.to },
                )])
                .await;
            return Ok(RevealReceipt {
                escrow,
                to: vote.to,
                votes: vote.votes_after,
                resolution: None,
            });
        }

        let settlement = self.settle(instance, &vote).await?;

        // Funds have moved; retire the instance
        let mut closed = state
            .instances
            .remove(&escrow)
            .ok_or(EscrowError::UnknownEscrow(escrow))?;
        closed.apply(&vote);
        state.tombstones.insert(escrow);

        let params = closed.params();
        info!(
            id = params.registry_id,
            escrow = %escrow,
            to = %vote.to,
            released = %settlement.release.amount,
            swept = %settlement.swept(),
            "escrow resolved"
        );

        self.events
            .publish(vec![
                EventRecord::new(escrow, EscrowEvent::SecretRevealedToReleaseTo { to: vote.to }),
                EventRecord::new(
                    escrow,
                    EscrowEvent::TokensReleased {
                        token: params.token,
                        to: vote.to,
                        amount: params.amount,
                    },
                ),
                EventRecord::new(
                    self.registry_address,
                    EscrowEvent::EscrowClosed {
                        id: params.registry_id,
                        escrow,
                        token: params.token,
                        seller: params.seller,
                        buyer: params.buyer,
                        amount: params.amount,
                    },
                ),
            ])
            .await;

        Ok(RevealReceipt {
            escrow,
            to: vote.to,
            votes: vote.votes_after,
            resolution: Some(Resolution {
                to: vote.to,
                released: settlement.release.amount,
                swept: settlement.swept(),
            }),
        })
    }

    /// Plans, checks and executes the settlement for a resolving vote.
    async fn settle(&self, instance: &Escrow, vote: &Vote) -> Result<Settlement, EscrowError> {
        let token = instance.token();
        let balance = self.ledger.balance_of(token, instance.address()).await?;
        let settlement = Settlement::plan(instance.amount(), balance, vote.to, instance.params().registry)?;

        if let InvariantCheckResult::Invalid(violations) =
            check_all_invariants(instance, vote, &settlement, balance)
        {
            let reason = violations
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join("; ");
            error!(escrow = %instance.address(), %reason, "settlement invariant violated");
            return Err(EscrowError::InvariantViolated(reason));
        }

        self.ledger
            .settle(token, instance.address(), &settlement.transfers())
            .await?;
        Ok(settlement)
    }
}

#[async_trait]
impl<L: TokenLedger, E: EventSink> EscrowRegistryApi for EscrowRegistryService<L, E> {
    #[instrument(
        skip(self, request),
        fields(correlation_id = %Uuid::new_v4(), caller = tracing::field::Empty)
    )]
    async fn create_escrow(
        &self,
        origin: CallOrigin,
        request: CreateEscrowRequest,
    ) -> Result<Address, EscrowError> {
        self.record_caller(&origin);
        match self.try_create(request).await {
            Ok(address) => {
                self.stats.write().await.escrows_created += 1;
                Ok(address)
            }
            Err(err) => {
                warn!(error = %err, "escrow creation rejected");
                self.stats.write().await.creations_rejected += 1;
                Err(err)
            }
        }
    }

    #[instrument(
        skip(self, revealed),
        fields(correlation_id = %Uuid::new_v4(), caller = tracing::field::Empty)
    )]
    async fn reveal_secret_to_release_to(
        &self,
        origin: CallOrigin,
        escrow: Address,
        revealed: Hash,
    ) -> Result<RevealReceipt, EscrowError> {
        self.record_caller(&origin);
        match self.try_reveal(escrow, revealed).await {
            Ok(receipt) => {
                let mut stats = self.stats.write().await;
                stats.reveals_accepted += 1;
                if let Some(resolution) = receipt.resolution {
                    stats.escrows_resolved += 1;
                    stats.total_released = stats.total_released.saturating_add(resolution.released);
                    stats.total_swept = stats.total_swept.saturating_add(resolution.swept);
                }
                Ok(receipt)
            }
            Err(err) => {
                warn!(error = %err, "reveal rejected");
                self.stats.write().await.reveals_rejected += 1;
                Err(err)
            }
        }
    }

    fn registry_address(&self) -> Address {
        self.registry_address
    }

    fn relay_identity(&self) -> Address {
        self.config.relay_identity
    }

    async fn escrow_count(&self) -> u64 {
        self.state.lock().await.escrow_count
    }

    async fn escrows(&self, id: EscrowId) -> Option<Address> {
        self.state.lock().await.escrows.get(&id).copied()
    }

    fn predict_escrow_address(&self, id: EscrowId, request: &CreateEscrowRequest) -> Address {
        let params = request.to_params(self.config.relay_identity, self.registry_address, id);
        compute_escrow_address(
            self.registry_address,
            request.salt,
            &self.config.escrow_creation_code,
            &params,
        )
    }

    async fn escrow_snapshot(&self, escrow: Address) -> Result<EscrowSnapshot, EscrowError> {
        Ok(self.state.lock().await.live(escrow)?.snapshot())
    }

    async fn secret_to_address(&self, escrow: Address, commitment: Hash) -> Result<Address, EscrowError> {
        Ok(self.state.lock().await.live(escrow)?.secret_to_address(&commitment))
    }

    async fn to_address_votes(&self, escrow: Address, to: Address) -> Result<u32, EscrowError> {
        Ok(self.state.lock().await.live(escrow)?.to_address_votes(&to))
    }
}

/// Create a service wired to in-memory adapters with default configuration.
pub fn create_test_service() -> EscrowRegistryService<InMemoryTokenLedger, InMemoryEventLog> {
    EscrowRegistryService::build(
        RegistryConfig::default(),
        Arc::new(InMemoryTokenLedger::new()),
        Arc::new(InMemoryEventLog::new()),
    )
}

/// Create a service wired to fresh in-memory adapters.
pub fn create_in_memory_service(
    config: RegistryConfig,
) -> Result<EscrowRegistryService<InMemoryTokenLedger, InMemoryEventLog>, ConfigError> {
    EscrowRegistryService::new(
        config,
        Arc::new(InMemoryTokenLedger::new()),
        Arc::new(InMemoryEventLog::new()),
    )
}
