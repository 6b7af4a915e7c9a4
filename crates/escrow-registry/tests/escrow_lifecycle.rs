//! End-to-end escrow lifecycle tests.
//!
//! Each test drives a registry service backed by the in-memory ledger and
//! event log: create, fund, reveal, and check balances, tallies and events.

use escrow_registry::prelude::*;

// =============================================================================
// TEST HELPERS
// =============================================================================

const DEPLOYER: Address = Address([0xde; 20]);
const RELAY: Address = Address([0x01; 20]);
const SELLER: Address = Address([0x02; 20]);
const BUYER: Address = Address([0x03; 20]);
const ARBITRATOR: Address = Address([0x04; 20]);
const TOKEN: Address = Address([0x70; 20]);

const DEAL: u64 = 1_000_000;

/// The six secrets, in commitment slot order.
const SECRETS: [&str; 6] = [
    "sellerSecretToReleaseToSeller",
    "sellerSecretToReleaseToBuyer",
    "buyerSecretToReleaseToSeller",
    "buyerSecretToReleaseToBuyer",
    "arbitratorSecretToReleaseToSeller",
    "arbitratorSecretToReleaseToBuyer",
];

const SELLER_TO_SELLER: usize = 0;
const SELLER_TO_BUYER: usize = 1;
const BUYER_TO_SELLER: usize = 2;
const BUYER_TO_BUYER: usize = 3;
const ARBITRATOR_TO_SELLER: usize = 4;
const ARBITRATOR_TO_BUYER: usize = 5;

type Service = EscrowRegistryService<InMemoryTokenLedger, InMemoryEventLog>;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("escrow_registry=debug")
        .with_test_writer()
        .try_init();
}

fn service_with(policy: RepeatRevealPolicy) -> Service {
    init_tracing();
    let config = RegistryConfig {
        deployer: DEPLOYER,
        relay_identity: RELAY,
        repeat_reveals: policy,
        ..RegistryConfig::default()
    };
    create_in_memory_service(config).expect("valid config")
}

fn service() -> Service {
    service_with(RepeatRevealPolicy::Reject)
}

fn commitment(index: usize) -> Hash {
    double_hash(SECRETS[index].as_bytes())
}

fn reveal(index: usize) -> Hash {
    reveal_hash(SECRETS[index].as_bytes())
}

fn target_of(index: usize) -> Address {
    if index % 2 == 0 {
        SELLER
    } else {
        BUYER
    }
}

fn caller_of(index: usize) -> Address {
    [SELLER, BUYER, ARBITRATOR][index / 2]
}

fn deal_request(salt: &str) -> CreateEscrowRequest {
    CreateEscrowRequest {
        token: TOKEN,
        amount: U256::from(DEAL),
        seller: SELLER,
        buyer: BUYER,
        seller_commitments: [commitment(0), commitment(1)],
        buyer_commitments: [commitment(2), commitment(3)],
        arbitrator_commitments: [commitment(4), commitment(5)],
        salt: salt_from_label(salt).expect("salt"),
    }
}

async fn create_funded(service: &Service, salt: &str, funding: u64) -> Address {
    let escrow = service
        .create_escrow(CallOrigin::direct(SELLER), deal_request(salt))
        .await
        .expect("create");
    service
        .ledger()
        .mint(TOKEN, escrow, U256::from(funding))
        .expect("mint");
    escrow
}

async fn reveal_as(
    service: &Service,
    escrow: Address,
    index: usize,
) -> Result<RevealReceipt, EscrowError> {
    service
        .reveal_secret_to_release_to(CallOrigin::direct(caller_of(index)), escrow, reveal(index))
        .await
}

fn balance(service: &Service, holder: Address) -> U256 {
    service.ledger().balance(TOKEN, holder)
}

// =============================================================================
// COMMITMENT MAPPING
// =============================================================================

#[tokio::test]
async fn test_each_secret_maps_to_its_target() {
    let service = service();
    let escrow = create_funded(&service, "mapping", DEAL).await;

    for index in 0..SECRETS.len() {
        assert_eq!(
            service.secret_to_address(escrow, commitment(index)).await.unwrap(),
            target_of(index),
            "secret {index}"
        );
    }
    assert_eq!(service.to_address_votes(escrow, SELLER).await.unwrap(), 0);
    assert_eq!(service.to_address_votes(escrow, BUYER).await.unwrap(), 0);
}

#[tokio::test]
async fn test_each_single_reveal_votes_for_its_target() {
    for index in 0..SECRETS.len() {
        let service = service();
        let escrow = create_funded(&service, "single", DEAL).await;

        let receipt = reveal_as(&service, escrow, index).await.unwrap();
        assert_eq!(receipt.to, target_of(index));
        assert_eq!(receipt.votes, 1);
        assert!(!receipt.resolved());
        assert_eq!(
            service.to_address_votes(escrow, target_of(index)).await.unwrap(),
            1
        );
        assert_eq!(
            service.events().emitted_by(escrow),
            vec![EscrowEvent::SecretRevealedToReleaseTo { to: target_of(index) }]
        );
    }
}

#[tokio::test]
async fn test_accessors_expose_terms() {
    let service = service();
    let escrow = create_funded(&service, "terms", DEAL).await;

    assert_eq!(service.registry_id(escrow).await.unwrap(), 0);
    assert_eq!(service.token(escrow).await.unwrap(), TOKEN);
    assert_eq!(service.seller(escrow).await.unwrap(), SELLER);
    assert_eq!(service.buyer(escrow).await.unwrap(), BUYER);
    assert_eq!(service.amount(escrow).await.unwrap(), U256::from(DEAL));
    assert_eq!(service.escrow_relay_identity(escrow).await.unwrap(), RELAY);
    assert_eq!(service.relay_identity(), RELAY);

    let snapshot = service.escrow_snapshot(escrow).await.unwrap();
    assert_eq!(snapshot.status, EscrowStatus::Open);
    assert_eq!(snapshot.address, escrow);
}

// =============================================================================
// RESOLUTION SCENARIOS
// =============================================================================

#[tokio::test]
async fn test_seller_and_buyer_agree_on_seller() {
    let service = service();
    let escrow = create_funded(&service, "agree-seller", DEAL).await;

    reveal_as(&service, escrow, SELLER_TO_SELLER).await.unwrap();
    let receipt = reveal_as(&service, escrow, BUYER_TO_SELLER).await.unwrap();

    assert_eq!(
        receipt.resolution,
        Some(Resolution {
            to: SELLER,
            released: U256::from(DEAL),
            swept: U256::zero(),
        })
    );
    assert_eq!(balance(&service, SELLER), U256::from(DEAL));
    assert_eq!(balance(&service, escrow), U256::zero());
    assert_eq!(balance(&service, service.registry_address()), U256::zero());

    assert_eq!(
        service.events().emitted_by(escrow),
        vec![
            EscrowEvent::SecretRevealedToReleaseTo { to: SELLER },
            EscrowEvent::SecretRevealedToReleaseTo { to: SELLER },
            EscrowEvent::TokensReleased {
                token: TOKEN,
                to: SELLER,
                amount: U256::from(DEAL),
            },
        ]
    );
    assert_eq!(
        service.events().emitted_by(service.registry_address()).last(),
        Some(&EscrowEvent::EscrowClosed {
            id: 0,
            escrow,
            token: TOKEN,
            seller: SELLER,
            buyer: BUYER,
            amount: U256::from(DEAL),
        })
    );

    // The instance is gone
    assert_eq!(
        reveal_as(&service, escrow, ARBITRATOR_TO_BUYER).await,
        Err(EscrowError::EscrowClosed(escrow))
    );
    assert_eq!(
        service.secret_to_address(escrow, commitment(0)).await,
        Err(EscrowError::EscrowClosed(escrow))
    );
}

#[tokio::test]
async fn test_surplus_swept_to_registry() {
    let service = service();
    let escrow = create_funded(&service, "surplus", 1_450_000).await;

    reveal_as(&service, escrow, SELLER_TO_BUYER).await.unwrap();
    let receipt = reveal_as(&service, escrow, BUYER_TO_BUYER).await.unwrap();

    assert_eq!(receipt.resolution.map(|r| r.swept), Some(U256::from(450_000u64)));
    assert_eq!(balance(&service, BUYER), U256::from(DEAL));
    assert_eq!(
        balance(&service, service.registry_address()),
        U256::from(450_000u64)
    );
    assert_eq!(balance(&service, escrow), U256::zero());
}

#[tokio::test]
async fn test_arbitrator_breaks_tie() {
    let service = service();
    let escrow = create_funded(&service, "tie", DEAL).await;

    reveal_as(&service, escrow, SELLER_TO_SELLER).await.unwrap();
    reveal_as(&service, escrow, BUYER_TO_BUYER).await.unwrap();
    assert_eq!(service.to_address_votes(escrow, SELLER).await.unwrap(), 1);
    assert_eq!(service.to_address_votes(escrow, BUYER).await.unwrap(), 1);
    assert_eq!(balance(&service, escrow), U256::from(DEAL));

    let receipt = reveal_as(&service, escrow, ARBITRATOR_TO_SELLER).await.unwrap();
    assert_eq!(receipt.resolution.map(|r| r.to), Some(SELLER));
    assert_eq!(balance(&service, SELLER), U256::from(DEAL));
    assert_eq!(balance(&service, BUYER), U256::zero());
}

#[tokio::test]
async fn test_arbitrator_sides_with_buyer() {
    let service = service();
    let escrow = create_funded(&service, "tie-buyer", DEAL).await;

    reveal_as(&service, escrow, BUYER_TO_SELLER).await.unwrap();
    reveal_as(&service, escrow, SELLER_TO_BUYER).await.unwrap();
    reveal_as(&service, escrow, ARBITRATOR_TO_BUYER).await.unwrap();

    assert_eq!(balance(&service, BUYER), U256::from(DEAL));
}

#[tokio::test]
async fn test_relayed_reveal_counts_like_direct() {
    let service = service();
    let escrow = create_funded(&service, "relayed", DEAL).await;

    service
        .reveal_secret_to_release_to(CallOrigin::relayed(RELAY, SELLER), escrow, reveal(SELLER_TO_SELLER))
        .await
        .unwrap();
    service
        .reveal_secret_to_release_to(CallOrigin::relayed(RELAY, BUYER), escrow, reveal(BUYER_TO_SELLER))
        .await
        .unwrap();
    assert_eq!(balance(&service, SELLER), U256::from(DEAL));
}

// =============================================================================
// REJECTIONS
// =============================================================================

#[tokio::test]
async fn test_wrong_secret_changes_nothing() {
    let service = service();
    let escrow = create_funded(&service, "wrong", DEAL).await;
    let events_before = service.events().len();

    for bogus in [
        reveal_hash(b"not a committed secret"),
        // The committed value itself is not a valid reveal
        commitment(SELLER_TO_SELLER),
        // Nor is the all-zero value
        Hash::ZERO,
    ] {
        assert_eq!(
            service
                .reveal_secret_to_release_to(CallOrigin::direct(SELLER), escrow, bogus)
                .await,
            Err(EscrowError::WrongSecret)
        );
    }

    assert_eq!(service.to_address_votes(escrow, SELLER).await.unwrap(), 0);
    assert_eq!(service.to_address_votes(escrow, BUYER).await.unwrap(), 0);
    assert_eq!(service.events().len(), events_before);
}

#[tokio::test]
async fn test_repeat_reveal_rejected_by_default() {
    let service = service();
    let escrow = create_funded(&service, "repeat", DEAL).await;

    reveal_as(&service, escrow, SELLER_TO_SELLER).await.unwrap();
    assert_eq!(
        reveal_as(&service, escrow, SELLER_TO_SELLER).await,
        Err(EscrowError::SecretAlreadyRevealed(commitment(SELLER_TO_SELLER)))
    );
    assert_eq!(service.to_address_votes(escrow, SELLER).await.unwrap(), 1);
    assert_eq!(balance(&service, SELLER), U256::zero());
}

#[tokio::test]
async fn test_repeat_reveal_resolves_when_permitted() {
    let service = service_with(RepeatRevealPolicy::Permit);
    let escrow = create_funded(&service, "repeat-permit", DEAL).await;

    reveal_as(&service, escrow, BUYER_TO_BUYER).await.unwrap();
    let receipt = reveal_as(&service, escrow, BUYER_TO_BUYER).await.unwrap();
    assert_eq!(receipt.resolution.map(|r| r.to), Some(BUYER));
    assert_eq!(balance(&service, BUYER), U256::from(DEAL));
}

// =============================================================================
// EXHAUSTIVE ORDERINGS
// =============================================================================

fn permutations(items: &[usize]) -> Vec<Vec<usize>> {
    if items.len() <= 1 {
        return vec![items.to_vec()];
    }
    let mut out = Vec::new();
    for (i, &first) in items.iter().enumerate() {
        let mut rest = items.to_vec();
        rest.remove(i);
        for mut tail in permutations(&rest) {
            tail.insert(0, first);
            out.push(tail);
        }
    }
    out
}

/// Every order of the six secrets resolves exactly once, to whichever side
/// first collects two votes, and rejects everything afterwards.
#[tokio::test]
async fn test_every_reveal_order_resolves_exactly_once() {
    let orders = permutations(&[0, 1, 2, 3, 4, 5]);
    assert_eq!(orders.len(), 720);

    for order in orders {
        let service = service();
        let escrow = create_funded(&service, "ordering", DEAL + 7).await;

        let mut seller_votes = 0;
        let mut buyer_votes = 0;
        let mut winner = None;

        for &index in &order {
            let result = reveal_as(&service, escrow, index).await;
            if winner.is_some() {
                assert_eq!(result, Err(EscrowError::EscrowClosed(escrow)), "order {order:?}");
                continue;
            }

            let receipt = result.unwrap_or_else(|e| panic!("order {order:?}: {e}"));
            let votes = if target_of(index) == SELLER {
                seller_votes += 1;
                seller_votes
            } else {
                buyer_votes += 1;
                buyer_votes
            };
            assert_eq!(receipt.votes, votes);

            if votes == RELEASE_THRESHOLD {
                assert!(receipt.resolved(), "order {order:?}");
                winner = Some(target_of(index));
            } else {
                assert!(!receipt.resolved(), "order {order:?}");
            }
        }

        let winner = winner.expect("some side must reach the threshold");
        let loser = if winner == SELLER { BUYER } else { SELLER };
        assert_eq!(balance(&service, winner), U256::from(DEAL));
        assert_eq!(balance(&service, loser), U256::zero());
        assert_eq!(balance(&service, service.registry_address()), U256::from(7u64));

        let stats = service.stats().await;
        assert_eq!(stats.escrows_resolved, 1);
        assert_eq!(stats.reveals_accepted + stats.reveals_rejected, 6);
    }
}
