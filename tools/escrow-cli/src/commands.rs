//! Subcommand implementations. Each returns the text printed to stdout.

use anyhow::{anyhow, ensure, Context, Result};
use escrow_registry::prelude::*;
use serde_json::json;
use tracing::info;

/// Secret, reveal value and commitment for `text` (or 32 random bytes).
pub fn secret(text: Option<&str>) -> String {
    let bytes = match text {
        Some(text) => text.as_bytes().to_vec(),
        None => generate_secret().to_vec(),
    };
    format!(
        "secret:     0x{}\nreveal:     {}\ncommitment: {}",
        hex::encode(&bytes),
        reveal_hash(&bytes).to_hex(),
        double_hash(&bytes).to_hex()
    )
}

/// Salt derived from `label`.
pub fn salt(label: &str) -> Result<String> {
    let salt = salt_from_label(label).with_context(|| format!("invalid salt label {label}"))?;
    Ok(salt.to_hex())
}

fn pair(name: &str, values: &[Hash]) -> Result<[Hash; 2]> {
    ensure!(
        values.len() == 2,
        "{name} needs exactly two commitments, got {}",
        values.len()
    );
    Ok([values[0], values[1]])
}

/// Builds a creation request from command line values.
#[allow(clippy::too_many_arguments)]
pub fn predict_request(
    token: Address,
    amount: &str,
    seller: Address,
    buyer: Address,
    seller_commitments: &[Hash],
    buyer_commitments: &[Hash],
    arbitrator_commitments: &[Hash],
    salt: &str,
) -> Result<CreateEscrowRequest> {
    Ok(CreateEscrowRequest {
        token,
        amount: U256::from_dec_str(amount).map_err(|e| anyhow!("invalid amount {amount}: {e:?}"))?,
        seller,
        buyer,
        seller_commitments: pair("seller", seller_commitments)?,
        buyer_commitments: pair("buyer", buyer_commitments)?,
        arbitrator_commitments: pair("arbitrator", arbitrator_commitments)?,
        salt: salt_from_label(salt).with_context(|| format!("invalid salt label {salt}"))?,
    })
}

/// Registry and predicted escrow address for `request` under `id`.
pub fn predict(config: &RegistryConfig, id: EscrowId, request: &CreateEscrowRequest) -> String {
    let registry = config.registry_address();
    let params = request.to_params(config.relay_identity, registry, id);
    let escrow = compute_escrow_address(registry, request.salt, &config.escrow_creation_code, &params);
    format!("registry: {}\nescrow:   {}", registry.to_hex(), escrow.to_hex())
}

/// Runs one deal against in-memory adapters: seller and arbitrator agree on
/// the seller. Returns the events as JSON lines plus a closing summary.
pub async fn demo(config: RegistryConfig, amount: u64, surplus: u64) -> Result<String> {
    let service = create_in_memory_service(config)?;

    let seller = Address::new([0x5e; 20]);
    let buyer = Address::new([0xb7; 20]);
    let arbitrator = Address::new([0xa7; 20]);
    let token = Address::new([0x70; 20]);

    let secrets: Vec<[u8; 32]> = (0..6).map(|_| generate_secret()).collect();
    let commit = |i: usize| double_hash(&secrets[i]);

    let request = CreateEscrowRequest {
        token,
        amount: U256::from(amount),
        seller,
        buyer,
        seller_commitments: [commit(0), commit(1)],
        buyer_commitments: [commit(2), commit(3)],
        arbitrator_commitments: [commit(4), commit(5)],
        salt: salt_from_label("demo")?,
    };

    let escrow = service
        .create_escrow(CallOrigin::direct(seller), request)
        .await?;
    service
        .ledger()
        .mint(token, escrow, U256::from(amount) + U256::from(surplus))?;

    service
        .reveal_secret_to_release_to(CallOrigin::direct(seller), escrow, reveal_hash(&secrets[0]))
        .await?;
    let receipt = service
        .reveal_secret_to_release_to(CallOrigin::direct(arbitrator), escrow, reveal_hash(&secrets[4]))
        .await?;
    ensure!(receipt.resolved(), "demo escrow did not resolve");
    info!(escrow = %escrow, amount, surplus, "demo escrow resolved to seller");

    let mut lines = service
        .events()
        .records()
        .iter()
        .map(EventRecord::to_json)
        .collect::<Result<Vec<_>, _>>()?;

    let ledger = service.ledger();
    lines.push(
        json!({
            "escrow": escrow.to_hex(),
            "seller_balance": ledger.balance(token, seller).to_string(),
            "buyer_balance": ledger.balance(token, buyer).to_string(),
            "registry_balance": ledger.balance(token, service.registry_address()).to_string(),
        })
        .to_string(),
    );
    Ok(lines.join("\n"))
}
