//! # Domain Services
//!
//! Pure functions for commitments and deterministic addressing.
//! These functions are deterministic and have no side effects, so clients can
//! run them off-chain to learn an escrow's custody address before it exists.
//!
//! | Function | Rule |
//! |----------|------|
//! | `reveal_hash` | `H(secret)` |
//! | `double_hash` | `H(H(secret))` |
//! | `compute_contract_address` | `H(rlp([sender, nonce]))[12:]` |
//! | `compute_contract_address_create2` | `H(0xff ++ sender ++ salt ++ H(init_code))[12:]` |
//! | `compute_escrow_address` | CREATE2 over `creation_code ++ abi(args)` |

use crate::domain::entities::EscrowParams;
use crate::domain::value_objects::{Address, Hash, ParseHexError, U256};
use rand::RngCore;
use sha3::{Digest, Keccak256};

// =============================================================================
// KECCAK256 / COMMITMENTS
// =============================================================================

/// Computes keccak256 hash of data.
#[must_use]
pub fn keccak256(data: &[u8]) -> Hash {
    let hash = Keccak256::digest(data);
    Hash::new(hash.into())
}

/// The value a voter submits to cast a vote: `H(secret)`.
#[must_use]
pub fn reveal_hash(secret: &[u8]) -> Hash {
    keccak256(secret)
}

/// The commitment stored at creation for a secret: `H(H(secret))`.
#[must_use]
pub fn double_hash(secret: &[u8]) -> Hash {
    commitment_of(&reveal_hash(secret))
}

/// Maps a revealed value to the commitment it opens.
#[must_use]
pub fn commitment_of(revealed: &Hash) -> Hash {
    keccak256(revealed.as_bytes())
}

/// Generate a cryptographically secure random secret.
#[must_use]
pub fn generate_secret() -> [u8; 32] {
    let mut secret = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut secret);
    secret
}

/// Derives a 32-byte salt from a label.
///
/// `0x`-prefixed labels are taken as literal 32-byte hex; anything else is
/// lower-cased and hashed.
pub fn salt_from_label(label: &str) -> Result<Hash, ParseHexError> {
    let label = label.to_lowercase();
    if label.starts_with("0x") {
        label.parse()
    } else {
        Ok(keccak256(label.as_bytes()))
    }
}

// =============================================================================
// CONTRACT ADDRESS COMPUTATION
// =============================================================================

/// Computes the contract address for CREATE opcode.
///
/// Address = keccak256(rlp(\[sender, nonce\]))\[12:\]
///
/// Used to place the registry itself at its deployer's next address.
#[must_use]
pub fn compute_contract_address(sender: Address, nonce: u64) -> Address {
    let mut rlp_data = Vec::with_capacity(64);
    let mut content = Vec::with_capacity(32);

    // RLP encode address (20 bytes, 0x80 + 20 = 0x94)
    content.push(0x94);
    content.extend_from_slice(sender.as_bytes());

    if nonce == 0 {
        content.push(0x80);
    } else if nonce < 128 {
        content.push(nonce as u8);
    } else {
        let nonce_bytes = trim_leading_zeros(nonce);
        content.push(0x80 + nonce_bytes.len() as u8);
        content.extend_from_slice(&nonce_bytes);
    }

    // content is at most 1 + 20 + 1 + 8 bytes, always a short list
    rlp_data.push(0xc0 + content.len() as u8);
    rlp_data.extend_from_slice(&content);

    let hash = Keccak256::digest(&rlp_data);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..32]);
    Address::new(addr)
}

/// Computes the contract address for CREATE2 opcode.
///
/// Address = keccak256(0xff ++ sender ++ salt ++ `keccak256(init_code)`)\[12:\]
///
/// Per EIP-1014.
#[must_use]
pub fn compute_contract_address_create2(sender: Address, salt: Hash, init_code: &[u8]) -> Address {
    let code_hash = Keccak256::digest(init_code);

    let mut data = Vec::with_capacity(85);
    data.push(0xff);
    data.extend_from_slice(sender.as_bytes());
    data.extend_from_slice(salt.as_bytes());
    data.extend_from_slice(&code_hash);

    let hash = Keccak256::digest(&data);
    let mut addr = [0u8; 20];
    addr.copy_from_slice(&hash[12..32]);
    Address::new(addr)
}

fn trim_leading_zeros(value: u64) -> Vec<u8> {
    let bytes = value.to_be_bytes();
    let start = bytes.iter().position(|&b| b != 0).unwrap_or(7);
    bytes[start..].to_vec()
}

// =============================================================================
// ESCROW INIT PAYLOAD
// =============================================================================

/// Number of 32-byte words in the escrow constructor arguments.
pub const ESCROW_ARG_WORDS: usize = 13;

fn push_address(buf: &mut Vec<u8>, address: &Address) {
    buf.extend_from_slice(&[0u8; 12]);
    buf.extend_from_slice(address.as_bytes());
}

fn push_uint(buf: &mut Vec<u8>, value: U256) {
    let mut word = [0u8; 32];
    value.to_big_endian(&mut word);
    buf.extend_from_slice(&word);
}

fn push_pair(buf: &mut Vec<u8>, pair: &[Hash; 2]) {
    for hash in pair {
        buf.extend_from_slice(hash.as_bytes());
    }
}

/// ABI-encodes the escrow constructor arguments (static encoding).
///
/// Order: relay, registry, id, token, amount, seller, buyer, then the three
/// `bytes32[2]` commitment pairs (seller, buyer, arbitrator).
#[must_use]
pub fn encode_escrow_args(params: &EscrowParams) -> Vec<u8> {
    let mut buf = Vec::with_capacity(ESCROW_ARG_WORDS * 32);
    push_address(&mut buf, &params.relay_identity);
    push_address(&mut buf, &params.registry);
    push_uint(&mut buf, U256::from(params.registry_id));
    push_address(&mut buf, &params.token);
    push_uint(&mut buf, params.amount);
    push_address(&mut buf, &params.seller);
    push_address(&mut buf, &params.buyer);
    push_pair(&mut buf, &params.seller_commitments);
    push_pair(&mut buf, &params.buyer_commitments);
    push_pair(&mut buf, &params.arbitrator_commitments);
    buf
}

/// Full initialization payload: creation code followed by encoded arguments.
#[must_use]
pub fn escrow_init_code(creation_code: &[u8], params: &EscrowParams) -> Vec<u8> {
    let mut init_code = Vec::with_capacity(creation_code.len() + ESCROW_ARG_WORDS * 32);
    init_code.extend_from_slice(creation_code);
    init_code.extend_from_slice(&encode_escrow_args(params));
    init_code
}

/// Predicts the address an escrow will occupy once `deployer` creates it.
///
/// The registry uses this same function at creation time, so an off-chain
/// prediction with identical inputs always matches the recorded address.
#[must_use]
pub fn compute_escrow_address(
    deployer: Address,
    salt: Hash,
    creation_code: &[u8],
    params: &EscrowParams,
) -> Address {
    compute_contract_address_create2(deployer, salt, &escrow_init_code(creation_code, params))
}

// =============================================================================
// TESTS
// =============================================================================
