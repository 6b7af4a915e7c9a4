//! escrow-cli: off-chain utility for hashlock escrows.
//!
//! Generates secrets and commitments, derives salts, predicts instance
//! addresses before creation, and runs a local end-to-end demo against the
//! in-memory ledger.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};
use escrow_registry::prelude::{Address, Hash, RegistryConfig};
use std::env;
use tracing_subscriber::EnvFilter;

/// escrow-cli: secrets, salts and deterministic escrow addresses
#[derive(Parser, Debug)]
#[command(name = "escrow-cli", version)]
#[command(about = "Off-chain utility for hash-locked 2-of-3 escrows")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print a secret with its reveal value and commitment
    Secret {
        /// Use this text as the secret instead of 32 random bytes
        #[arg(long)]
        text: Option<String>,
    },

    /// Derive the 32-byte salt for a label
    Salt {
        /// Free-form label, or 0x-prefixed 32-byte hex
        label: String,
    },

    /// Predict the address an escrow will be created at
    Predict {
        /// Registry id the escrow will receive
        #[arg(long)]
        id: u64,
        /// Deal token
        #[arg(long)]
        token: Address,
        /// Deal amount (decimal)
        #[arg(long)]
        amount: String,
        /// Seller address
        #[arg(long)]
        seller: Address,
        /// Buyer address
        #[arg(long)]
        buyer: Address,
        /// Seller commitments: to-seller,to-buyer
        #[arg(long, value_delimiter = ',')]
        seller_commitments: Vec<Hash>,
        /// Buyer commitments: to-seller,to-buyer
        #[arg(long, value_delimiter = ',')]
        buyer_commitments: Vec<Hash>,
        /// Arbitrator commitments: to-seller,to-buyer
        #[arg(long, value_delimiter = ',')]
        arbitrator_commitments: Vec<Hash>,
        /// Salt label (see `salt`)
        #[arg(long)]
        salt: String,
    },

    /// Run an in-memory deal end to end and print its events as JSON lines
    Demo {
        /// Deal amount
        #[arg(long, default_value = "1000000")]
        amount: u64,
        /// Extra funding beyond the deal amount, swept to the registry
        #[arg(long, default_value = "0")]
        surplus: u64,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(env::var("ESCROW_LOG_LEVEL").unwrap_or_else(|_| "info".into())))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    init_logging();

    let output = match args.command {
        Command::Secret { text } => commands::secret(text.as_deref()),
        Command::Salt { label } => commands::salt(&label)?,
        Command::Predict {
            id,
            token,
            amount,
            seller,
            buyer,
            seller_commitments,
            buyer_commitments,
            arbitrator_commitments,
            salt,
        } => {
            let config = RegistryConfig::from_env()?;
            let request = commands::predict_request(
                token,
                &amount,
                seller,
                buyer,
                &seller_commitments,
                &buyer_commitments,
                &arbitrator_commitments,
                &salt,
            )?;
            commands::predict(&config, id, &request)
        }
        Command::Demo { amount, surplus } => {
            let config = RegistryConfig::from_env()?;
            commands::demo(config, amount, surplus).await?
        }
    };

    println!("{output}");
    Ok(())
}
