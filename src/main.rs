//! EVM wallet pipeline CLI
//!
//! # Architecture Overview
//!
//! ```text
//!   mnemonic / import                      send / balance / status
//!        │                                          │
//!        ▼                                          ▼
//!   ┌─────────┐    ┌─────────┐    ┌─────────────────────────────────┐
//!   │  keys   │───▶│  vault  │───▶│            pipeline             │
//!   │ BIP-39  │    │ Argon2 +│    │  builder → signer → broadcast   │
//!   │ BIP-32  │    │ AES-GCM │    └───────┬────────────────┬────────┘
//!   └─────────┘    └─────────┘            │                │
//!                                         ▼                ▼
//!                                   ┌──────────┐     ┌──────────┐
//!                                   │   rpc    │◀────│ tracker  │
//!                                   │ limiter  │     │ polling  │
//!                                   └──────────┘     └──────────┘
//!
//!   Cross-cutting: config, observability, resilience, lifecycle
//! ```
//!
//! Secrets never come from arguments: the recovery phrase is read from
//! `WALLET_MNEMONIC` and the vault credential from `WALLET_CREDENTIAL`.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use alloy::primitives::{utils::format_ether, TxHash};
use clap::{Parser, Subcommand};
use zeroize::Zeroizing;

use wallet_pipeline::config::{default_config, load_config, WalletConfig};
use wallet_pipeline::keys::{
    derive_account, entropy_bits_for_words, generate_mnemonic, mnemonic_to_seed, parse_address,
    to_checksum, DerivationPath, Mnemonic,
};
use wallet_pipeline::lifecycle::shutdown_on_signal;
use wallet_pipeline::observability::logging::init_logging;
use wallet_pipeline::observability::metrics::init_metrics;
use wallet_pipeline::rpc::{ChainRpc, RpcClient};
use wallet_pipeline::transaction::{parse_amount, TransactionRequest};
use wallet_pipeline::vault::{AllowAll, Credential, KeyVault};
use wallet_pipeline::{PipelineError, WalletContext};

const MNEMONIC_ENV_VAR: &str = "WALLET_MNEMONIC";
const CREDENTIAL_ENV_VAR: &str = "WALLET_CREDENTIAL";

#[derive(Parser)]
#[command(name = "wallet-pipeline")]
#[command(about = "Derive, store and spend EVM wallet keys", long_about = None)]
struct Cli {
    /// TOML configuration file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a new recovery phrase
    Mnemonic {
        #[arg(short, long, default_value_t = 12)]
        words: usize,
    },
    /// Derive an account from WALLET_MNEMONIC and store it in the vault
    Import {
        wallet: String,
        #[arg(long, default_value_t = 0)]
        account: u32,
        #[arg(long, default_value_t = 0)]
        index: u32,
        #[arg(long, default_value = "")]
        passphrase: String,
    },
    /// Print the address of a stored wallet
    Address { wallet: String },
    /// Query the balance of a stored wallet or any address
    Balance { target: String },
    /// Send ether from a stored wallet
    Send {
        wallet: String,
        to: String,
        /// Amount in ether, e.g. 0.25
        amount: String,
        /// Wait until the transaction is final
        #[arg(long)]
        wait: bool,
    },
    /// Look up the receipt of a transaction
    Status { hash: TxHash },
    /// List stored wallets
    List,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let loaded = match &cli.config {
        Some(path) => load_config(path),
        None => default_config(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    init_logging(&config.observability);

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    match run(cli.command, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            eprintln!("Hint: {}", e.hint());
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Commands, config: WalletConfig) -> Result<(), PipelineError> {
    let vault = Arc::new(KeyVault::from_config(&config.vault));

    match command {
        Commands::Mnemonic { words } => {
            let bits = entropy_bits_for_words(words)?;
            println!("{}", generate_mnemonic(bits)?.phrase());
        }
        Commands::Import {
            wallet,
            account,
            index,
            passphrase,
        } => {
            let phrase = Zeroizing::new(secret_env(MNEMONIC_ENV_VAR)?);
            let mnemonic = Mnemonic::parse(&phrase)?;
            let seed = mnemonic_to_seed(&mnemonic, &passphrase)?;
            let derived = derive_account(&seed, &DerivationPath::ethereum(account, index)?)?;

            vault.store(&wallet, &derived.private_key, &credential()?).await?;
            println!("{} {} {}", wallet, derived.path, to_checksum(&derived.address));
        }
        Commands::Address { wallet } => {
            let unlocked = vault.unlock(&AllowAll, &wallet, &credential()?).await?;
            println!("{}", to_checksum(&unlocked.address()));
        }
        Commands::Balance { target } => {
            let rpc = RpcClient::connect(config.rpc.clone(), &config.rate_limit).await?;
            let address = match parse_address(&target) {
                Ok(address) => address,
                Err(_) => vault.unlock(&AllowAll, &target, &credential()?).await?.address(),
            };
            let balance = rpc.get_balance(address).await?;
            println!("{} ETH", format_ether(balance));
        }
        Commands::Send {
            wallet,
            to,
            amount,
            wait,
        } => {
            let rpc = Arc::new(RpcClient::connect(config.rpc.clone(), &config.rate_limit).await?);
            let credential = credential()?;
            let context =
                WalletContext::open(&config, wallet, &credential, rpc, vault, Arc::new(AllowAll))
                    .await?;

            let request = TransactionRequest::transfer(to, parse_amount(&amount)?);
            let signed = context.send(request, &credential).await?;
            println!("{}", signed.hash);

            if wait {
                tokio::spawn(shutdown_on_signal(Arc::clone(context.shutdown())));
                match context.track(signed.hash).await {
                    Ok(status) => println!("{}", status?),
                    Err(e) => {
                        tracing::error!(tx_hash = %signed.hash, error = %e, "Tracking task failed")
                    }
                }
            }
        }
        Commands::Status { hash } => {
            let rpc = RpcClient::connect(config.rpc.clone(), &config.rate_limit).await?;
            match rpc.get_receipt(hash).await? {
                Some(receipt) => println!(
                    "{} block={} gas_used={}",
                    if receipt.success { "success" } else { "reverted" },
                    receipt
                        .block_number
                        .map_or_else(|| "pending".to_string(), |n| n.to_string()),
                    receipt.gas_used.unwrap_or_default()
                ),
                None if rpc.is_transaction_known(hash).await? => println!("pending"),
                None => println!("unknown"),
            }
        }
        Commands::List => {
            for wallet in vault.list().await? {
                println!("{}", wallet);
            }
        }
    }

    Ok(())
}

fn secret_env(name: &'static str) -> Result<String, PipelineError> {
    match std::env::var(name) {
        Ok(value) if !value.is_empty() => Ok(value),
        _ => Err(PipelineError::MissingSecret(name)),
    }
}

fn credential() -> Result<Credential, PipelineError> {
    Ok(Credential::new(secret_env(CREDENTIAL_ENV_VAR)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_secret_is_an_error() {
        let err = secret_env("WALLET_PIPELINE_TEST_NEVER_SET").unwrap_err();
        assert!(matches!(err, PipelineError::MissingSecret("WALLET_PIPELINE_TEST_NEVER_SET")));
    }

    #[test]
    fn test_empty_secret_is_an_error() {
        std::env::set_var("WALLET_PIPELINE_TEST_EMPTY", "");
        let err = secret_env("WALLET_PIPELINE_TEST_EMPTY").unwrap_err();
        assert!(matches!(err, PipelineError::MissingSecret("WALLET_PIPELINE_TEST_EMPTY")));

        std::env::set_var("WALLET_PIPELINE_TEST_SET", "hunter2");
        assert_eq!(secret_env("WALLET_PIPELINE_TEST_SET").unwrap(), "hunter2");
    }
}
