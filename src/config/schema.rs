//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the wallet
//! pipeline. All types derive Serde traits for deserialization from TOML.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct WalletConfig {
    /// JSON-RPC endpoint settings.
    pub rpc: RpcConfig,

    /// Token bucket in front of the endpoint.
    pub rate_limit: RateLimitConfig,

    /// Retry policy for transport failures.
    pub retries: RetryConfig,

    /// Gas and fee resolution.
    pub gas: GasConfig,

    /// Transaction status polling.
    pub tracker: TrackerConfig,

    /// Encrypted key storage.
    pub vault: VaultConfig,

    /// Logging and metrics.
    pub observability: ObservabilityConfig,
}

/// JSON-RPC endpoint configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RpcConfig {
    /// JSON-RPC endpoint URL.
    pub url: String,

    /// Chain ID (e.g., 1 for Ethereum mainnet, 31337 for local Anvil).
    pub chain_id: u64,

    /// Deadline for a single RPC call in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for RpcConfig {
    fn default() -> Self {
        Self {
            url: "http://localhost:8545".to_string(),
            chain_id: 1,
            request_timeout_ms: 10_000,
        }
    }
}

/// Rate limiting configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitConfig {
    /// Sustained requests per second.
    pub requests_per_second: u32,

    /// Burst capacity.
    pub burst_size: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 25,
            burst_size: 50,
        }
    }
}

/// Retry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts (first try included).
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 200,
            max_delay_ms: 5_000,
        }
    }
}

/// Which fee fields new transactions carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FeeMarket {
    /// Single `gasPrice` (EIP-155 legacy transaction).
    Legacy,
    /// `maxFeePerGas` + `maxPriorityFeePerGas` (EIP-1559).
    #[default]
    Eip1559,
}

/// Gas and fee configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GasConfig {
    pub fee_market: FeeMarket,

    /// Added on top of `eth_estimateGas` (20 = 20% buffer).
    pub limit_margin_percent: u32,

    /// Added on top of the node's suggested price (0 = as suggested).
    pub price_bump_percent: u32,

    /// Maximum gas price / fee cap in gwei (protection against spikes).
    pub max_gas_price_gwei: u64,
}

impl Default for GasConfig {
    fn default() -> Self {
        Self {
            fee_market: FeeMarket::Eip1559,
            limit_margin_percent: 20,
            price_bump_percent: 10,
            max_gas_price_gwei: 500,
        }
    }
}

/// Transaction tracker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// First poll delay in milliseconds.
    pub poll_initial_ms: u64,

    /// Upper bound for the backed-off poll delay in milliseconds.
    pub poll_max_ms: u64,

    /// Blocks that must follow the receipt's block before it is final.
    pub confirmation_blocks: u64,

    /// Consecutive polls in which the node does not know the hash before
    /// the transaction is declared dropped.
    pub drop_after_polls: u32,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            poll_initial_ms: 1_000,
            poll_max_ms: 30_000,
            confirmation_blocks: 3,
            drop_after_polls: 20,
        }
    }
}

/// Key vault configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Directory holding one encrypted record per wallet.
    pub path: String,

    /// Argon2id time cost (passes over memory).
    pub kdf_iterations: u32,

    /// Argon2id memory cost in KiB.
    pub kdf_memory_kib: u32,

    /// Argon2id lanes.
    pub kdf_parallelism: u32,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            path: "wallet-vault".to_string(),
            kdf_iterations: 3,
            kdf_memory_kib: 64 * 1024,
            kdf_parallelism: 1,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit JSON lines instead of human-readable output.
    pub json_logs: bool,

    /// Enable the Prometheus exporter.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: WalletConfig = toml::from_str(
            r#"
            [rpc]
            url = "https://rpc.example.org"
            chain_id = 11155111

            [gas]
            fee_market = "legacy"
            "#,
        )
        .unwrap();

        assert_eq!(config.rpc.chain_id, 11155111);
        assert_eq!(config.rpc.request_timeout_ms, 10_000);
        assert_eq!(config.gas.fee_market, FeeMarket::Legacy);
        assert_eq!(config.gas.limit_margin_percent, 20);
        assert_eq!(config.tracker.confirmation_blocks, 3);
    }

    #[test]
    fn test_default_config() {
        let config = WalletConfig::default();
        assert_eq!(config.rpc.url, "http://localhost:8545");
        assert_eq!(config.retries.max_attempts, 3);
        assert_eq!(config.gas.fee_market, FeeMarket::Eip1559);
        assert!(!config.observability.metrics_enabled);
    }
}
