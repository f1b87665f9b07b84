//! Configuration validation.
//!
//! Returns every problem found, not just the first, so a broken config
//! file can be fixed in one pass.

use thiserror::Error;

use crate::config::schema::WalletConfig;
use crate::vault::record::{MAX_KDF_ITERATIONS, MAX_KDF_MEMORY_KIB, MAX_KDF_PARALLELISM};

/// A single semantic problem with a configuration value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// Semantic checks serde cannot express.
pub fn validate_config(config: &WalletConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    match url::Url::parse(&config.rpc.url) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {}
        Ok(url) => errors.push(ValidationError::new(
            "rpc.url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("rpc.url", e.to_string())),
    }
    if config.rpc.chain_id == 0 {
        errors.push(ValidationError::new("rpc.chain_id", "must be non-zero"));
    }
    if config.rpc.request_timeout_ms == 0 {
        errors.push(ValidationError::new("rpc.request_timeout_ms", "must be > 0"));
    }

    if config.rate_limit.requests_per_second == 0 {
        errors.push(ValidationError::new("rate_limit.requests_per_second", "must be > 0"));
    }
    if config.rate_limit.burst_size == 0 {
        errors.push(ValidationError::new("rate_limit.burst_size", "must be > 0"));
    }

    if config.retries.max_attempts == 0 {
        errors.push(ValidationError::new("retries.max_attempts", "must be at least 1"));
    }
    if config.retries.base_delay_ms > config.retries.max_delay_ms {
        errors.push(ValidationError::new(
            "retries.base_delay_ms",
            "must not exceed retries.max_delay_ms",
        ));
    }

    if config.gas.max_gas_price_gwei == 0 {
        errors.push(ValidationError::new("gas.max_gas_price_gwei", "must be > 0"));
    }

    if config.tracker.poll_initial_ms == 0 {
        errors.push(ValidationError::new("tracker.poll_initial_ms", "must be > 0"));
    }
    if config.tracker.poll_initial_ms > config.tracker.poll_max_ms {
        errors.push(ValidationError::new(
            "tracker.poll_initial_ms",
            "must not exceed tracker.poll_max_ms",
        ));
    }
    if config.tracker.drop_after_polls == 0 {
        errors.push(ValidationError::new("tracker.drop_after_polls", "must be > 0"));
    }

    if !(1..=MAX_KDF_ITERATIONS).contains(&config.vault.kdf_iterations) {
        errors.push(ValidationError::new(
            "vault.kdf_iterations",
            format!("must be between 1 and {}", MAX_KDF_ITERATIONS),
        ));
    }
    if config.vault.kdf_memory_kib < 8 * config.vault.kdf_parallelism.max(1) {
        errors.push(ValidationError::new(
            "vault.kdf_memory_kib",
            "must be at least 8 KiB per lane",
        ));
    }
    if config.vault.kdf_memory_kib > MAX_KDF_MEMORY_KIB {
        errors.push(ValidationError::new(
            "vault.kdf_memory_kib",
            format!("must not exceed {} KiB", MAX_KDF_MEMORY_KIB),
        ));
    }
    if !(1..=MAX_KDF_PARALLELISM).contains(&config.vault.kdf_parallelism) {
        errors.push(ValidationError::new(
            "vault.kdf_parallelism",
            format!("must be between 1 and {}", MAX_KDF_PARALLELISM),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
