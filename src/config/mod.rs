//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize, environment overrides)
//!     → validation.rs (semantic checks)
//!     → WalletConfig (validated, immutable)
//!     → passed by value / Arc to each subsystem at construction
//! ```
//!
//! # Design Decisions
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Secrets (credentials, mnemonics) never live in the config file

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{default_config, load_config, ConfigError};
pub use schema::{
    FeeMarket, GasConfig, ObservabilityConfig, RateLimitConfig, RetryConfig, RpcConfig,
    TrackerConfig, VaultConfig, WalletConfig,
};
