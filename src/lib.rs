//! EVM wallet pipeline library

pub mod config;
pub mod error;
pub mod keys;
pub mod lifecycle;
pub mod observability;
pub mod pipeline;
pub mod resilience;
pub mod rpc;
pub mod tracker;
pub mod transaction;
pub mod vault;

pub use config::schema::WalletConfig;
pub use error::ErrorCategory;
pub use lifecycle::Shutdown;
pub use pipeline::{PipelineError, WalletContext};
