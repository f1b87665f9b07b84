//! Resilience helpers for transport failures.
//!
//! # Data Flow
//! ```text
//! RPC call fails with a transport error
//!     → retries.rs (is it retryable? attempts left?)
//!     → backoff.rs (jittered exponential delay)
//!     → next attempt, or surface the last error
//! ```
//!
//! # Design Decisions
//! - Only transport failures are retried; validation, security and
//!   chain-rejection errors surface immediately
//! - Attempts are bounded; the last error is returned unchanged
//! - The tracker reuses the same backoff curve for its poll interval

pub mod backoff;
pub mod retries;

pub use backoff::calculate_backoff;
pub use retries::{retry_transient, RetryPolicy, Retryable};
