//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters via the `metrics` facade)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Key material, credentials and mnemonics are never logged
//! - Addresses and transaction hashes are logged as structured fields
//! - Metrics are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
