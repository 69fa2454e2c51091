//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! lifecycle + orchestrator produce:
//!     → logging.rs (structured log events, one `invocation` span per event)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stderr (pretty or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```

pub mod logging;
pub mod metrics;
