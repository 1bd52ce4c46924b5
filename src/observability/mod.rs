//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Rule compilation, dispatch, reload:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (static response outcome counters)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging (JSON) for machine parsing
//! - Request ID propagated by the HTTP layer, visible in trace spans
//! - Metrics are cheap (atomic increments) and a no-op without an exporter

pub mod logging;
pub mod metrics;
