//! Metrics collection and exposition.
//!
//! # Metrics
//! - `static_response_requests_total` (counter): requests seen by the
//!   middleware, labelled by `outcome`
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade; without an installed
//!   recorder every update is a no-op
//! - The Prometheus exporter serves its own listener, separate from traffic

use std::net::SocketAddr;

use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

pub const REQUESTS_TOTAL: &str = "static_response_requests_total";

/// How the middleware disposed of a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Answered with a precomputed JSON payload.
    Json,
    /// Answered with a rendered template.
    Template,
    /// A template failed to render and a 500 was returned.
    TemplateError,
    /// No rule matched; handed to the downstream handler.
    Forwarded,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Json => "json",
            Outcome::Template => "template",
            Outcome::TemplateError => "template_error",
            Outcome::Forwarded => "forwarded",
        }
    }
}

pub fn record_outcome(outcome: Outcome) {
    metrics::counter!(REQUESTS_TOTAL, "outcome" => outcome.as_str()).increment(1);
}

/// Install the global Prometheus recorder and serve it on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics exporter listening");
    Ok(())
}
