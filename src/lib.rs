//! Static response middleware library.
//!
//! Answers requests whose path matches a configured rule with a fixed JSON
//! payload or a rendered template, and hands everything else downstream.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod rules;
pub mod template;

pub use config::ServerConfig;
pub use http::{static_response_middleware, HttpServer};
pub use lifecycle::Shutdown;
pub use rules::{RuleSet, SharedRuleSet};
