//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ServerConfig (validated, immutable)
//!     → rules::RuleSet::compile
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs loads and compiles
//!     → new RuleSet sent to the server
//!     → atomic swap of the shared rule set
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require full reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks
//! - Only rules are hot-reloaded; listener and upstream changes need a restart

pub mod loader;
pub mod schema;
pub mod validation;
pub mod watcher;

pub use loader::{load_config, load_rules, ConfigError};
pub use schema::{
    ListenerConfig, LogFormat, ObservabilityConfig, RuleConfig, ServerConfig, TimeoutConfig,
    UpstreamConfig,
};
pub use watcher::ConfigWatcher;
