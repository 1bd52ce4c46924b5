//! Static response rules.
//!
//! # Data Flow
//! ```text
//! Rule Compilation (at startup and on reload):
//!     RuleConfig[]
//!     → compile.rs (validate, compile regex/template, serialize JSON)
//!     → Freeze as immutable RuleSet
//!     → Publish through SharedRuleSet (atomic swap)
//!
//! Incoming Request (path)
//!     → dispatch.rs (first matching rule)
//!     → matcher.rs (exact / pattern)
//!     → renderer.rs (JSON bytes or template output)
//!     → Return: Some(Response) or None (forward downstream)
//! ```
//!
//! # Design Decisions
//! - Rules compiled once, immutable at runtime (no locks on the hot path)
//! - Declaration order is precedence: first match wins
//! - A failing rule fails the whole set; there is no partial RuleSet

pub mod compile;
pub mod dispatch;
pub mod matcher;
pub mod renderer;

use std::sync::Arc;

use arc_swap::ArcSwap;
use axum::http::StatusCode;

pub use compile::{CompileError, RuleError};
pub use matcher::PathMatcher;
pub use renderer::Renderer;

/// Rule table read by every request and replaced wholesale on reload.
pub type SharedRuleSet = Arc<ArcSwap<RuleSet>>;

/// One compiled rule.
#[derive(Debug, Clone)]
pub struct Rule {
    matcher: PathMatcher,
    renderer: Renderer,
    status: Option<StatusCode>,
    indent: usize,
}

impl Rule {
    pub fn matcher(&self) -> &PathMatcher {
        &self.matcher
    }

    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    /// Status written before the body; `None` keeps the default 200.
    pub fn status(&self) -> Option<StatusCode> {
        self.status
    }

    /// JSON indentation width the payload was serialized with.
    pub fn indent(&self) -> usize {
        self.indent
    }
}

/// Ordered, immutable list of compiled rules.
#[derive(Debug, Clone)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Wrap the set for sharing with the middleware.
    pub fn into_shared(self) -> SharedRuleSet {
        Arc::new(ArcSwap::from_pointee(self))
    }
}
