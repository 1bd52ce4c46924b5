//! Request dispatch against a compiled rule set.

use axum::{http::Request, response::Response};

use super::{Rule, RuleSet};
use crate::http::request::request_path;
use crate::observability::metrics::record_outcome;

impl RuleSet {
    /// First rule whose matcher accepts `path`, in declaration order.
    pub fn find(&self, path: &str) -> Option<&Rule> {
        self.rules.iter().find(|rule| rule.matcher.matches(path))
    }

    /// Answer `req` from the first matching rule. `None` means no rule
    /// matched and the request belongs to the downstream handler.
    pub fn respond<B>(&self, req: &Request<B>) -> Option<Response> {
        let path = request_path(req);
        let rule = self.find(&path)?;

        let (response, outcome) = rule.renderer.render(rule.status, req);
        tracing::debug!(
            method = %req.method(),
            path = %path,
            rule = %rule.matcher.label(),
            outcome = outcome.as_str(),
            status = response.status().as_u16(),
            "Static response"
        );
        record_outcome(outcome);
        Some(response)
    }
}
