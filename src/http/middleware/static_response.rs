//! Static response middleware.
//! Answers requests from the rule set before they reach the downstream handler.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::observability::metrics::{record_outcome, Outcome};
use crate::rules::SharedRuleSet;

/// Serve the first matching rule, or pass the request on untouched.
///
/// Install with `axum::middleware::from_fn_with_state(rules, static_response_middleware)`.
pub async fn static_response_middleware(
    State(rules): State<SharedRuleSet>,
    request: Request,
    next: Next,
) -> Response {
    // The guard is released before awaiting downstream.
    let intercepted = rules.load().respond(&request);

    match intercepted {
        Some(response) => response,
        None => {
            record_outcome(Outcome::Forwarded);
            next.run(request).await
        }
    }
}
