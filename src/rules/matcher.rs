//! Path matching.
//!
//! # Responsibilities
//! - Match the request path exactly (case-sensitive)
//! - Match the request path by regular expression search
//!
//! # Design Decisions
//! - The variant is chosen once at compile time; matching never re-inspects
//!   which configuration fields were set
//! - Patterns are unanchored unless the pattern anchors itself
//! - A rule with both an exact path and a pattern matches either one, exact
//!   checked first

use regex::Regex;

#[derive(Debug, Clone)]
pub enum PathMatcher {
    Exact(String),
    Pattern(Regex),
    ExactOrPattern(String, Regex),
}

impl PathMatcher {
    /// Returns true if `path` satisfies this matcher.
    pub fn matches(&self, path: &str) -> bool {
        match self {
            PathMatcher::Exact(expected) => path == expected,
            PathMatcher::Pattern(pattern) => pattern.is_match(path),
            PathMatcher::ExactOrPattern(expected, pattern) => {
                path == expected || pattern.is_match(path)
            }
        }
    }

    /// The configured path or pattern, used to name the rule in logs and errors.
    pub fn label(&self) -> &str {
        match self {
            PathMatcher::Exact(expected) | PathMatcher::ExactOrPattern(expected, _) => expected,
            PathMatcher::Pattern(pattern) => pattern.as_str(),
        }
    }
}
