//! Rule compilation.
//!
//! Turns declarative [`RuleConfig`] entries into a [`RuleSet`]. Compilation is
//! all or nothing: the first invalid rule aborts it and is named in the error.

use axum::http::{HeaderValue, StatusCode};
use regex::Regex;
use thiserror::Error;

use super::matcher::PathMatcher;
use super::renderer::Renderer;
use super::{Rule, RuleSet};
use crate::config::RuleConfig;
use crate::template::ParseError;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("at least one rule is required")]
    Empty,

    #[error("invalid rule configuration rules[{index}] {name:?}: {source}")]
    Rule {
        index: usize,
        /// The rule's path, or its pattern when no path is set.
        name: String,
        #[source]
        source: RuleError,
    },
}

#[derive(Debug, Error)]
pub enum RuleError {
    #[error("path or path_regex must be set")]
    MissingMatcher,

    #[error("content or json_data must be set")]
    MissingResponse,

    #[error("invalid path regex: {0}")]
    Pattern(#[from] regex::Error),

    #[error("invalid content template: {0}")]
    Template(#[from] ParseError),

    #[error("invalid json data: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid status code {0}")]
    InvalidStatus(u16),

    #[error("invalid content type {0:?}")]
    InvalidContentType(String),
}

impl RuleSet {
    /// Compile `configs` in order. The resulting set has the same length and
    /// order as the input.
    pub fn compile(configs: &[RuleConfig]) -> Result<Self, CompileError> {
        if configs.is_empty() {
            return Err(CompileError::Empty);
        }

        let mut rules = Vec::with_capacity(configs.len());
        for (index, config) in configs.iter().enumerate() {
            let rule = compile_rule(config).map_err(|source| CompileError::Rule {
                index,
                name: config.name().to_string(),
                source,
            })?;
            tracing::debug!(
                index,
                rule = %rule.matcher.label(),
                json = matches!(rule.renderer, Renderer::Json(_)),
                status = ?rule.status,
                "Compiled rule"
            );
            rules.push(rule);
        }

        Ok(Self { rules })
    }
}

fn compile_rule(config: &RuleConfig) -> Result<Rule, RuleError> {
    let path = non_empty(config.path.as_deref());
    let pattern = non_empty(config.path_regex.as_deref());
    if path.is_none() && pattern.is_none() {
        return Err(RuleError::MissingMatcher);
    }

    let content = non_empty(config.content.as_deref());
    let json_data = config.json_data.as_ref().filter(|data| !data.is_empty());
    if content.is_none() && json_data.is_none() {
        return Err(RuleError::MissingResponse);
    }

    let matcher = match (path, pattern) {
        (Some(path), Some(pattern)) => {
            PathMatcher::ExactOrPattern(path.to_string(), Regex::new(pattern)?)
        }
        (Some(path), None) => PathMatcher::Exact(path.to_string()),
        (None, Some(pattern)) => PathMatcher::Pattern(Regex::new(pattern)?),
        (None, None) => return Err(RuleError::MissingMatcher),
    };

    let content_type = non_empty(config.content_type.as_deref())
        .map(|value| {
            HeaderValue::from_str(value)
                .map_err(|_| RuleError::InvalidContentType(value.to_string()))
        })
        .transpose()?;

    // The template is validated even when JSON takes precedence over it.
    let template = content
        .map(|content| Renderer::template(matcher.label(), content, content_type))
        .transpose()?;

    let renderer = match (json_data, template) {
        (Some(data), _) => Renderer::json(data, config.indent)?,
        (None, Some(template)) => template,
        (None, None) => return Err(RuleError::MissingResponse),
    };

    let status = match config.status {
        0 => None,
        code => Some(StatusCode::from_u16(code).map_err(|_| RuleError::InvalidStatus(code))?),
    };

    Ok(Rule {
        matcher,
        renderer,
        status,
        indent: config.indent,
    })
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|s| !s.is_empty())
}
