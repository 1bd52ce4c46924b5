//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the static response server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Where unmatched requests are forwarded. Absent means 404.
    pub upstream: Option<UpstreamConfig>,

    /// Timeout configuration.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    /// Static response rules, in precedence order.
    pub rules: Vec<RuleConfig>,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// Downstream service for requests no rule answers.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpstreamConfig {
    /// Upstream address (e.g., "127.0.0.1:3000").
    pub address: String,
}

/// Timeout configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, Serialize, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// One static response rule as written in the config file.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RuleConfig {
    /// Exact request path to match.
    pub path: Option<String>,

    /// Regular expression searched in the request path.
    #[serde(alias = "pathRegex")]
    pub path_regex: Option<String>,

    /// Template for the response body.
    pub content: Option<String>,

    /// JSON object returned as the body. Takes precedence over `content`.
    #[serde(alias = "jsonData")]
    pub json_data: Option<serde_json::Map<String, serde_json::Value>>,

    /// JSON indentation width; 0 is compact.
    pub indent: usize,

    /// Response status; 0 keeps the default.
    pub status: u16,

    /// Content type of template responses. Unset means the rendered body is
    /// sniffed.
    #[serde(alias = "contentType")]
    pub content_type: Option<String>,
}

impl RuleConfig {
    /// Identifies the rule in logs and errors: its path, else its pattern.
    pub fn name(&self) -> &str {
        self.path
            .as_deref()
            .filter(|p| !p.is_empty())
            .or(self.path_regex.as_deref())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_file() {
        let config: ServerConfig = toml::from_str("").unwrap();

        assert_eq!(config.listener.bind_address, "0.0.0.0:8080");
        assert!(config.upstream.is_none());
        assert_eq!(config.timeouts.request_secs, 30);
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
        assert!(config.rules.is_empty());
    }

    #[test]
    fn test_rules_with_aliases() {
        let config: ServerConfig = toml::from_str(
            r#"
            [upstream]
            address = "127.0.0.1:3000"

            [observability]
            log_format = "json"

            [[rules]]
            path = "/"
            content = "Hello World!"

            [[rules]]
            pathRegex = "^/api/"
            contentType = "text/html"
            content = "<p>api</p>"
            status = 201

            [[rules]]
            path = "/json"
            indent = 2
            [rules.jsonData]
            name = "static"
            tags = ["a", "b"]
            "#,
        )
        .unwrap();

        assert_eq!(config.upstream.unwrap().address, "127.0.0.1:3000");
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.rules.len(), 3);
        assert_eq!(config.rules[1].path_regex.as_deref(), Some("^/api/"));
        assert_eq!(config.rules[1].content_type.as_deref(), Some("text/html"));
        assert_eq!(config.rules[1].status, 201);
        let data = config.rules[2].json_data.as_ref().unwrap();
        assert_eq!(data["name"], "static");
        assert_eq!(config.rules[2].indent, 2);
    }

    #[test]
    fn test_rule_name() {
        let rule = RuleConfig {
            path: Some(String::new()),
            path_regex: Some("^/x".into()),
            ..RuleConfig::default()
        };
        assert_eq!(rule.name(), "^/x");
        assert_eq!(RuleConfig::default().name(), "");
    }
}
