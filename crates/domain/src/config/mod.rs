mod engine;
mod llm;
mod stores;
mod strava;
mod streams;

pub use engine::*;
pub use llm::*;
pub use stores::*;
pub use strava::*;
pub use streams::*;

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub strava: StravaConfig,
    #[serde(default)]
    pub streams: StreamsConfig,
    #[serde(default)]
    pub stores: StoresConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.llm.providers.is_empty() {
            errors.push(ConfigError {
                severity: ConfigSeverity::Warning,
                field: "llm.providers".into(),
                message: "no LLM providers configured".into(),
            });
        }

        let mut seen_ids: HashSet<&str> = HashSet::new();
        for (i, provider) in self.llm.providers.iter().enumerate() {
            if provider.id.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].id"),
                    message: "provider id must not be empty".into(),
                });
            }
            if !is_http_url(&provider.base_url) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].base_url"),
                    message: format!(
                        "base_url must start with http:// or https:// (got \"{}\")",
                        provider.base_url
                    ),
                });
            }
            if provider.api_key_env.is_empty() {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Error,
                    field: format!("llm.providers[{i}].api_key_env"),
                    message: "api_key_env must not be empty".into(),
                });
            }
            if !provider.id.is_empty() && !seen_ids.insert(&provider.id) {
                errors.push(ConfigError {
                    severity: ConfigSeverity::Warning,
                    field: format!("llm.providers[{i}].id"),
                    message: format!(
                        "duplicate provider id \"{}\" — later provider will shadow earlier one",
                        provider.id
                    ),
                });
            }
        }

        if !is_http_url(&self.strava.base_url) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "strava.base_url".into(),
                message: format!(
                    "base_url must start with http:// or https:// (got \"{}\")",
                    self.strava.base_url
                ),
            });
        }
        if !is_http_url(&self.strava.token_url) {
            errors.push(ConfigError {
                severity: ConfigSeverity::Error,
                field: "strava.token_url".into(),
                message: format!(
                    "token_url must start with http:// or https:// (got \"{}\")",
                    self.strava.token_url
                ),
            });
        }

        errors
    }

    /// Coerce out-of-range values back to their defaults, logging a
    /// warning for each correction. Always leaves the config usable.
    pub fn sanitize(&mut self) {
        let d_engine = EngineConfig::default();
        let d_streams = StreamsConfig::default();
        let d_strava = StravaConfig::default();

        // ── Engine ────────────────────────────────────────────────
        if self.engine.max_tool_rounds == 0 {
            warn_coerced("engine.max_tool_rounds", &d_engine.max_tool_rounds);
            self.engine.max_tool_rounds = d_engine.max_tool_rounds;
        }
        if self.engine.tool_timeout_s == 0 {
            warn_coerced("engine.tool_timeout_s", &d_engine.tool_timeout_s);
            self.engine.tool_timeout_s = d_engine.tool_timeout_s;
        } else if self.engine.tool_timeout_s > TOOL_TIMEOUT_HARD_MAX_S {
            warn_coerced("engine.tool_timeout_s", &TOOL_TIMEOUT_HARD_MAX_S);
            self.engine.tool_timeout_s = TOOL_TIMEOUT_HARD_MAX_S;
        }
        if self.engine.loop_timeout_s == 0 {
            warn_coerced("engine.loop_timeout_s", &d_engine.loop_timeout_s);
            self.engine.loop_timeout_s = d_engine.loop_timeout_s;
        }

        // ── Streams ───────────────────────────────────────────────
        if self.streams.max_context_tokens == 0 {
            warn_coerced("streams.max_context_tokens", &d_streams.max_context_tokens);
            self.streams.max_context_tokens = d_streams.max_context_tokens;
        }
        let ratio = self.streams.token_per_char_ratio;
        if !ratio.is_finite() || ratio <= 0.0 || ratio > 1.0 {
            warn_coerced("streams.token_per_char_ratio", &d_streams.token_per_char_ratio);
            self.streams.token_per_char_ratio = d_streams.token_per_char_ratio;
        }
        if self.streams.context_safety_margin >= self.streams.max_context_tokens {
            warn_coerced("streams.context_safety_margin", &d_streams.context_safety_margin);
            self.streams.context_safety_margin =
                d_streams.context_safety_margin.min(self.streams.max_context_tokens / 2);
        }
        if self.streams.default_page_size == 0 {
            warn_coerced("streams.default_page_size", &d_streams.default_page_size);
            self.streams.default_page_size = d_streams.default_page_size;
        }
        if self.streams.max_page_size == 0 {
            warn_coerced("streams.max_page_size", &d_streams.max_page_size);
            self.streams.max_page_size = d_streams.max_page_size;
        }
        if self.streams.default_page_size > self.streams.max_page_size {
            warn_coerced("streams.default_page_size", &self.streams.max_page_size);
            self.streams.default_page_size = self.streams.max_page_size;
        }
        if self.streams.large_dataset_threshold == 0 {
            warn_coerced(
                "streams.large_dataset_threshold",
                &d_streams.large_dataset_threshold,
            );
            self.streams.large_dataset_threshold = d_streams.large_dataset_threshold;
        }
        let k = self.streams.spike_stdev_factor;
        if !k.is_finite() || k <= 0.0 {
            warn_coerced("streams.spike_stdev_factor", &d_streams.spike_stdev_factor);
            self.streams.spike_stdev_factor = d_streams.spike_stdev_factor;
        }

        // ── Strava ────────────────────────────────────────────────
        if self.strava.rate_limit_per_window == 0 {
            warn_coerced("strava.rate_limit_per_window", &d_strava.rate_limit_per_window);
            self.strava.rate_limit_per_window = d_strava.rate_limit_per_window;
        }
        if self.strava.rate_window_s == 0 {
            warn_coerced("strava.rate_window_s", &d_strava.rate_window_s);
            self.strava.rate_window_s = d_strava.rate_window_s;
        }
        if self.strava.request_timeout_s == 0 {
            warn_coerced("strava.request_timeout_s", &d_strava.request_timeout_s);
            self.strava.request_timeout_s = d_strava.request_timeout_s;
        }
        self.strava.resolutions.retain(|r| {
            let ok = VALID_RESOLUTIONS.contains(&r.as_str());
            if !ok {
                tracing::warn!(resolution = %r, "dropping unknown stream resolution");
            }
            ok
        });
        if self.strava.resolutions.is_empty() {
            warn_coerced("strava.resolutions", &d_strava.resolutions);
            self.strava.resolutions = strava::d_resolutions();
        }
    }
}

fn is_http_url(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}

fn warn_coerced<T: fmt::Debug>(field: &str, default: &T) {
    tracing::warn!(field = field, default = ?default, "invalid config value coerced to default");
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
