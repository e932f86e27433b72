//! Shared utility functions for provider adapters.

use pl_domain::config::ProviderConfig;
use pl_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
///
/// Timeouts map to [`Error::Timeout`]; connection problems map to
/// [`Error::Network`]; anything else is [`Error::LlmUnavailable`].
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else if e.is_connect() {
        Error::Network(e.to_string())
    } else {
        Error::LlmUnavailable(e.to_string())
    }
}

/// Resolve the API key for a provider from its configured env var.
pub fn resolve_api_key(cfg: &ProviderConfig) -> Result<String> {
    std::env::var(&cfg.api_key_env).map_err(|_| {
        Error::Config(format!(
            "environment variable '{}' not set or not valid UTF-8",
            cfg.api_key_env
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_api_key_from_env() {
        let var = "PL_TEST_PROVIDER_KEY_4821";
        std::env::set_var(var, "sk-test");
        let cfg = ProviderConfig {
            api_key_env: var.into(),
            ..ProviderConfig::default()
        };
        assert_eq!(resolve_api_key(&cfg).unwrap(), "sk-test");
        std::env::remove_var(var);
    }

    #[test]
    fn resolve_api_key_missing_env() {
        let cfg = ProviderConfig {
            api_key_env: "PL_TEST_NONEXISTENT_VAR_9911".into(),
            ..ProviderConfig::default()
        };
        let err = resolve_api_key(&cfg).unwrap_err();
        assert!(err.to_string().contains("PL_TEST_NONEXISTENT_VAR_9911"));
    }
}
