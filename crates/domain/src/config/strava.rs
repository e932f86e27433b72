use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Strava client configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StravaConfig {
    /// API base URL.
    #[serde(default = "d_base_url")]
    pub base_url: String,

    /// Token endpoint for the refresh grant.
    #[serde(default = "d_token_url")]
    pub token_url: String,

    /// Application client id for the refresh grant.
    #[serde(default)]
    pub client_id: String,

    /// Environment variable holding the application client secret.
    #[serde(default = "d_client_secret_env")]
    pub client_secret_env: String,

    /// Fixed-window rate limit: requests allowed per window.
    #[serde(default = "d_rate_limit_per_window")]
    pub rate_limit_per_window: u32,

    /// Fixed-window rate limit: window length in seconds.
    #[serde(default = "d_rate_window_s")]
    pub rate_window_s: u64,

    /// Per-request timeout in seconds.
    #[serde(default = "d_request_timeout_s")]
    pub request_timeout_s: u64,

    /// Stream resolutions the engine will request.
    #[serde(default = "d_resolutions")]
    pub resolutions: Vec<String>,
}

impl Default for StravaConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            token_url: d_token_url(),
            client_id: String::new(),
            client_secret_env: d_client_secret_env(),
            rate_limit_per_window: d_rate_limit_per_window(),
            rate_window_s: d_rate_window_s(),
            request_timeout_s: d_request_timeout_s(),
            resolutions: d_resolutions(),
        }
    }
}

/// The resolutions the Strava streams endpoint understands.
pub const VALID_RESOLUTIONS: [&str; 3] = ["low", "medium", "high"];

// ── serde default helpers ───────────────────────────────────────────

fn d_base_url() -> String {
    "https://www.strava.com/api/v3".into()
}
fn d_token_url() -> String {
    "https://www.strava.com/oauth/token".into()
}
fn d_client_secret_env() -> String {
    "STRAVA_CLIENT_SECRET".into()
}
fn d_rate_limit_per_window() -> u32 {
    100
}
fn d_rate_window_s() -> u64 {
    900
}
fn d_request_timeout_s() -> u64 {
    30
}
pub(crate) fn d_resolutions() -> Vec<String> {
    VALID_RESOLUTIONS.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = StravaConfig::default();
        assert_eq!(cfg.rate_limit_per_window, 100);
        assert_eq!(cfg.rate_window_s, 900);
        assert_eq!(cfg.request_timeout_s, 30);
        assert_eq!(cfg.resolutions, vec!["low", "medium", "high"]);
        assert!(cfg.base_url.starts_with("https://"));
    }
}
