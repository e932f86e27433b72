use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stream-processor configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Budgets and tuning for the activity-stream processing pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamsConfig {
    /// Token budget a serialized stream result must fit inside.
    #[serde(default = "d_max_context_tokens")]
    pub max_context_tokens: u32,

    /// Estimated tokens per character of serialized output.
    #[serde(default = "d_token_per_char_ratio")]
    pub token_per_char_ratio: f64,

    /// Tokens held back from the budget for framing and headers.
    #[serde(default = "d_context_safety_margin")]
    pub context_safety_margin: u32,

    /// Page size used when pagination is requested without one.
    #[serde(default = "d_default_page_size")]
    pub default_page_size: u32,

    /// Upper bound on a caller-requested page size.
    #[serde(default = "d_max_page_size")]
    pub max_page_size: u32,

    /// Sample count above which a dataset is considered large enough to
    /// mention pagination in the options menu.
    #[serde(default = "d_large_dataset_threshold")]
    pub large_dataset_threshold: u32,

    /// `k` in the spike rule `value > mean + k * stdev`.
    #[serde(default = "d_spike_stdev_factor")]
    pub spike_stdev_factor: f64,
}

impl Default for StreamsConfig {
    fn default() -> Self {
        Self {
            max_context_tokens: d_max_context_tokens(),
            token_per_char_ratio: d_token_per_char_ratio(),
            context_safety_margin: d_context_safety_margin(),
            default_page_size: d_default_page_size(),
            max_page_size: d_max_page_size(),
            large_dataset_threshold: d_large_dataset_threshold(),
            spike_stdev_factor: d_spike_stdev_factor(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_max_context_tokens() -> u32 {
    15_000
}
fn d_token_per_char_ratio() -> f64 {
    0.25
}
fn d_context_safety_margin() -> u32 {
    2_000
}
fn d_default_page_size() -> u32 {
    1_000
}
fn d_max_page_size() -> u32 {
    5_000
}
fn d_large_dataset_threshold() -> u32 {
    2_000
}
fn d_spike_stdev_factor() -> f64 {
    2.0
}
