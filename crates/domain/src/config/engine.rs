use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Engine (orchestrator loop) configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Hard ceiling on `tool_timeout_s` regardless of configuration.
pub const TOOL_TIMEOUT_HARD_MAX_S: u64 = 300;

/// Settings for the per-message orchestrator loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum tool-call rounds before the model is nudged to wrap up.
    #[serde(default = "d_max_tool_rounds")]
    pub max_tool_rounds: u32,

    /// Per-tool-call timeout in seconds (clamped to [`TOOL_TIMEOUT_HARD_MAX_S`]).
    #[serde(default = "d_tool_timeout_s")]
    pub tool_timeout_s: u64,

    /// Ceiling on a single LLM invocation, in seconds.
    #[serde(default = "d_loop_timeout_s")]
    pub loop_timeout_s: u64,

    /// Master switch for transcript redaction of stale stream-tool output.
    #[serde(default = "d_true")]
    pub redaction_enabled: bool,

    /// Tool names whose results are eligible for redaction once superseded.
    #[serde(default = "d_stream_tools")]
    pub stream_tools: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: d_max_tool_rounds(),
            tool_timeout_s: d_tool_timeout_s(),
            loop_timeout_s: d_loop_timeout_s(),
            redaction_enabled: true,
            stream_tools: d_stream_tools(),
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_max_tool_rounds() -> u32 {
    5
}
fn d_tool_timeout_s() -> u64 {
    30
}
fn d_loop_timeout_s() -> u64 {
    120
}
fn d_true() -> bool {
    true
}
fn d_stream_tools() -> Vec<String> {
    vec!["get-activity-streams".into()]
}
