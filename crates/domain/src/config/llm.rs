use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// LLM provider configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmConfig {
    /// Configured providers. The first entry is the default coach model;
    /// a `summarizer` role entry, when present, handles stream
    /// summarization calls.
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl LlmConfig {
    /// The provider configured for a role, falling back to the first.
    pub fn for_role(&self, role: &str) -> Option<&ProviderConfig> {
        self.providers
            .iter()
            .find(|p| p.role.as_deref() == Some(role))
            .or_else(|| self.providers.first())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Unique id (e.g. `"openai"`).
    pub id: String,

    /// API base URL.
    #[serde(default = "d_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,

    /// Model name to request. `None` lets the adapter choose its default.
    #[serde(default)]
    pub default_model: Option<String>,

    /// Optional role this provider serves (`"coach"`, `"summarizer"`).
    #[serde(default)]
    pub role: Option<String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            id: "openai".into(),
            base_url: d_base_url(),
            api_key_env: d_api_key_env(),
            default_model: None,
            role: None,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn d_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}
