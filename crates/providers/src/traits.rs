use pl_domain::error::Result;
use pl_domain::stream::{BoxStream, LlmEvent, Usage};
use pl_domain::tool::{Message, ToolDefinition};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request / Response types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider-agnostic model invocation.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// The conversation transcript to send.
    pub messages: Vec<Message>,
    /// Tool definitions the model may invoke.
    pub tools: Vec<ToolDefinition>,
    /// Model identifier override. When `None`, the adapter uses its default.
    pub model: Option<String>,
    /// Opaque handle of a prior response to chain from. Advisory; the full
    /// transcript is sent regardless.
    pub previous_response: Option<String>,
    /// Maximum tokens in the response. `None` lets the provider choose.
    pub max_output_tokens: Option<u32>,
}

/// A full (non-streamed) model reply. Used for secondary invocations that
/// don't need live output, e.g. stream summarization.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub usage: Option<Usage>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Trait every LLM adapter must implement.
///
/// `stream` is the primary path: it yields [`LlmEvent`]s (text deltas, tool
/// call assembly, response completion) as the provider produces them.
/// `respond` waits for the whole reply and is used where streaming adds
/// nothing (stream summarization).
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a request and wait for the full response.
    async fn respond(&self, req: &ChatRequest) -> Result<ChatResponse>;

    /// Send a request and return a stream of events.
    async fn stream(&self, req: &ChatRequest) -> Result<BoxStream<'static, Result<LlmEvent>>>;

    /// A unique identifier for this provider instance.
    fn provider_id(&self) -> &str;
}
