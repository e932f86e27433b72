use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A boxed async stream, used for LLM streaming responses.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Events emitted during an LLM streaming response (provider-agnostic).
///
/// The `call_id` carried on tool-call events is the provider-assigned
/// tool-call identifier — the canonical id every downstream structure keys
/// on. Adapters translating wire schemas that also carry an internal item
/// id must surface only the call id here.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum LlmEvent {
    /// A chunk of assistant text.
    #[serde(rename = "text_delta")]
    TextDelta { text: String },

    /// The model is beginning a new tool call.
    #[serde(rename = "tool_call_start")]
    ToolCallStart {
        call_id: String,
        name: String,
        /// True when the wire event was missing its call id and the
        /// adapter substituted the internal item id.
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        used_fallback_id: bool,
    },

    /// Incremental JSON for the call's arguments.
    #[serde(rename = "tool_call_arg_delta")]
    ToolCallArgDelta { call_id: String, chunk: String },

    /// Argument accumulation for this call is finished.
    #[serde(rename = "tool_call_complete")]
    ToolCallComplete { call_id: String },

    /// The stream is over. `handle` may be passed to the next invocation
    /// to chain conversation state on the provider side.
    #[serde(rename = "response_complete")]
    ResponseComplete {
        handle: Option<String>,
        usage: Option<Usage>,
    },
}

/// Token usage for one completion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

impl Usage {
    /// Fold another completion's usage into this one.
    pub fn absorb(&mut self, other: &Usage) {
        self.prompt_tokens += other.prompt_tokens;
        self.completion_tokens += other.completion_tokens;
        self.total_tokens += other.total_tokens;
    }
}
