//! LLM provider adapters.
//!
//! The engine talks to models exclusively through the [`LlmClient`] trait;
//! [`responses::ResponsesProvider`] is the concrete adapter for providers
//! speaking the streamed item-based responses wire format.

pub mod responses;
pub mod sse;
pub mod traits;
pub mod util;

pub use responses::ResponsesProvider;
pub use traits::{ChatRequest, ChatResponse, LlmClient};
