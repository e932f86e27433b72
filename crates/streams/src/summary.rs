//! AI summarization of a full stream dataset.
//!
//! Hands the complete serialized samples plus the caller's prompt to a
//! secondary model invocation and returns that model's reply verbatim.
//! Failures bubble up so the processor can fall back to derived mode.

use pl_domain::error::Result;
use pl_domain::tool::Message;
use pl_providers::{ChatRequest, LlmClient};

const ANALYST_PROMPT: &str = "You are a sports-science data analyst. You will \
receive the complete sample table of one recorded activity and a question \
about it. Answer the question from the data alone: cite concrete numbers, \
ranges, and sample positions. Do not give training advice — the coach \
handles that.";

/// Run the secondary summarization call.
pub async fn summarize(
    llm: &dyn LlmClient,
    activity_label: &str,
    serialized_data: &str,
    summary_prompt: &str,
) -> Result<String> {
    let user_message = format!(
        "Activity: {activity_label}\n\nQuestion: {summary_prompt}\n\n\
         Complete stream data:\n\n{serialized_data}"
    );

    let req = ChatRequest {
        messages: vec![Message::system(ANALYST_PROMPT), Message::user(user_message)],
        tools: Vec::new(),
        model: None,
        previous_response: None,
        max_output_tokens: Some(2_000),
    };

    tracing::debug!(
        activity = activity_label,
        data_chars = serialized_data.len(),
        "running stream summarization call"
    );

    let resp = llm.respond(&req).await?;
    Ok(resp.content)
}
