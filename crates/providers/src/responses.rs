//! Streamed responses-API adapter.
//!
//! Implements the item-based responses wire format: the request carries an
//! `input` list of message and function-call items, and the streamed reply
//! names each SSE event (`response.output_text.delta`,
//! `response.output_item.added`, `response.function_call_arguments.delta`,
//! `response.completed`, …).
//!
//! Identity rule: a function-call item carries two identifiers — the
//! internal item `id` and the `call_id` that pairs the call with its
//! output. Only `call_id` leaves this module. Argument deltas arrive keyed
//! by item id and are re-keyed before they are emitted. When a wire event
//! is missing its `call_id`, the adapter logs a warning, substitutes the
//! item id, and marks the emitted event with `used_fallback_id`.

use crate::sse::{sse_event_stream, SseFrame};
use crate::traits::{ChatRequest, ChatResponse, LlmClient};
use crate::util::{from_reqwest, resolve_api_key};
use pl_domain::config::ProviderConfig;
use pl_domain::error::{Error, Result};
use pl_domain::stream::{BoxStream, LlmEvent, Usage};
use pl_domain::tool::{ContentPart, Message, MessageContent, Role, ToolDefinition};
use serde_json::Value;
use std::collections::HashMap;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// An LLM adapter for responses-API endpoints.
pub struct ResponsesProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    client: reqwest::Client,
}

impl ResponsesProvider {
    /// Create a new provider from the deserialized provider config.
    pub fn from_config(cfg: &ProviderConfig) -> Result<Self> {
        let api_key = resolve_api_key(cfg)?;
        let default_model = cfg.default_model.clone().unwrap_or_else(|| "gpt-4o".into());

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key,
            default_model,
            client,
        })
    }

    /// Construct directly (tests and embedders that resolve keys themselves).
    pub fn new(
        id: impl Into<String>,
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        default_model: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(from_reqwest)?;
        let base_url: String = base_url.into();
        Ok(Self {
            id: id.into(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            default_model: default_model.into(),
            client,
        })
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
    }

    fn build_body(&self, req: &ChatRequest, stream: bool) -> Value {
        let model = req
            .model
            .clone()
            .unwrap_or_else(|| self.default_model.clone());

        let (instructions, input) = messages_to_input(&req.messages);

        let mut body = serde_json::json!({
            "model": model,
            "input": input,
            "stream": stream,
        });

        if !instructions.is_empty() {
            body["instructions"] = Value::String(instructions);
        }
        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_wire).collect();
            body["tools"] = Value::Array(tools);
        }
        if let Some(handle) = &req.previous_response {
            body["previous_response_id"] = Value::String(handle.clone());
        }
        if let Some(max) = req.max_output_tokens {
            body["max_output_tokens"] = serde_json::json!(max);
        }
        body
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request serialization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Split a transcript into (joined system instructions, wire input items).
fn messages_to_input(messages: &[Message]) -> (String, Vec<Value>) {
    let mut system_parts: Vec<String> = Vec::new();
    let mut input: Vec<Value> = Vec::new();

    for msg in messages {
        match msg.role {
            Role::System => system_parts.push(msg.content.extract_all_text()),
            Role::User => input.push(serde_json::json!({
                "role": "user",
                "content": [{ "type": "input_text", "text": msg.content.extract_all_text() }],
            })),
            Role::Assistant => assistant_to_input(msg, &mut input),
            Role::Tool => {
                if let MessageContent::Parts(parts) = &msg.content {
                    for part in parts {
                        if let ContentPart::ToolResult { call_id, content, .. } = part {
                            input.push(serde_json::json!({
                                "type": "function_call_output",
                                "call_id": call_id,
                                "output": content,
                            }));
                        }
                    }
                }
            }
        }
    }

    (system_parts.join("\n\n"), input)
}

fn assistant_to_input(msg: &Message, input: &mut Vec<Value>) {
    match &msg.content {
        MessageContent::Text(t) => input.push(serde_json::json!({
            "role": "assistant",
            "content": [{ "type": "output_text", "text": t }],
        })),
        MessageContent::Parts(parts) => {
            let text = msg.content.extract_all_text();
            if !text.is_empty() {
                input.push(serde_json::json!({
                    "role": "assistant",
                    "content": [{ "type": "output_text", "text": text }],
                }));
            }
            for part in parts {
                if let ContentPart::ToolUse { id, name, input: args } = part {
                    input.push(serde_json::json!({
                        "type": "function_call",
                        "call_id": id,
                        "name": name,
                        "arguments": args.to_string(),
                    }));
                }
            }
        }
    }
}

fn tool_to_wire(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "name": tool.name,
        "description": tool.description,
        "parameters": tool.parameters,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Stream parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Per-stream assembly state: re-keys item-scoped events to call ids.
#[derive(Default)]
struct StreamState {
    /// item id → canonical call id.
    call_ids: HashMap<String, String>,
    /// call ids that have received at least one argument delta.
    saw_args: HashMap<String, bool>,
}

impl StreamState {
    fn resolve(&self, item_id: &str) -> String {
        self.call_ids
            .get(item_id)
            .cloned()
            .unwrap_or_else(|| item_id.to_string())
    }
}

fn parse_frame(frame: &SseFrame, state: &mut StreamState) -> Vec<Result<LlmEvent>> {
    let v: Value = match serde_json::from_str(&frame.data) {
        Ok(v) => v,
        Err(e) => return vec![Err(Error::Json(e))],
    };

    let event_name = frame
        .event
        .as_deref()
        .or_else(|| v.get("type").and_then(|t| t.as_str()))
        .unwrap_or("");

    match event_name {
        "response.output_text.delta" => {
            let text = v.get("delta").and_then(|d| d.as_str()).unwrap_or("");
            if text.is_empty() {
                Vec::new()
            } else {
                vec![Ok(LlmEvent::TextDelta { text: text.into() })]
            }
        }

        "response.output_item.added" => {
            let item = match v.get("item") {
                Some(item) => item,
                None => return Vec::new(),
            };
            if item.get("type").and_then(|t| t.as_str()) != Some("function_call") {
                return Vec::new();
            }
            let item_id = item
                .get("id")
                .and_then(|i| i.as_str())
                .unwrap_or_default()
                .to_string();
            let name = item
                .get("name")
                .and_then(|n| n.as_str())
                .unwrap_or_default()
                .to_string();

            let (call_id, used_fallback_id) = match item
                .get("call_id")
                .and_then(|c| c.as_str())
                .filter(|c| !c.is_empty())
            {
                Some(call_id) => (call_id.to_string(), false),
                None => {
                    tracing::warn!(
                        item_id = %item_id,
                        tool = %name,
                        "function_call item missing call_id; falling back to item id"
                    );
                    (item_id.clone(), true)
                }
            };

            state.call_ids.insert(item_id, call_id.clone());
            vec![Ok(LlmEvent::ToolCallStart {
                call_id,
                name,
                used_fallback_id,
            })]
        }

        "response.function_call_arguments.delta" => {
            let item_id = v.get("item_id").and_then(|i| i.as_str()).unwrap_or("");
            let chunk = v.get("delta").and_then(|d| d.as_str()).unwrap_or("");
            if chunk.is_empty() {
                return Vec::new();
            }
            let call_id = state.resolve(item_id);
            state.saw_args.insert(call_id.clone(), true);
            vec![Ok(LlmEvent::ToolCallArgDelta {
                call_id,
                chunk: chunk.into(),
            })]
        }

        "response.function_call_arguments.done" => {
            let item_id = v.get("item_id").and_then(|i| i.as_str()).unwrap_or("");
            let call_id = state.resolve(item_id);
            let mut events = Vec::new();

            // Some servers deliver the whole argument string only here.
            if !state.saw_args.get(&call_id).copied().unwrap_or(false) {
                if let Some(args) = v.get("arguments").and_then(|a| a.as_str()) {
                    if !args.is_empty() {
                        events.push(Ok(LlmEvent::ToolCallArgDelta {
                            call_id: call_id.clone(),
                            chunk: args.into(),
                        }));
                    }
                }
            }

            events.push(Ok(LlmEvent::ToolCallComplete { call_id }));
            events
        }

        "response.completed" => {
            let response = v.get("response").unwrap_or(&Value::Null);
            let handle = response
                .get("id")
                .and_then(|i| i.as_str())
                .map(String::from);
            let usage = response.get("usage").and_then(parse_usage);
            vec![Ok(LlmEvent::ResponseComplete { handle, usage })]
        }

        "response.failed" | "error" => {
            let message = v
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("stream reported failure")
                .to_string();
            vec![Err(Error::LlmUnavailable(message))]
        }

        _ => Vec::new(),
    }
}

fn parse_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("input_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("output_tokens")?.as_u64()? as u32,
        total_tokens: v.get("total_tokens")?.as_u64()? as u32,
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Response parsing (non-streaming)
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_response(body: &Value) -> Result<ChatResponse> {
    let output = body
        .get("output")
        .and_then(|o| o.as_array())
        .ok_or_else(|| Error::LlmUnavailable("no output in response".into()))?;

    let mut content = String::new();
    for item in output {
        if item.get("type").and_then(|t| t.as_str()) != Some("message") {
            continue;
        }
        if let Some(parts) = item.get("content").and_then(|c| c.as_array()) {
            for part in parts {
                if part.get("type").and_then(|t| t.as_str()) == Some("output_text") {
                    if let Some(text) = part.get("text").and_then(|t| t.as_str()) {
                        content.push_str(text);
                    }
                }
            }
        }
    }

    let usage = body.get("usage").and_then(parse_usage);
    Ok(ChatResponse { content, usage })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmClient for ResponsesProvider {
    async fn respond(&self, req: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/responses", self.base_url);
        let body = self.build_body(req, false);

        tracing::debug!(provider = %self.id, url = %url, "responses request");

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        let resp_text = resp.text().await.map_err(from_reqwest)?;

        if !status.is_success() {
            return Err(Error::LlmUnavailable(format!(
                "HTTP {} - {}",
                status.as_u16(),
                resp_text
            )));
        }

        let resp_json: Value = serde_json::from_str(&resp_text)?;
        parse_response(&resp_json)
    }

    async fn stream(&self, req: &ChatRequest) -> Result<BoxStream<'static, Result<LlmEvent>>> {
        let url = format!("{}/responses", self.base_url);
        let body = self.build_body(req, true);

        tracing::debug!(provider = %self.id, url = %url, "responses stream request");

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::LlmUnavailable(format!(
                "HTTP {} - {}",
                status.as_u16(),
                err_text
            )));
        }

        let mut state = StreamState::default();
        Ok(sse_event_stream(resp, move |frame| {
            parse_frame(frame, &mut state)
        }))
    }

    fn provider_id(&self) -> &str {
        &self.id
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: &str, data: Value) -> SseFrame {
        SseFrame {
            event: Some(event.into()),
            data: data.to_string(),
        }
    }

    #[test]
    fn text_delta_parses() {
        let mut state = StreamState::default();
        let events = parse_frame(
            &frame("response.output_text.delta", serde_json::json!({"delta": "Nice ride"})),
            &mut state,
        );
        assert_eq!(events.len(), 1);
        match events[0].as_ref().unwrap() {
            LlmEvent::TextDelta { text } => assert_eq!(text, "Nice ride"),
            other => panic!("expected TextDelta, got {other:?}"),
        }
    }

    #[test]
    fn function_call_item_surfaces_call_id_not_item_id() {
        let mut state = StreamState::default();
        let events = parse_frame(
            &frame(
                "response.output_item.added",
                serde_json::json!({
                    "item": {
                        "type": "function_call",
                        "id": "fc_internal_1",
                        "call_id": "call_abc",
                        "name": "get-recent-activities",
                    }
                }),
            ),
            &mut state,
        );
        match events[0].as_ref().unwrap() {
            LlmEvent::ToolCallStart {
                call_id,
                name,
                used_fallback_id,
            } => {
                assert_eq!(call_id, "call_abc");
                assert_eq!(name, "get-recent-activities");
                assert!(!used_fallback_id);
            }
            other => panic!("expected ToolCallStart, got {other:?}"),
        }
    }

    #[test]
    fn missing_call_id_falls_back_to_item_id_with_annotation() {
        let mut state = StreamState::default();
        let events = parse_frame(
            &frame(
                "response.output_item.added",
                serde_json::json!({
                    "item": {
                        "type": "function_call",
                        "id": "fc_internal_2",
                        "name": "get-athlete-profile",
                    }
                }),
            ),
            &mut state,
        );
        match events[0].as_ref().unwrap() {
            LlmEvent::ToolCallStart {
                call_id,
                used_fallback_id,
                ..
            } => {
                assert_eq!(call_id, "fc_internal_2");
                assert!(used_fallback_id);
            }
            other => panic!("expected ToolCallStart, got {other:?}"),
        }
    }

    #[test]
    fn arg_deltas_are_rekeyed_from_item_id_to_call_id() {
        let mut state = StreamState::default();
        parse_frame(
            &frame(
                "response.output_item.added",
                serde_json::json!({
                    "item": {
                        "type": "function_call",
                        "id": "fc_1",
                        "call_id": "call_xyz",
                        "name": "get-activity-streams",
                    }
                }),
            ),
            &mut state,
        );
        let events = parse_frame(
            &frame(
                "response.function_call_arguments.delta",
                serde_json::json!({"item_id": "fc_1", "delta": "{\"activity"}),
            ),
            &mut state,
        );
        match events[0].as_ref().unwrap() {
            LlmEvent::ToolCallArgDelta { call_id, chunk } => {
                assert_eq!(call_id, "call_xyz");
                assert_eq!(chunk, "{\"activity");
            }
            other => panic!("expected ToolCallArgDelta, got {other:?}"),
        }
    }

    #[test]
    fn args_done_without_deltas_emits_full_arguments() {
        let mut state = StreamState::default();
        parse_frame(
            &frame(
                "response.output_item.added",
                serde_json::json!({
                    "item": {
                        "type": "function_call",
                        "id": "fc_1",
                        "call_id": "call_q",
                        "name": "get-activity-details",
                    }
                }),
            ),
            &mut state,
        );
        let events = parse_frame(
            &frame(
                "response.function_call_arguments.done",
                serde_json::json!({"item_id": "fc_1", "arguments": "{\"activity_id\":7}"}),
            ),
            &mut state,
        );
        assert_eq!(events.len(), 2);
        match events[0].as_ref().unwrap() {
            LlmEvent::ToolCallArgDelta { call_id, chunk } => {
                assert_eq!(call_id, "call_q");
                assert_eq!(chunk, "{\"activity_id\":7}");
            }
            other => panic!("expected ToolCallArgDelta, got {other:?}"),
        }
        assert!(matches!(
            events[1].as_ref().unwrap(),
            LlmEvent::ToolCallComplete { .. }
        ));
    }

    #[test]
    fn args_done_after_deltas_only_completes() {
        let mut state = StreamState::default();
        parse_frame(
            &frame(
                "response.output_item.added",
                serde_json::json!({
                    "item": {"type": "function_call", "id": "fc_1", "call_id": "call_q", "name": "t"}
                }),
            ),
            &mut state,
        );
        parse_frame(
            &frame(
                "response.function_call_arguments.delta",
                serde_json::json!({"item_id": "fc_1", "delta": "{}"}),
            ),
            &mut state,
        );
        let events = parse_frame(
            &frame(
                "response.function_call_arguments.done",
                serde_json::json!({"item_id": "fc_1", "arguments": "{}"}),
            ),
            &mut state,
        );
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0].as_ref().unwrap(),
            LlmEvent::ToolCallComplete { .. }
        ));
    }

    #[test]
    fn completed_carries_handle_and_usage() {
        let mut state = StreamState::default();
        let events = parse_frame(
            &frame(
                "response.completed",
                serde_json::json!({
                    "response": {
                        "id": "resp_123",
                        "usage": {"input_tokens": 100, "output_tokens": 20, "total_tokens": 120}
                    }
                }),
            ),
            &mut state,
        );
        match events[0].as_ref().unwrap() {
            LlmEvent::ResponseComplete { handle, usage } => {
                assert_eq!(handle.as_deref(), Some("resp_123"));
                let usage = usage.as_ref().unwrap();
                assert_eq!(usage.prompt_tokens, 100);
                assert_eq!(usage.total_tokens, 120);
            }
            other => panic!("expected ResponseComplete, got {other:?}"),
        }
    }

    #[test]
    fn failure_event_maps_to_llm_unavailable() {
        let mut state = StreamState::default();
        let events = parse_frame(
            &frame(
                "response.failed",
                serde_json::json!({"error": {"message": "overloaded"}}),
            ),
            &mut state,
        );
        match &events[0] {
            Err(Error::LlmUnavailable(m)) => assert_eq!(m, "overloaded"),
            other => panic!("expected LlmUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn non_function_items_are_ignored() {
        let mut state = StreamState::default();
        let events = parse_frame(
            &frame(
                "response.output_item.added",
                serde_json::json!({"item": {"type": "message", "id": "msg_1"}}),
            ),
            &mut state,
        );
        assert!(events.is_empty());
    }

    // ── Request body ───────────────────────────────────────────────

    #[test]
    fn body_splits_system_into_instructions() {
        let provider = ResponsesProvider::new("p", "https://api.test", "k", "m").unwrap();
        let req = ChatRequest {
            messages: vec![
                Message::system("You are a coach."),
                Message::user("hi"),
            ],
            ..ChatRequest::default()
        };
        let body = provider.build_body(&req, true);
        assert_eq!(body["instructions"], "You are a coach.");
        let input = body["input"].as_array().unwrap();
        assert_eq!(input.len(), 1);
        assert_eq!(input[0]["role"], "user");
    }

    #[test]
    fn body_serializes_tool_round_trip_items() {
        let provider = ResponsesProvider::new("p", "https://api.test", "k", "m").unwrap();
        let assistant = Message {
            role: Role::Assistant,
            content: MessageContent::Parts(vec![ContentPart::ToolUse {
                id: "call_1".into(),
                name: "get-recent-activities".into(),
                input: serde_json::json!({"per_page": 5}),
            }]),
        };
        let req = ChatRequest {
            messages: vec![
                Message::user("show my week"),
                assistant,
                Message::tool_result("call_1", "## Recent Activities"),
            ],
            ..ChatRequest::default()
        };
        let body = provider.build_body(&req, false);
        let input = body["input"].as_array().unwrap();
        assert_eq!(input.len(), 3);
        assert_eq!(input[1]["type"], "function_call");
        assert_eq!(input[1]["call_id"], "call_1");
        assert_eq!(input[2]["type"], "function_call_output");
        assert_eq!(input[2]["call_id"], "call_1");
    }

    #[test]
    fn body_includes_previous_response_handle() {
        let provider = ResponsesProvider::new("p", "https://api.test", "k", "m").unwrap();
        let req = ChatRequest {
            messages: vec![Message::user("more")],
            previous_response: Some("resp_41".into()),
            ..ChatRequest::default()
        };
        let body = provider.build_body(&req, true);
        assert_eq!(body["previous_response_id"], "resp_41");
    }

    #[test]
    fn parse_response_concatenates_output_text() {
        let body = serde_json::json!({
            "output": [
                {"type": "reasoning", "summary": []},
                {"type": "message", "content": [
                    {"type": "output_text", "text": "Great "},
                    {"type": "output_text", "text": "week!"}
                ]}
            ],
            "usage": {"input_tokens": 5, "output_tokens": 2, "total_tokens": 7}
        });
        let resp = parse_response(&body).unwrap();
        assert_eq!(resp.content, "Great week!");
        assert_eq!(resp.usage.unwrap().total_tokens, 7);
    }
}
