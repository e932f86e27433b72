//! Context optimizer — redacts stale stream-tool output from the
//! transcript handed to the next LLM invocation.
//!
//! Stream results are huge and single-use: once a plain assistant reply
//! (or a new user message) follows one, its value has been captured and
//! the body can be elided. Results still feeding an ongoing tool run —
//! nothing but tool traffic after them — are preserved. The message
//! envelope (role, call_id, position) is never touched, so the
//! tool-call/tool-result pairing the provider requires stays valid.

use std::collections::HashMap;

use pl_domain::tool::{ContentPart, Message, MessageContent};

/// Marker prefixed to every redacted body; also the idempotence check.
pub const REDACTION_SENTINEL: &str = "[redacted stream output]";

/// Apply redaction to a transcript. Returns a new message list with the
/// same length and role sequence.
pub fn optimize_transcript(
    messages: &[Message],
    stream_tools: &[String],
    enabled: bool,
) -> Vec<Message> {
    if !enabled {
        return messages.to_vec();
    }

    // call_id → tool name, from the assistant tool-use messages.
    let mut call_names: HashMap<&str, &str> = HashMap::new();
    for msg in messages {
        if let MessageContent::Parts(parts) = &msg.content {
            for part in parts {
                if let ContentPart::ToolUse { id, name, .. } = part {
                    call_names.insert(id, name);
                }
            }
        }
    }

    // plain_after[i]: does any message after i count as a plain exchange
    // (user message or assistant reply without tool calls)?
    let mut plain_after = vec![false; messages.len()];
    let mut seen_plain = false;
    for i in (0..messages.len()).rev() {
        plain_after[i] = seen_plain;
        seen_plain = seen_plain || messages[i].is_plain_exchange();
    }

    let mut result = Vec::with_capacity(messages.len());
    for (i, msg) in messages.iter().enumerate() {
        let call_id = match msg.tool_result_call_id() {
            Some(id) => id.to_owned(),
            None => {
                result.push(msg.clone());
                continue;
            }
        };
        let tool_name = call_names.get(call_id.as_str()).copied().unwrap_or("");
        if !stream_tools.iter().any(|t| t == tool_name) {
            result.push(msg.clone());
            continue;
        }

        if plain_after[i] {
            result.push(redact_message(msg, &call_id, tool_name, i));
        } else {
            tracing::debug!(
                call_id = %call_id,
                decision = "PRESERVED",
                rationale = "only tool traffic follows; analysis still in flight",
                position = i,
                "redaction decision"
            );
            result.push(msg.clone());
        }
    }

    result
}

fn redact_message(msg: &Message, call_id: &str, tool_name: &str, position: usize) -> Message {
    let MessageContent::Parts(parts) = &msg.content else {
        return msg.clone();
    };

    let redacted_parts: Vec<ContentPart> = parts
        .iter()
        .map(|part| match part {
            ContentPart::ToolResult {
                call_id: id,
                content,
                is_error,
            } => {
                if content.starts_with(REDACTION_SENTINEL) {
                    tracing::debug!(
                        call_id = %call_id,
                        decision = "REDACTED",
                        rationale = "already redacted",
                        position = position,
                        "redaction decision"
                    );
                    return part.clone();
                }
                tracing::debug!(
                    call_id = %call_id,
                    decision = "REDACTED",
                    rationale = "a plain reply follows; result is superseded",
                    position = position,
                    original_lines = content.lines().count(),
                    "redaction decision"
                );
                ContentPart::ToolResult {
                    call_id: id.clone(),
                    content: redacted_body(content, tool_name),
                    is_error: *is_error,
                }
            }
            other => other.clone(),
        })
        .collect();

    Message {
        role: msg.role,
        content: MessageContent::Parts(redacted_parts),
    }
}

/// The placeholder body: content kind, original size, pagination flag, and
/// how to get the data back.
fn redacted_body(content: &str, tool_name: &str) -> String {
    let lines = content.lines().count();
    let kind = if content.contains("Dataset Too Large") {
        "a processing-options menu"
    } else if content.contains("Stream Analysis") {
        "derived stream statistics"
    } else if content.contains("Stream Data") {
        "a raw stream sample table"
    } else {
        "stream tool output"
    };
    let paginated = if content.contains("**Page ") { ", paginated" } else { "" };

    format!(
        "{REDACTION_SENTINEL} This was {kind} ({lines} lines{paginated}). Its \
         findings are reflected in the replies that follow; invoke {tool_name} \
         again if fresh data is needed."
    )
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
