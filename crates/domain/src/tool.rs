use serde::{Deserialize, Serialize};

/// A decoded tool invocation (provider-agnostic).
///
/// `call_id` is the provider-assigned identifier pairing this call with
/// its result across the transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub call_id: String,
    pub name: String,
    pub arguments: serde_json::Value,
}

/// Tool definition exposed to the LLM.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    /// JSON Schema for the tool's parameters.
    pub parameters: serde_json::Value,
}

/// A message in the conversation handed to the LLM (provider-agnostic).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: MessageContent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ContentPart {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        call_id: String,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

// ── Convenience constructors ───────────────────────────────────────

impl Message {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: MessageContent::Text(text.into()),
        }
    }
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: MessageContent::Text(text.into()),
        }
    }
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: MessageContent::Text(text.into()),
        }
    }
    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::Parts(vec![ContentPart::ToolResult {
                call_id: call_id.into(),
                content: content.into(),
                is_error: false,
            }]),
        }
    }
    pub fn tool_error(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: MessageContent::Parts(vec![ContentPart::ToolResult {
                call_id: call_id.into(),
                content: content.into(),
                is_error: true,
            }]),
        }
    }

    /// The call id of the first tool-result part, if this is a tool message.
    pub fn tool_result_call_id(&self) -> Option<&str> {
        if self.role != Role::Tool {
            return None;
        }
        match &self.content {
            MessageContent::Parts(parts) => parts.iter().find_map(|p| match p {
                ContentPart::ToolResult { call_id, .. } => Some(call_id.as_str()),
                _ => None,
            }),
            MessageContent::Text(_) => None,
        }
    }

    /// True for a plain conversational message (user text or assistant
    /// text without tool-use parts).
    pub fn is_plain_exchange(&self) -> bool {
        match self.role {
            Role::User => true,
            Role::Assistant => match &self.content {
                MessageContent::Text(_) => true,
                MessageContent::Parts(parts) => {
                    !parts.iter().any(|p| matches!(p, ContentPart::ToolUse { .. }))
                }
            },
            _ => false,
        }
    }
}

impl MessageContent {
    /// Extract and join all text content, returning an owned String.
    ///
    /// Non-text parts (ToolUse, ToolResult) are skipped.
    pub fn extract_all_text(&self) -> String {
        match self {
            MessageContent::Text(t) => t.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_result_call_id_found() {
        let msg = Message::tool_result("call_abc", "## Ride\n- data");
        assert_eq!(msg.tool_result_call_id(), Some("call_abc"));
    }

    #[test]
    fn tool_result_call_id_none_for_user() {
        assert_eq!(Message::user("hello").tool_result_call_id(), None);
    }

    #[test]
    fn plain_exchange_classification() {
        assert!(Message::user("hi").is_plain_exchange());
        assert!(Message::assistant("hello").is_plain_exchange());
        assert!(!Message::tool_result("c1", "out").is_plain_exchange());
        assert!(!Message::system("coach prompt").is_plain_exchange());

        let tool_use_msg = Message {
            role: Role::Assistant,
            content: MessageContent::Parts(vec![ContentPart::ToolUse {
                id: "c1".into(),
                name: "get-athlete-profile".into(),
                input: serde_json::json!({}),
            }]),
        };
        assert!(!tool_use_msg.is_plain_exchange());
    }

    #[test]
    fn extract_all_text_skips_tool_parts() {
        let content = MessageContent::Parts(vec![
            ContentPart::Text { text: "line one".into() },
            ContentPart::ToolUse {
                id: "c1".into(),
                name: "get-recent-activities".into(),
                input: serde_json::json!({"per_page": 5}),
            },
            ContentPart::Text { text: "line two".into() },
        ]);
        assert_eq!(content.extract_all_text(), "line one\nline two");
    }
}
