//! Core runtime — the orchestrator that ties stores, transcript assembly,
//! LLM streaming, tool dispatch, and persistence into one bounded loop.
//!
//! Entry point: [`process_message`] takes a session + user message and
//! returns a channel of [`CoachEvent`]s for live streaming.

pub mod cancel;
pub mod redact;
pub mod status;
pub mod tools;
pub mod turn;

pub use turn::{process_message, CoachEvent, MessageInput};

use pl_domain::model::{Logbook, StoredMessage, StoredRole, User};
use pl_domain::tool::{ContentPart, Message, MessageContent, Role, ToolCall};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Prompt & transcript helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Injected as a user message when the round cap is reached: one final
/// invocation follows, and further tool calls are ignored.
pub(crate) const FINAL_NUDGE: &str =
    "Please give your final answer now, using the data you have already \
     gathered. Do not request any more lookups; if something was left \
     unfetched, say so briefly.";

pub(crate) fn build_system_prompt(user: &User, logbook: Option<&Logbook>) -> String {
    let mut prompt = String::from(
        "You are Paceline, an endurance-sports coach. You talk to one athlete \
         about their training, grounded in their recorded activities.\n\n\
         Guidelines:\n\
         - Fetch data before asserting anything about a workout; never invent numbers.\n\
         - Prefer recent activities unless the athlete points elsewhere.\n\
         - Keep the athlete's logbook current: after learning something durable \
           (goals, injuries, zones, equipment, milestones), rewrite it with \
           update-athlete-logbook. The logbook is yours to structure.\n\
         - Be concrete and encouraging; explain what the numbers mean.\n",
    );

    if !user.display_name.is_empty() {
        prompt.push_str(&format!("\nThe athlete's name is {}.\n", user.display_name));
    }

    prompt.push_str("\n## Athlete Logbook\n\n");
    match logbook {
        Some(logbook) if !logbook.content.is_empty() => prompt.push_str(&logbook.content),
        _ => prompt.push_str("(empty — nothing recorded yet)"),
    }
    prompt.push('\n');
    prompt
}

/// Convert persisted rows into LLM messages. Only plain user/assistant
/// rows are ever persisted, so this is a straight mapping.
pub(crate) fn history_to_messages(rows: &[StoredMessage]) -> Vec<Message> {
    rows.iter()
        .map(|row| match row.role {
            StoredRole::User => Message::user(&row.content),
            StoredRole::Assistant => Message::assistant(&row.content),
        })
        .collect()
}

/// The transcript items appended for one round of model output: the
/// assistant's text (when any) as its own plain message, then the tool
/// calls as a separate tool-use message. Keeping text and calls apart
/// mirrors the provider's item model and is what redaction keys on.
pub(crate) fn round_messages(text: &str, calls: &[ToolCall]) -> Vec<Message> {
    let mut messages = Vec::new();
    if !text.is_empty() {
        messages.push(Message::assistant(text));
    }
    if !calls.is_empty() {
        let parts: Vec<ContentPart> = calls
            .iter()
            .map(|tc| ContentPart::ToolUse {
                id: tc.call_id.clone(),
                name: tc.name.clone(),
                input: tc.arguments.clone(),
            })
            .collect();
        messages.push(Message {
            role: Role::Assistant,
            content: MessageContent::Parts(parts),
        });
    }
    messages
}

/// Session title from the first user message: first line, truncated.
pub(crate) fn title_from(text: &str) -> String {
    let first_line = text.lines().next().unwrap_or("").trim();
    let mut title: String = first_line.chars().take(48).collect();
    if first_line.chars().count() > 48 {
        title.push('…');
    }
    if title.is_empty() {
        "New conversation".into()
    } else {
        title
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn user() -> User {
        let now = Utc::now();
        User {
            id: "u1".into(),
            athlete_id: 1,
            access_token: "a".into(),
            refresh_token: "r".into(),
            token_expires_at: 0,
            display_name: "Ann".into(),
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn system_prompt_includes_name_and_logbook() {
        let logbook = Logbook {
            user_id: "u1".into(),
            content: "FTP 250 W, training for a spring marathon.".into(),
            updated_at: Utc::now(),
        };
        let prompt = build_system_prompt(&user(), Some(&logbook));
        assert!(prompt.contains("Ann"));
        assert!(prompt.contains("FTP 250 W"));
    }

    #[test]
    fn system_prompt_empty_logbook_is_marked() {
        let prompt = build_system_prompt(&user(), None);
        assert!(prompt.contains("(empty"));
    }

    #[test]
    fn history_maps_roles() {
        let rows = vec![
            StoredMessage::new("s1", StoredRole::User, "hi"),
            StoredMessage::new("s1", StoredRole::Assistant, "hello"),
        ];
        let messages = history_to_messages(&rows);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
    }

    #[test]
    fn round_messages_split_text_from_calls() {
        let calls = vec![ToolCall {
            call_id: "c1".into(),
            name: "get-recent-activities".into(),
            arguments: serde_json::json!({"per_page": 5}),
        }];
        let messages = round_messages("let me look", &calls);
        assert_eq!(messages.len(), 2);
        assert!(messages[0].is_plain_exchange());
        assert!(!messages[1].is_plain_exchange());

        // Text-free rounds produce only the tool-use message.
        let messages = round_messages("", &calls);
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn title_truncates_and_defaults() {
        assert_eq!(title_from("recap my week"), "recap my week");
        assert_eq!(title_from(""), "New conversation");
        assert_eq!(title_from("\n\nsecond line first"), "New conversation");
        let long = "x".repeat(100);
        let title = title_from(&long);
        assert_eq!(title.chars().count(), 49);
        assert!(title.ends_with('…'));
    }
}
