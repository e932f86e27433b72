//! The per-message orchestrator loop.
//!
//! One call to [`process_message`] handles one user message: persist it,
//! run up to `max_tool_rounds` LLM ⇄ tool cycles (streaming text deltas
//! and coaching status lines to the caller as they happen), then persist
//! the assembled assistant reply. Tool calls within a round execute
//! concurrently; their results are injected back into the transcript in
//! call_id order, so the next transcript is deterministic.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use pl_domain::error::{Error, Result};
use pl_domain::model::{StoredMessage, StoredRole};
use pl_domain::stream::{LlmEvent, Usage};
use pl_domain::tool::{Message, ToolCall, ToolDefinition};
use pl_providers::ChatRequest;

use crate::state::AppState;

use super::cancel::CancelToken;
use super::redact;
use super::status;
use super::tools;
use super::{build_system_prompt, history_to_messages, round_messages, title_from, FINAL_NUDGE};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Public surface
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Events streamed to the client while a message is processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CoachEvent {
    /// A coaching-voiced progress line (shown live, never persisted).
    Status { text: String },
    /// Incremental assistant text.
    Delta { text: String },
    /// The full assembled assistant reply (already persisted).
    Final { content: String },
    /// The message was cancelled; nothing was persisted beyond the user row.
    Stopped,
}

/// Input to one message run.
#[derive(Debug, Clone)]
pub struct MessageInput {
    pub user_id: String,
    pub session_id: String,
    pub text: String,
}

/// Process one user message. Returns a channel the caller drains for live
/// output; the spawned task persists the user row immediately and the
/// assistant row on completion.
pub fn process_message(state: AppState, input: MessageInput) -> mpsc::Receiver<CoachEvent> {
    let (tx, rx) = mpsc::channel::<CoachEvent>(64);

    let cancel = state.cancel_map.register(&input.session_id);
    let session_id = input.session_id.clone();

    tokio::spawn(async move {
        tracing::debug!(session_id = %input.session_id, "message started");
        let result = run_message_inner(&state, &input, &tx, &cancel).await;
        state.cancel_map.remove(&session_id);

        if let Err(e) = result {
            finalize_failure(&state, &input, &tx, e).await;
        }
    });

    rx
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Failure finalization
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Translate a fatal error into the coaching-voiced fallback reply,
/// persist it, and emit it as the final event. Cancellation persists
/// nothing.
async fn finalize_failure(
    state: &AppState,
    input: &MessageInput,
    tx: &mpsc::Sender<CoachEvent>,
    error: Error,
) {
    if matches!(error, Error::Cancelled) {
        let _ = tx.send(CoachEvent::Stopped).await;
        return;
    }

    tracing::warn!(error = %error, session_id = %input.session_id, "message failed");

    let fallback = match &error {
        // Model/orchestrator failures all wear the same apology.
        Error::LlmUnavailable(_) | Error::Timeout(_) => {
            Error::LlmUnavailable(String::new()).coaching_voice()
        }
        other => other.coaching_voice(),
    };

    if let Err(e) = state
        .sessions
        .insert_message(&StoredMessage::new(
            &input.session_id,
            StoredRole::Assistant,
            &fallback,
        ))
        .await
    {
        tracing::warn!(error = %e, "failed to persist fallback reply");
    }

    let _ = tx
        .send(CoachEvent::Delta {
            text: fallback.clone(),
        })
        .await;
    let _ = tx.send(CoachEvent::Final { content: fallback }).await;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// The message loop
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

async fn run_message_inner(
    state: &AppState,
    input: &MessageInput,
    tx: &mpsc::Sender<CoachEvent>,
    cancel: &CancelToken,
) -> Result<()> {
    // ── Phase 1: assemble the message context ─────────────────────
    let user = state
        .users
        .get(&input.user_id)
        .await?
        .ok_or(Error::AuthRevoked)?;
    let session = state
        .sessions
        .get(&input.session_id)
        .await?
        .ok_or_else(|| Error::NotFound(format!("session {}", input.session_id)))?;

    let logbook = crate::logbook::ensure_initial(state, &user).await;
    let history_rows = state.sessions.list_messages(&session.id).await?;
    let is_first_message = history_rows.is_empty();

    // The user row is persisted synchronously on entry — it survives
    // cancellation and failure alike.
    state
        .sessions
        .insert_message(&StoredMessage::new(
            &session.id,
            StoredRole::User,
            &input.text,
        ))
        .await?;
    if is_first_message {
        if let Err(e) = state
            .sessions
            .set_title(&session.id, &title_from(&input.text))
            .await
        {
            tracing::warn!(error = %e, "failed to set session title");
        }
    }

    let mut transcript = vec![Message::system(build_system_prompt(
        &user,
        logbook.as_ref(),
    ))];
    transcript.extend(history_to_messages(&history_rows));
    transcript.push(Message::user(&input.text));

    let tool_defs = tools::build_tool_definitions(&state.config);
    let mut response_handle = session.last_response_handle.clone();
    let mut assistant_buf = String::new();
    let mut total_usage = Usage::default();

    let max_rounds = state.config.engine.max_tool_rounds;
    let mut rounds_used: u32 = 0;
    let mut forced_final = false;

    // ── Phase 2: the bounded loop ─────────────────────────────────
    loop {
        if cancel.is_cancelled() {
            let _ = tx.send(CoachEvent::Stopped).await;
            return Ok(());
        }

        let outcome = run_llm_round(
            state,
            &transcript,
            &tool_defs,
            response_handle.clone(),
            tx,
            cancel,
            &mut assistant_buf,
        )
        .await?;

        if outcome.cancelled {
            let _ = tx.send(CoachEvent::Stopped).await;
            return Ok(());
        }
        if let Some(usage) = &outcome.usage {
            total_usage.absorb(usage);
        }
        if outcome.new_handle.is_some() {
            response_handle = outcome.new_handle.clone();
        }

        // Terminal: no tool calls, or the forced-final invocation (whose
        // further tool calls are ignored by contract).
        if outcome.pending.is_empty() || forced_final {
            if forced_final && !outcome.pending.is_empty() {
                tracing::info!(
                    ignored_calls = outcome.pending.len(),
                    "round cap reached; ignoring further tool calls"
                );
            }
            return finalize_success(
                state,
                input,
                tx,
                &assistant_buf,
                response_handle,
                &total_usage,
                rounds_used,
            )
            .await;
        }

        // ── Tool round ────────────────────────────────────────────
        rounds_used += 1;
        let calls: Vec<ToolCall> = outcome.pending.iter().map(|p| p.call.clone()).collect();

        let _ = tx
            .send(CoachEvent::Status {
                text: status::for_round(&calls).to_string(),
            })
            .await;

        transcript.extend(round_messages(&outcome.round_text, &calls));

        let results = match execute_round(state, input, &outcome.pending, cancel).await? {
            Some(results) => results,
            None => {
                // Cancelled during dispatch.
                let _ = tx.send(CoachEvent::Stopped).await;
                return Ok(());
            }
        };

        for (pending, (content, is_error)) in outcome.pending.iter().zip(results) {
            let message = if is_error {
                Message::tool_error(&pending.call.call_id, &content)
            } else {
                Message::tool_result(&pending.call.call_id, &content)
            };
            transcript.push(message);
        }

        if rounds_used >= max_rounds {
            tracing::info!(rounds_used, "round cap reached; forcing a final reply");
            transcript.push(Message::user(FINAL_NUDGE));
            forced_final = true;
        }
    }
}

async fn finalize_success(
    state: &AppState,
    input: &MessageInput,
    tx: &mpsc::Sender<CoachEvent>,
    assistant_text: &str,
    response_handle: Option<String>,
    usage: &Usage,
    rounds_used: u32,
) -> Result<()> {
    state
        .sessions
        .insert_message(&StoredMessage::new(
            &input.session_id,
            StoredRole::Assistant,
            assistant_text,
        ))
        .await?;
    if let Err(e) = state
        .sessions
        .set_last_response_handle(&input.session_id, response_handle.as_deref())
        .await
    {
        tracing::warn!(error = %e, "failed to persist response handle");
    }

    tracing::info!(
        session_id = %input.session_id,
        rounds = rounds_used,
        prompt_tokens = usage.prompt_tokens,
        completion_tokens = usage.completion_tokens,
        "message completed"
    );

    let _ = tx
        .send(CoachEvent::Final {
            content: assistant_text.to_string(),
        })
        .await;
    Ok(())
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// One LLM invocation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A decoded tool call, possibly pre-failed at the argument layer.
struct PendingCall {
    call: ToolCall,
    /// Set when the arguments never completed or failed to parse: the
    /// structured error text injected instead of executing.
    pre_error: Option<String>,
}

struct RoundOutcome {
    /// Text produced by this invocation alone.
    round_text: String,
    pending: Vec<PendingCall>,
    new_handle: Option<String>,
    usage: Option<Usage>,
    cancelled: bool,
}

/// In-flight argument assembly for one call_id.
#[derive(Default)]
struct CallAssembly {
    name: String,
    args_buf: String,
    completed: bool,
}

async fn run_llm_round(
    state: &AppState,
    transcript: &[Message],
    tool_defs: &[ToolDefinition],
    response_handle: Option<String>,
    tx: &mpsc::Sender<CoachEvent>,
    cancel: &CancelToken,
    assistant_buf: &mut String,
) -> Result<RoundOutcome> {
    // 1. Optimize the transcript (redaction) before every invocation.
    let optimized = redact::optimize_transcript(
        transcript,
        &state.config.engine.stream_tools,
        state.config.engine.redaction_enabled,
    );

    let req = ChatRequest {
        messages: optimized,
        tools: tool_defs.to_vec(),
        model: None,
        previous_response: response_handle,
        max_output_tokens: None,
    };

    // 2. The whole invocation (connect + stream consumption) runs under
    //    the orchestrator-level ceiling.
    let deadline = Instant::now() + Duration::from_secs(state.config.engine.loop_timeout_s);

    let mut stream = tokio::time::timeout_at(deadline, state.llm.stream(&req))
        .await
        .map_err(|_| Error::Timeout("model invocation exceeded the time ceiling".into()))??;

    let mut round_text = String::new();
    let mut assemblies: HashMap<String, CallAssembly> = HashMap::new();
    let mut new_handle = None;
    let mut usage = None;

    use futures_util::StreamExt;
    loop {
        // Cancellation interrupts the wait itself; dropping the stream
        // closes the upstream connection.
        let next = tokio::select! {
            next = tokio::time::timeout_at(deadline, stream.next()) => next,
            _ = cancel.cancelled() => {
                return Ok(RoundOutcome {
                    round_text,
                    pending: Vec::new(),
                    new_handle,
                    usage,
                    cancelled: true,
                });
            }
        };
        let event = match next {
            Ok(Some(event)) => event?,
            Ok(None) => break,
            Err(_) => {
                return Err(Error::Timeout(
                    "model stream exceeded the time ceiling".into(),
                ))
            }
        };

        match event {
            LlmEvent::TextDelta { text } => {
                let _ = tx.send(CoachEvent::Delta { text: text.clone() }).await;
                round_text.push_str(&text);
                assistant_buf.push_str(&text);
            }
            LlmEvent::ToolCallStart {
                call_id,
                name,
                used_fallback_id,
            } => {
                if used_fallback_id {
                    tracing::warn!(call_id = %call_id, tool = %name, "tool call id came from fallback");
                }
                assemblies.insert(
                    call_id,
                    CallAssembly {
                        name,
                        ..CallAssembly::default()
                    },
                );
            }
            LlmEvent::ToolCallArgDelta { call_id, chunk } => {
                assemblies.entry(call_id).or_default().args_buf.push_str(&chunk);
            }
            LlmEvent::ToolCallComplete { call_id } => {
                assemblies.entry(call_id).or_default().completed = true;
            }
            LlmEvent::ResponseComplete { handle, usage: u } => {
                new_handle = handle;
                usage = u;
            }
        }
    }

    // 3. Decode the assembled calls, deterministically ordered by call_id.
    let mut pending: Vec<PendingCall> = Vec::new();
    let mut ids: Vec<String> = assemblies.keys().cloned().collect();
    ids.sort();
    for call_id in ids {
        let assembly = assemblies.remove(&call_id).expect("assembly exists");
        pending.push(decode_call(call_id, assembly));
    }

    Ok(RoundOutcome {
        round_text,
        pending,
        new_handle,
        usage,
        cancelled: false,
    })
}

/// Turn one assembled call into a `PendingCall`, applying the
/// partial-arguments policy: a call whose argument stream never completed
/// is a schema violation, not a guess.
fn decode_call(call_id: String, assembly: CallAssembly) -> PendingCall {
    if !assembly.completed {
        let err = Error::SchemaViolation(
            "the argument stream ended before the call was complete".into(),
        );
        tracing::warn!(call_id = %call_id, tool = %assembly.name, "incomplete tool call arguments");
        return PendingCall {
            pre_error: Some(tools::error_result(&assembly.name, &err)),
            call: ToolCall {
                call_id,
                name: assembly.name,
                arguments: serde_json::Value::Object(Default::default()),
            },
        };
    }

    let trimmed = assembly.args_buf.trim();
    let (arguments, pre_error) = if trimmed.is_empty() {
        // No-parameter tools legitimately stream no arguments.
        (serde_json::Value::Object(Default::default()), None)
    } else {
        match serde_json::from_str::<serde_json::Value>(trimmed) {
            Ok(value) => (value, None),
            Err(e) => {
                tracing::warn!(call_id = %call_id, tool = %assembly.name, error = %e, "malformed tool call arguments");
                let err = Error::SchemaViolation(format!("arguments are not valid JSON: {e}"));
                (
                    serde_json::Value::Object(Default::default()),
                    Some(tools::error_result(&assembly.name, &err)),
                )
            }
        }
    };

    PendingCall {
        call: ToolCall {
            call_id,
            name: assembly.name,
            arguments,
        },
        pre_error,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool round execution
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

enum TaskSlot {
    /// Argument-layer failure; nothing to run.
    Precomputed(String),
    Spawned(JoinHandle<Result<String>>),
}

/// Execute a round of tool calls concurrently. Results come back in input
/// (call_id) order as `(content, is_error)`. Returns `None` on
/// cancellation (in-flight tasks aborted). `AuthRevoked` from any tool
/// aborts the whole message.
async fn execute_round(
    state: &AppState,
    input: &MessageInput,
    pending: &[PendingCall],
    cancel: &CancelToken,
) -> Result<Option<Vec<(String, bool)>>> {
    let timeout = Duration::from_secs(state.config.engine.tool_timeout_s);

    let mut slots = Vec::with_capacity(pending.len());
    let mut abort_handles = Vec::new();
    for p in pending {
        match &p.pre_error {
            Some(text) => slots.push(TaskSlot::Precomputed(text.clone())),
            None => {
                let handle = tokio::spawn(tools::dispatch_with_timeout(
                    state.clone(),
                    input.user_id.clone(),
                    p.call.clone(),
                    timeout,
                ));
                abort_handles.push(handle.abort_handle());
                slots.push(TaskSlot::Spawned(handle));
            }
        }
    }

    let gather = async {
        let mut results: Vec<(String, bool)> = Vec::with_capacity(slots.len());
        for (slot, p) in slots.into_iter().zip(pending) {
            let result = match slot {
                TaskSlot::Precomputed(text) => (text, true),
                TaskSlot::Spawned(handle) => match handle.await {
                    Ok(Ok(content)) => (content, false),
                    Ok(Err(Error::AuthRevoked)) => return Err(Error::AuthRevoked),
                    Ok(Err(e)) => {
                        tracing::warn!(tool = %p.call.name, error = %e, "tool failed");
                        (tools::error_result(&p.call.name, &e), true)
                    }
                    Err(join_err) => {
                        let e = if join_err.is_panic() {
                            Error::ToolInternal("executor panicked".into())
                        } else {
                            Error::Cancelled
                        };
                        tracing::warn!(tool = %p.call.name, error = %e, "tool task died");
                        (tools::error_result(&p.call.name, &e), true)
                    }
                },
            };
            results.push(result);
        }
        Ok(results)
    };

    tokio::select! {
        results = gather => results.map(Some),
        _ = cancel.cancelled() => {
            for handle in &abort_handles {
                handle.abort();
            }
            Ok(None)
        }
    }
}
