//! Shared SSE streaming infrastructure for provider adapters.
//!
//! The responses wire format names its events (`event: response.…` followed
//! by `data: {…}`), so the drain step captures both the event name and the
//! data payload of each frame. A provider-specific parser turns each frame
//! into zero or more [`LlmEvent`]s.

use crate::util::from_reqwest;
use pl_domain::error::Result;
use pl_domain::stream::{BoxStream, LlmEvent};

/// One parsed server-sent event: the optional `event:` name plus the
/// joined `data:` payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseFrame {
    pub event: Option<String>,
    pub data: String,
}

/// Extract complete frames from an SSE buffer.
///
/// Frames are delimited by `\n\n`. Within a frame, the last `event:` line
/// wins and multiple `data:` lines are joined with `\n` per the SSE spec.
/// The buffer is drained in place; a trailing partial frame stays for the
/// next call.
pub(crate) fn drain_frames(buffer: &mut String) -> Vec<SseFrame> {
    let mut frames = Vec::new();

    while let Some(pos) = buffer.find("\n\n") {
        let block: String = buffer.drain(..pos).collect();
        buffer.drain(..2); // the \n\n delimiter

        let mut event = None;
        let mut data_lines: Vec<String> = Vec::new();
        for line in block.lines() {
            let line = line.trim();
            if let Some(name) = line.strip_prefix("event:") {
                event = Some(name.trim().to_string());
            } else if let Some(data) = line.strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    data_lines.push(data.to_string());
                }
            }
        }

        if !data_lines.is_empty() {
            frames.push(SseFrame {
                event,
                data: data_lines.join("\n"),
            });
        }
    }

    frames
}

/// Build a [`BoxStream`] of [`LlmEvent`]s from an SSE `reqwest::Response`
/// and a frame parser.
///
/// The parser is `FnMut` because adapters keep assembly state across frames
/// (tool-call id mapping). The stream buffers chunks, drains complete
/// frames, flushes the tail when the body closes, and guarantees a terminal
/// `ResponseComplete` even when the upstream never sent one.
pub(crate) fn sse_event_stream<F>(
    response: reqwest::Response,
    mut parse_frame: F,
) -> BoxStream<'static, Result<LlmEvent>>
where
    F: FnMut(&SseFrame) -> Vec<Result<LlmEvent>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut response = response;
        let mut buffer = String::new();
        let mut complete_emitted = false;

        loop {
            match response.chunk().await {
                Ok(Some(bytes)) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));
                    for frame in drain_frames(&mut buffer) {
                        for event in parse_frame(&frame) {
                            if matches!(&event, Ok(LlmEvent::ResponseComplete { .. })) {
                                complete_emitted = true;
                            }
                            yield event;
                        }
                    }
                }
                Ok(None) => {
                    // Body closed — flush any trailing partial frame.
                    if !buffer.trim().is_empty() {
                        buffer.push_str("\n\n");
                        for frame in drain_frames(&mut buffer) {
                            for event in parse_frame(&frame) {
                                if matches!(&event, Ok(LlmEvent::ResponseComplete { .. })) {
                                    complete_emitted = true;
                                }
                                yield event;
                            }
                        }
                    }
                    break;
                }
                Err(e) => {
                    yield Err(from_reqwest(e));
                    break;
                }
            }
        }

        if !complete_emitted {
            yield Ok(LlmEvent::ResponseComplete {
                handle: None,
                usage: None,
            });
        }
    };

    Box::pin(stream)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drain_named_event() {
        let mut buf =
            String::from("event: response.output_text.delta\ndata: {\"delta\":\"hi\"}\n\n");
        let frames = drain_frames(&mut buf);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].event.as_deref(), Some("response.output_text.delta"));
        assert_eq!(frames[0].data, "{\"delta\":\"hi\"}");
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_multiple_frames() {
        let mut buf = String::from("data: first\n\nevent: x\ndata: second\n\n");
        let frames = drain_frames(&mut buf);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].event, None);
        assert_eq!(frames[0].data, "first");
        assert_eq!(frames[1].event.as_deref(), Some("x"));
    }

    #[test]
    fn drain_partial_frame_stays_in_buffer() {
        let mut buf = String::from("data: complete\n\nevent: y\ndata: partial");
        let frames = drain_frames(&mut buf);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "complete");
        assert_eq!(buf, "event: y\ndata: partial");
    }

    #[test]
    fn drain_joins_multiline_data() {
        let mut buf = String::from("data: line1\ndata: line2\n\n");
        let frames = drain_frames(&mut buf);
        assert_eq!(frames[0].data, "line1\nline2");
    }

    #[test]
    fn drain_skips_dataless_frames() {
        let mut buf = String::from("event: ping\n\n");
        let frames = drain_frames(&mut buf);
        assert!(frames.is_empty());
        assert!(buf.is_empty());
    }

    #[test]
    fn drain_ignores_comment_and_id_lines() {
        let mut buf = String::from(": keepalive\nid: 42\nretry: 5000\ndata: payload\n\n");
        let frames = drain_frames(&mut buf);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].data, "payload");
    }

    #[test]
    fn drain_incremental_buffering() {
        let mut buf = String::from("event: a\ndata: chunk1");
        assert!(drain_frames(&mut buf).is_empty());
        buf.push_str("\n\ndata: chunk2\n\n");
        let frames = drain_frames(&mut buf);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].data, "chunk1");
        assert_eq!(frames[1].data, "chunk2");
        assert!(buf.is_empty());
    }
}
