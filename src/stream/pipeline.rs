use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;

use crate::api::client::ChatRequest;
use crate::db::session_repo;
use crate::error::{AppError, AppResult};
use crate::models::message::ChatMessage;
use crate::state::AppState;

use super::event::StreamEvent;
use super::frame::{FrameParser, StreamFrame};
use super::reply::ReplyState;

/// Substituted when a stream completes without producing any content.
pub const EMPTY_REPLY_PLACEHOLDER: &str = "I don't have a response for that.";

/// The assistant's turn when both the stream and the fallback fail.
pub const APOLOGY_MESSAGE: &str =
    "Sorry, I couldn't reach the assistant just now. Please try again in a moment.";

enum StreamOutcome {
    Completed,
    Cancelled,
}

struct BusyGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for BusyGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

/// Sends one user turn and resolves to the assistant's reply.
///
/// Streams the reply, accumulating content and progress into the shared
/// [`ReplyState`]; on any streaming failure retries once against the
/// non-streaming endpoint. Other than the admission guard, this never
/// surfaces transport errors: the worst outcome is the apology text. The
/// finalized message is appended to the session transcript before
/// returning (persistence failure is logged, not raised).
pub async fn send(
    state: &AppState,
    session_id: &str,
    agent_id: Option<&str>,
    user_text: &str,
) -> AppResult<ChatMessage> {
    if state
        .reply_busy
        .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
        .is_err()
    {
        return Err(AppError::Busy);
    }
    let _busy = BusyGuard {
        flag: Arc::clone(&state.reply_busy),
    };

    let cancel = CancellationToken::new();
    set_active_token(state, Some(cancel.clone()));
    state.reply.begin();

    let request = ChatRequest {
        message: user_text.to_string(),
        session_id: session_id.to_string(),
        agent_id: agent_id.map(String::from),
    };

    let outcome = consume_stream(state, &request, &cancel).await;
    let partial = state.reply.snapshot().partial;

    let message = match outcome {
        Ok(StreamOutcome::Completed) => {
            ChatMessage::assistant(finalize_content(partial), None)
        }
        Ok(StreamOutcome::Cancelled) => {
            log::info!("Reply stream cancelled; finalizing with partial content");
            ChatMessage::assistant(finalize_content(partial), None)
        }
        Err(e) => {
            log::warn!("Streaming request failed, using fallback: {}", e);
            fallback_message(state, &request, partial).await
        }
    };

    set_active_token(state, None);

    let persisted = {
        let state_clone = state.clone();
        let session_id = session_id.to_string();
        let message_clone = message.clone();
        tokio::task::spawn_blocking(move || {
            session_repo::append_message(&state_clone, &session_id, message_clone)
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))
        .and_then(|r| r)
    };

    state.reply.finish();
    match persisted {
        Ok(_) => state.reply.mark_saved(),
        // Local persistence loss is an accepted degradation; the reply is
        // still handed to the caller.
        Err(e) => log::warn!("Failed to persist assistant message: {}", e),
    }

    Ok(message)
}

/// Cancels the in-flight reply, if any. The cancelled turn still finalizes
/// with whatever content it accumulated.
pub fn cancel_active(state: &AppState) -> bool {
    let guard = state
        .reply_cancel
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    match guard.as_ref() {
        Some(token) => {
            token.cancel();
            true
        }
        None => false,
    }
}

fn set_active_token(state: &AppState, token: Option<CancellationToken>) {
    let mut guard = state
        .reply_cancel
        .lock()
        .unwrap_or_else(|e| e.into_inner());
    *guard = token;
}

async fn consume_stream(
    state: &AppState,
    request: &ChatRequest,
    cancel: &CancellationToken,
) -> AppResult<StreamOutcome> {
    let response = state.api.send_chat_stream(request).await?;
    let mut body = response.bytes_stream();
    let mut parser = FrameParser::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                return Ok(StreamOutcome::Cancelled);
            }
            chunk = body.next() => match chunk {
                Some(Ok(bytes)) => {
                    for frame in parser.push_chunk(&bytes) {
                        apply_frame(&state.reply, &frame);
                    }
                }
                Some(Err(e)) => {
                    return Err(AppError::Http(format!("Stream read failed: {e}")));
                }
                None => {
                    for frame in parser.finish() {
                        apply_frame(&state.reply, &frame);
                    }
                    return Ok(StreamOutcome::Completed);
                }
            }
        }
    }
}

/// Routes one parsed frame into the shared reply state.
pub(crate) fn apply_frame(reply: &ReplyState, frame: &StreamFrame) {
    match StreamEvent::from_frame(frame) {
        StreamEvent::Thinking { active } => reply.set_thinking(active),
        StreamEvent::Progress(step) => {
            reply.append_content(&step.content);
            reply.upsert_progress(step);
        }
        StreamEvent::Raw(text) => reply.append_content(&text),
        StreamEvent::Error { content } => {
            log::warn!("Backend reported a stream error: {}", content);
        }
        StreamEvent::Message | StreamEvent::Ignored => {}
    }
}

fn finalize_content(buffer: String) -> String {
    if buffer.is_empty() {
        EMPTY_REPLY_PLACEHOLDER.to_string()
    } else {
        buffer
    }
}

/// The single non-streaming retry. Resolution order for the assistant text:
/// the fallback's `response`/`message` (first non-empty), then any partial
/// content the failed stream accumulated, then the apology.
async fn fallback_message(
    state: &AppState,
    request: &ChatRequest,
    partial: String,
) -> ChatMessage {
    match state.api.send_chat(request).await {
        Ok(response) => {
            let tool_calls = response.tool_calls.clone().filter(|t| !t.is_empty());
            match response.text() {
                Some(text) => ChatMessage::assistant(text.to_string(), tool_calls),
                None if !partial.is_empty() => ChatMessage::assistant(partial, tool_calls),
                None => ChatMessage::assistant(APOLOGY_MESSAGE, tool_calls),
            }
        }
        Err(e) => {
            log::error!("Fallback request failed: {}", e);
            if partial.is_empty() {
                ChatMessage::assistant(APOLOGY_MESSAGE, None)
            } else {
                ChatMessage::assistant(partial, None)
            }
        }
    }
}
