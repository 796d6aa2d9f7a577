use std::sync::atomic::Ordering;

use crate::db::session_repo;
use crate::error::{AppError, AppResult};
use crate::models::message::ChatMessage;
use crate::models::session::Session;
use crate::state::AppState;
use crate::stream::pipeline;

/// Sends one user turn through the streaming pipeline and returns the
/// assistant's reply. The user message is appended to the transcript before
/// the pipeline runs; the pipeline appends the assistant's turn itself.
pub async fn send_message(state: &AppState, content: String) -> AppResult<ChatMessage> {
    if state.reply_busy.load(Ordering::SeqCst) {
        return Err(AppError::Busy);
    }

    let session = active_session(state).await?;
    log::info!(
        "send_message: session_id={}, agent_id={}, content_len={}",
        session.id,
        session.agent_id,
        content.len()
    );

    {
        let state_clone = state.clone();
        let session_id = session.id.clone();
        let user_message = ChatMessage::user(content.clone());
        tokio::task::spawn_blocking(move || {
            session_repo::append_message(&state_clone, &session_id, user_message)
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
    }

    pipeline::send(state, &session.id, Some(&session.agent_id), &content).await
}

/// Cancels the in-flight reply, if any; returns whether one was cancelled.
pub fn cancel_reply(state: &AppState) -> bool {
    pipeline::cancel_active(state)
}

pub async fn active_session(state: &AppState) -> AppResult<Session> {
    let state_clone = state.clone();
    tokio::task::spawn_blocking(move || session_repo::active_session(&state_clone))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}

/// Reconciles the cached transcript with backend history, once per session
/// at startup. Backend history comes first; local-only messages (whose
/// `(role, content)` does not appear in it) are preserved and appended
/// after, in their original order.
///
/// Matching is by content because the history endpoint supplies no stable
/// message ids; duplicate user messages can therefore be collapsed. A
/// backend that grows stable ids should switch this to id matching.
pub async fn sync_history(state: &AppState, session_id: &str) -> AppResult<Session> {
    let history = match state.api.get_history(session_id).await {
        Ok(history) => history,
        Err(e) => {
            // Offline start is routine; the cached transcript stands.
            log::warn!("History fetch failed, keeping cached transcript: {}", e);
            let state_clone = state.clone();
            let session_id = session_id.to_string();
            return tokio::task::spawn_blocking(move || {
                session_repo::get_session(&state_clone, &session_id)
            })
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
        }
    };

    let state_clone = state.clone();
    let session_id = session_id.to_string();
    tokio::task::spawn_blocking(move || {
        let session = session_repo::get_session(&state_clone, &session_id)?;

        let mut merged: Vec<ChatMessage> = history
            .messages
            .iter()
            .map(|m| ChatMessage {
                id: uuid::Uuid::new_v4().to_string(),
                role: m.role,
                content: m.content.clone(),
                timestamp: m.timestamp.unwrap_or_else(chrono::Utc::now),
                tool_calls: None,
            })
            .collect();

        let local_only = session
            .messages
            .into_iter()
            .filter(|local| {
                !history
                    .messages
                    .iter()
                    .any(|m| m.role == local.role && m.content == local.content)
            })
            .collect::<Vec<_>>();
        merged.extend(local_only);

        session_repo::replace_messages(&state_clone, &session_id, merged)
    })
    .await
    .map_err(|e| AppError::Internal(e.to_string()))?
}

/// Clears the local transcript and tells the backend to do the same; the
/// backend call is best-effort and its failure is ignored.
pub async fn clear_conversation(state: &AppState, session_id: &str) -> AppResult<Session> {
    let cleared = {
        let state_clone = state.clone();
        let session_id = session_id.to_string();
        tokio::task::spawn_blocking(move || {
            session_repo::clear_messages(&state_clone, &session_id)
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??
    };

    if let Err(e) = state.api.clear_history(session_id).await {
        log::debug!("Backend clear failed (ignored): {}", e);
    }

    Ok(cleared)
}
