use crate::db::session_repo;
use crate::error::{AppError, AppResult};
use crate::models::session::Session;
use crate::state::AppState;

pub async fn list_sessions(state: &AppState) -> AppResult<Vec<Session>> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || session_repo::list_sessions(&state))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}

pub async fn create_session(state: &AppState, agent_id: String) -> AppResult<Session> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || session_repo::create_session(&state, &agent_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}

pub async fn switch_session(state: &AppState, id: String) -> AppResult<()> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || session_repo::switch_session(&state, &id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}

pub async fn delete_session(state: &AppState, id: String) -> AppResult<()> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || session_repo::delete_session(&state, &id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}

pub async fn rename_session(state: &AppState, id: String, name: String) -> AppResult<Session> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || session_repo::rename_session(&state, &id, &name))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}

pub async fn update_agent(state: &AppState, id: String, agent_id: String) -> AppResult<Session> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || session_repo::update_agent(&state, &id, &agent_id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}
