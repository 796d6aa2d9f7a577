use crate::db::todo_repo;
use crate::error::{AppError, AppResult};
use crate::models::todo::TodoItem;
use crate::state::AppState;

pub async fn list_todos(state: &AppState) -> AppResult<Vec<TodoItem>> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || todo_repo::list_todos(&state))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}

pub async fn add_todo(state: &AppState, text: String) -> AppResult<TodoItem> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || todo_repo::add_todo(&state, &text))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}

pub async fn set_done(state: &AppState, id: String, done: bool) -> AppResult<TodoItem> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || todo_repo::set_done(&state, &id, done))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}

pub async fn delete_todo(state: &AppState, id: String) -> AppResult<()> {
    let state = state.clone();
    tokio::task::spawn_blocking(move || todo_repo::delete_todo(&state, &id))
        .await
        .map_err(|e| AppError::Internal(e.to_string()))?
}
