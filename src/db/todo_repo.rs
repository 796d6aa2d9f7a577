use crate::db::cache;
use crate::error::{AppError, AppResult};
use crate::models::todo::TodoItem;
use crate::state::AppState;

const TODOS_KEY: &str = "todos";

pub fn list_todos(state: &AppState) -> AppResult<Vec<TodoItem>> {
    Ok(cache::load(state, TODOS_KEY)?.unwrap_or_default())
}

pub fn add_todo(state: &AppState, text: &str) -> AppResult<TodoItem> {
    let mut todos = list_todos(state)?;
    let todo = TodoItem::new(text);
    todos.push(todo.clone());
    cache::save(state, TODOS_KEY, &todos)?;
    Ok(todo)
}

pub fn set_done(state: &AppState, id: &str, done: bool) -> AppResult<TodoItem> {
    let mut todos = list_todos(state)?;
    let todo = todos
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or_else(|| AppError::NotFound(format!("Todo {id} not found")))?;
    todo.done = done;
    let todo = todo.clone();
    cache::save(state, TODOS_KEY, &todos)?;
    Ok(todo)
}

pub fn delete_todo(state: &AppState, id: &str) -> AppResult<()> {
    let mut todos = list_todos(state)?;
    let before = todos.len();
    todos.retain(|t| t.id != id);
    if todos.len() == before {
        return Err(AppError::NotFound(format!("Todo {id} not found")));
    }
    cache::save(state, TODOS_KEY, &todos)
}
