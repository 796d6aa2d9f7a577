use rusqlite::params;

use crate::error::{AppError, AppResult};
use crate::state::AppState;

pub fn get(state: &AppState, key: &str) -> AppResult<Option<String>> {
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
    let result = db.query_row(
        "SELECT value FROM kv WHERE key = ?1",
        params![key],
        |row| row.get(0),
    );

    match result {
        Ok(value) => Ok(Some(value)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(AppError::Database(e.to_string())),
    }
}

pub fn set(state: &AppState, key: &str, value: &str) -> AppResult<()> {
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
    db.execute(
        "INSERT OR REPLACE INTO kv (key, value, updated_at) VALUES (?1, ?2, datetime('now'))",
        params![key, value],
    )
    .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}

pub fn remove(state: &AppState, key: &str) -> AppResult<()> {
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
    db.execute("DELETE FROM kv WHERE key = ?1", params![key])
        .map_err(|e| AppError::Database(e.to_string()))?;
    Ok(())
}

/// Keys starting with `prefix`, sorted. Used for the per-file persona cache.
pub fn list_keys(state: &AppState, prefix: &str) -> AppResult<Vec<String>> {
    let db = state.db.lock().map_err(|e| AppError::Database(e.to_string()))?;
    let mut stmt = db
        .prepare("SELECT key FROM kv WHERE key LIKE ?1 || '%' ORDER BY key")
        .map_err(|e| AppError::Database(e.to_string()))?;

    let keys = stmt
        .query_map(params![prefix], |row| row.get(0))
        .map_err(|e| AppError::Database(e.to_string()))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| AppError::Database(e.to_string()))?;

    Ok(keys)
}
