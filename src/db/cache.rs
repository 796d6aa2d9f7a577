use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::db::kv;
use crate::error::AppResult;
use crate::state::AppState;

/// Loads and deserializes the value under `key`. `Ok(None)` means the key
/// was never written; `Err` means the store or the stored JSON is bad, and
/// callers are expected to fall back to a default rather than propagate.
pub fn load<T: DeserializeOwned>(state: &AppState, key: &str) -> AppResult<Option<T>> {
    match kv::get(state, key)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

/// Serializes `value` under `key`. Failure is acceptable data loss for this
/// class of client-local cache; callers may ignore the result.
pub fn save<T: Serialize>(state: &AppState, key: &str, value: &T) -> AppResult<()> {
    let raw = serde_json::to_string(value)?;
    kv::set(state, key, &raw)
}

/// `load` collapsed to the best-effort contract: any failure logs and
/// yields the type's default.
pub fn load_or_default<T: DeserializeOwned + Default>(state: &AppState, key: &str) -> T {
    match load(state, key) {
        Ok(Some(value)) => value,
        Ok(None) => T::default(),
        Err(e) => {
            log::warn!("Failed to load cached '{}', using default: {}", key, e);
            T::default()
        }
    }
}

/// `save` collapsed to the best-effort contract: failure logs and is
/// otherwise swallowed.
pub fn save_best_effort<T: Serialize>(state: &AppState, key: &str, value: &T) {
    if let Err(e) = save(state, key, value) {
        log::warn!("Failed to persist '{}' (data loss accepted): {}", key, e);
    }
}
