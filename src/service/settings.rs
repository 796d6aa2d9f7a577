use crate::db::cache;
use crate::error::{AppError, AppResult};
use crate::models::settings::Settings;
use crate::state::AppState;

const SETTINGS_KEY: &str = "settings";

/// Settings from the backend when reachable, mirrored into the local blob;
/// otherwise whatever the local blob holds.
pub async fn get_settings(state: &AppState) -> AppResult<Settings> {
    match state.api.get_settings().await {
        Ok(settings) => {
            let state_clone = state.clone();
            let settings_clone = settings.clone();
            let _ = tokio::task::spawn_blocking(move || {
                cache::save_best_effort(&state_clone, SETTINGS_KEY, &settings_clone);
            })
            .await;
            Ok(settings)
        }
        Err(e) => {
            log::warn!("Settings fetch failed, using local cache: {}", e);
            let state_clone = state.clone();
            let settings: Settings = tokio::task::spawn_blocking(move || {
                cache::load_or_default(&state_clone, SETTINGS_KEY)
            })
            .await
            .map_err(|e| AppError::Internal(e.to_string()))?;
            Ok(settings)
        }
    }
}

/// Updates the local blob, then tells the backend; a backend failure is
/// swallowed so the local cache always reflects the latest edit.
pub async fn update_settings(state: &AppState, settings: Settings) -> AppResult<()> {
    {
        let state_clone = state.clone();
        let settings_clone = settings.clone();
        tokio::task::spawn_blocking(move || {
            cache::save(&state_clone, SETTINGS_KEY, &settings_clone)
        })
        .await
        .map_err(|e| AppError::Internal(e.to_string()))??;
    }

    if let Err(e) = state.api.post_settings(&settings).await {
        log::warn!("Settings push failed (local cache kept): {}", e);
    }
    Ok(())
}
