use crate::db::persona_repo;
use crate::error::{AppError, AppResult};
use crate::models::agent::{AgentInfo, AgentPersona};
use crate::state::AppState;

fn persona_filename(id: &str) -> String {
    format!("{id}.md")
}

/// Lists personas from the backend. Errors propagate; the surface alerts.
pub async fn list_personas(state: &AppState) -> AppResult<Vec<AgentInfo>> {
    state.api.list_agents().await
}

/// Fetches a persona, refreshing the local content cache on success. When
/// the backend is unreachable, a cached copy stands in; only a miss on both
/// is an error.
pub async fn load_persona(state: &AppState, id: &str) -> AppResult<AgentPersona> {
    match state.api.get_agent(id).await {
        Ok(persona) => {
            let state_clone = state.clone();
            let filename = persona_filename(id);
            let content = persona.content.clone();
            let _ = tokio::task::spawn_blocking(move || {
                persona_repo::set_content(&state_clone, &filename, &content)
            })
            .await;
            Ok(persona)
        }
        Err(AppError::NotFound(e)) => Err(AppError::NotFound(e)),
        Err(e) => {
            log::warn!("Persona fetch failed, trying cache: {}", e);
            let state_clone = state.clone();
            let filename = persona_filename(id);
            let cached = tokio::task::spawn_blocking(move || {
                persona_repo::get_content(&state_clone, &filename)
            })
            .await
            .map_err(|e| AppError::Internal(e.to_string()))??;

            match cached {
                Some(content) => Ok(AgentPersona {
                    id: id.to_string(),
                    name: id.to_string(),
                    content,
                }),
                None => Err(e),
            }
        }
    }
}

/// Pushes a persona to the backend and mirrors it into the cache. Backend
/// errors propagate; the cache write is best-effort.
pub async fn save_persona(state: &AppState, persona: AgentPersona) -> AppResult<()> {
    state.api.put_agent(&persona).await?;

    let state_clone = state.clone();
    let filename = persona_filename(&persona.id);
    let result = tokio::task::spawn_blocking(move || {
        persona_repo::set_content(&state_clone, &filename, &persona.content)
    })
    .await;
    if let Ok(Err(e)) = result {
        log::warn!("Persona cache write failed (ignored): {}", e);
    }
    Ok(())
}

pub async fn delete_persona(state: &AppState, id: String) -> AppResult<()> {
    state.api.delete_agent(&id).await?;

    let state_clone = state.clone();
    let filename = persona_filename(&id);
    let result = tokio::task::spawn_blocking(move || {
        persona_repo::remove_content(&state_clone, &filename)
    })
    .await;
    if let Ok(Err(e)) = result {
        log::warn!("Persona cache removal failed (ignored): {}", e);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_load_persona_falls_back_to_cache_when_offline() {
        let state = AppState::in_memory();
        {
            let state = state.clone();
            tokio::task::spawn_blocking(move || {
                persona_repo::set_content(&state, "coach.md", "You are a running coach.")
            })
            .await
            .expect("join")
            .expect("set");
        }

        let persona = load_persona(&state, "coach").await.expect("load");
        assert_eq!(persona.id, "coach");
        assert_eq!(persona.content, "You are a running coach.");
    }
}
