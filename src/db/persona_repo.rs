use crate::db::kv;
use crate::error::AppResult;
use crate::state::AppState;

const PERSONA_PREFIX: &str = "persona:";

fn persona_key(filename: &str) -> String {
    format!("{PERSONA_PREFIX}{filename}")
}

/// Cached persona file content, one kv entry per logical filename.
pub fn get_content(state: &AppState, filename: &str) -> AppResult<Option<String>> {
    kv::get(state, &persona_key(filename))
}

pub fn set_content(state: &AppState, filename: &str, content: &str) -> AppResult<()> {
    kv::set(state, &persona_key(filename), content)
}

pub fn remove_content(state: &AppState, filename: &str) -> AppResult<()> {
    kv::remove(state, &persona_key(filename))
}

pub fn list_cached(state: &AppState) -> AppResult<Vec<String>> {
    let keys = kv::list_keys(state, PERSONA_PREFIX)?;
    Ok(keys
        .into_iter()
        .map(|k| k[PERSONA_PREFIX.len()..].to_string())
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;

    #[test]
    fn test_persona_cache_crud() {
        let state = AppState::in_memory();
        set_content(&state, "coach.md", "You are a running coach.").expect("set");
        set_content(&state, "editor.md", "You edit prose.").expect("set");

        assert_eq!(
            get_content(&state, "coach.md").expect("get").as_deref(),
            Some("You are a running coach.")
        );
        assert_eq!(
            list_cached(&state).expect("list"),
            vec!["coach.md", "editor.md"]
        );

        remove_content(&state, "coach.md").expect("remove");
        assert_eq!(get_content(&state, "coach.md").expect("get"), None);
    }
}
