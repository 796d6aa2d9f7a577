use chrono::Utc;

use crate::db::{cache, kv};
use crate::error::{AppError, AppResult};
use crate::models::message::{ChatMessage, Role};
use crate::models::session::{self, Session, SessionCollection};
use crate::state::AppState;

const SESSIONS_KEY: &str = "sessions";
const ACTIVE_KEY: &str = "active_session";
const CLIENT_ID_KEY: &str = "client_id";

/// Agent bound to the session created on first run or as invariant backfill
/// when no other identity is available.
const DEFAULT_AGENT_ID: &str = "default";

/// Loads the collection and repairs it to the store invariants: at least one
/// session present, and the active pointer referencing a present session.
/// A corrupt stored document degrades to the seeded default rather than
/// failing the caller; the next save overwrites it.
pub fn load_collection(state: &AppState) -> AppResult<SessionCollection> {
    let mut sessions: Vec<Session> = match cache::load(state, SESSIONS_KEY) {
        Ok(stored) => stored.unwrap_or_default(),
        Err(e) => {
            log::warn!("Stored session collection unreadable, resetting: {}", e);
            Vec::new()
        }
    };

    if sessions.is_empty() {
        // First run (or wiped cache): seed with a session pinned to the
        // stable client id so the backend conversation survives a reset.
        sessions.push(Session::with_id(client_id(state)?, DEFAULT_AGENT_ID));
    }

    let active_id: Option<String> = cache::load(state, ACTIVE_KEY).unwrap_or_else(|e| {
        log::warn!("Stored active-session pointer unreadable: {}", e);
        None
    });
    let active_id = match active_id {
        Some(id) if sessions.iter().any(|s| s.id == id) => id,
        _ => sessions[0].id.clone(),
    };

    Ok(SessionCollection {
        sessions,
        active_id,
    })
}

fn save_collection(state: &AppState, collection: &SessionCollection) -> AppResult<()> {
    cache::save(state, SESSIONS_KEY, &collection.sessions)?;
    cache::save(state, ACTIVE_KEY, &collection.active_id)
}

/// The browser-stable identifier of the original client, generated once and
/// reused for the lifetime of the local store.
pub fn client_id(state: &AppState) -> AppResult<String> {
    if let Some(id) = kv::get(state, CLIENT_ID_KEY)? {
        return Ok(id);
    }
    let id = uuid::Uuid::new_v4().to_string();
    kv::set(state, CLIENT_ID_KEY, &id)?;
    Ok(id)
}

pub fn get_session(state: &AppState, id: &str) -> AppResult<Session> {
    let collection = load_collection(state)?;
    collection
        .sessions
        .into_iter()
        .find(|s| s.id == id)
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))
}

pub fn active_session(state: &AppState) -> AppResult<Session> {
    let collection = load_collection(state)?;
    let active_id = collection.active_id;
    collection
        .sessions
        .into_iter()
        .find(|s| s.id == active_id)
        .ok_or_else(|| AppError::NotFound(format!("Session {active_id} not found")))
}

/// Prepends a new empty session bound to `agent_id` and makes it active.
pub fn create_session(state: &AppState, agent_id: &str) -> AppResult<Session> {
    let mut collection = load_collection(state)?;
    let session = Session::new(agent_id);
    collection.active_id = session.id.clone();
    collection.sessions.insert(0, session.clone());
    save_collection(state, &collection)?;
    Ok(session)
}

/// Moves the active pointer. A no-op when `id` is not in the collection.
pub fn switch_session(state: &AppState, id: &str) -> AppResult<()> {
    let mut collection = load_collection(state)?;
    if collection.sessions.iter().any(|s| s.id == id) {
        collection.active_id = id.to_string();
        save_collection(state, &collection)?;
    }
    Ok(())
}

/// Removes a session. Deleting the last remaining session atomically
/// replaces it with a fresh empty one; the active pointer is re-aimed when
/// it referenced the removed session.
pub fn delete_session(state: &AppState, id: &str) -> AppResult<()> {
    let mut collection = load_collection(state)?;
    let Some(index) = collection.sessions.iter().position(|s| s.id == id) else {
        return Err(AppError::NotFound(format!("Session {id} not found")));
    };
    let removed = collection.sessions.remove(index);

    if collection.sessions.is_empty() {
        collection
            .sessions
            .push(Session::new(removed.agent_id.clone()));
    }
    if collection.active_id == id {
        collection.active_id = collection.sessions[0].id.clone();
    }
    save_collection(state, &collection)
}

pub fn list_sessions(state: &AppState) -> AppResult<Vec<Session>> {
    Ok(load_collection(state)?.sessions)
}

fn mutate_session<F>(state: &AppState, id: &str, mutate: F) -> AppResult<Session>
where
    F: FnOnce(&mut Session),
{
    let mut collection = load_collection(state)?;
    let session = collection
        .sessions
        .iter_mut()
        .find(|s| s.id == id)
        .ok_or_else(|| AppError::NotFound(format!("Session {id} not found")))?;

    mutate(session);
    // Every mutation bumps updated_at, even when the content is unchanged.
    session.updated_at = Utc::now();
    let session = session.clone();
    save_collection(state, &collection)?;
    Ok(session)
}

pub fn update_agent(state: &AppState, id: &str, agent_id: &str) -> AppResult<Session> {
    mutate_session(state, id, |s| s.agent_id = agent_id.to_string())
}

pub fn rename_session(state: &AppState, id: &str, name: &str) -> AppResult<Session> {
    mutate_session(state, id, |s| s.name = name.to_string())
}

/// Appends a message. The first user message of an empty session also
/// derives the session name.
pub fn append_message(state: &AppState, id: &str, message: ChatMessage) -> AppResult<Session> {
    mutate_session(state, id, |s| {
        if s.messages.is_empty() && message.role == Role::User {
            s.name = session::derive_name(&message.content);
        }
        s.messages.push(message);
    })
}

pub fn replace_messages(
    state: &AppState,
    id: &str,
    messages: Vec<ChatMessage>,
) -> AppResult<Session> {
    mutate_session(state, id, |s| s.messages = messages)
}

pub fn clear_messages(state: &AppState, id: &str) -> AppResult<Session> {
    mutate_session(state, id, |s| s.messages.clear())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;

    #[test]
    fn test_first_load_seeds_one_session_with_client_id() {
        let state = AppState::in_memory();
        let collection = load_collection(&state).expect("load");

        assert_eq!(collection.sessions.len(), 1);
        assert_eq!(collection.active_id, collection.sessions[0].id);
        assert_eq!(
            collection.sessions[0].id,
            client_id(&state).expect("client id")
        );
    }

    #[test]
    fn test_create_prepends_and_activates() {
        let state = AppState::in_memory();
        let created = create_session(&state, "coach").expect("create");

        let collection = load_collection(&state).expect("load");
        assert_eq!(collection.sessions.len(), 2);
        assert_eq!(collection.sessions[0].id, created.id);
        assert_eq!(collection.active_id, created.id);
    }

    #[test]
    fn test_switch_to_unknown_id_is_noop() {
        let state = AppState::in_memory();
        let before = load_collection(&state).expect("load");
        switch_session(&state, "no-such-session").expect("switch");
        let after = load_collection(&state).expect("load");
        assert_eq!(after.active_id, before.active_id);
    }

    #[test]
    fn test_delete_last_session_backfills_fresh_one() {
        let state = AppState::in_memory();
        let only = load_collection(&state).expect("load").sessions[0].clone();

        delete_session(&state, &only.id).expect("delete");

        let collection = load_collection(&state).expect("load");
        assert_eq!(collection.sessions.len(), 1);
        assert_ne!(collection.sessions[0].id, only.id);
        assert!(collection.sessions[0].messages.is_empty());
        assert_eq!(collection.active_id, collection.sessions[0].id);
    }

    #[test]
    fn test_delete_active_repoints_delete_other_does_not() {
        let state = AppState::in_memory();
        let first = load_collection(&state).expect("load").sessions[0].clone();
        let second = create_session(&state, "coach").expect("create");

        // second is active; deleting first must not move the pointer
        delete_session(&state, &first.id).expect("delete inactive");
        assert_eq!(load_collection(&state).expect("load").active_id, second.id);

        let third = create_session(&state, "editor").expect("create");
        delete_session(&state, &third.id).expect("delete active");
        let collection = load_collection(&state).expect("load");
        assert_eq!(collection.active_id, collection.sessions[0].id);
        assert_eq!(collection.active_id, second.id);
    }

    #[test]
    fn test_append_first_user_message_derives_name() {
        let state = AppState::in_memory();
        let session = create_session(&state, "coach").expect("create");

        let updated = append_message(
            &state,
            &session.id,
            ChatMessage::user("please summarize my unread mail for today"),
        )
        .expect("append");

        assert_eq!(updated.name, "please summarize my unread mai...");
        assert_eq!(updated.messages.len(), 1);

        // A second message must not rename the session
        let renamed = append_message(&state, &session.id, ChatMessage::user("thanks"))
            .expect("append");
        assert_eq!(renamed.name, updated.name);
    }

    #[test]
    fn test_clear_messages_bumps_updated_at_even_when_empty() {
        let state = AppState::in_memory();
        let session = create_session(&state, "coach").expect("create");
        let before = get_session(&state, &session.id).expect("get").updated_at;

        std::thread::sleep(std::time::Duration::from_millis(5));
        let cleared = clear_messages(&state, &session.id).expect("clear");
        assert!(cleared.messages.is_empty());
        assert!(cleared.updated_at > before);
    }

    #[test]
    fn test_corrupt_collection_degrades_to_seeded_default() {
        let state = AppState::in_memory();
        kv::set(&state, SESSIONS_KEY, "{broken").expect("set");
        kv::set(&state, ACTIVE_KEY, "also broken").expect("set");

        let collection = load_collection(&state).expect("load");
        assert_eq!(collection.sessions.len(), 1);
        assert_eq!(collection.active_id, collection.sessions[0].id);
    }

    #[test]
    fn test_client_id_is_stable() {
        let state = AppState::in_memory();
        let a = client_id(&state).expect("first");
        let b = client_id(&state).expect("second");
        assert_eq!(a, b);
    }
}
