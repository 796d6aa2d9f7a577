use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::message::ChatMessage;

/// Longest auto-derived session name before the ellipsis kicks in.
const NAME_LIMIT: usize = 30;

/// A named conversation bound to an agent identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub name: String,
    pub agent_id: String,
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn new(agent_id: impl Into<String>) -> Self {
        Self::with_id(uuid::Uuid::new_v4().to_string(), agent_id)
    }

    pub fn with_id(id: impl Into<String>, agent_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            name: default_name(),
            agent_id: agent_id.into(),
            messages: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// The session collection plus the active-session pointer, as loaded into
/// memory by the session repo. Persisted as two kv keys (`sessions`,
/// `active_session`) but always mutated and re-validated together.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCollection {
    pub sessions: Vec<Session>,
    pub active_id: String,
}

pub fn default_name() -> String {
    "New Chat".into()
}

/// Derives a session name from the first user message: truncated to 30
/// characters on a char boundary, with an ellipsis appended if longer.
pub fn derive_name(first_message: &str) -> String {
    let trimmed = first_message.trim();
    if trimmed.is_empty() {
        return default_name();
    }
    let mut name: String = trimmed.chars().take(NAME_LIMIT).collect();
    if trimmed.chars().count() > NAME_LIMIT {
        name.push_str("...");
    }
    name
}
