use serde::{Deserialize, Serialize};

/// A persona entry as listed by the backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentInfo {
    pub id: String,
    pub name: String,
}

/// Full persona definition: the listing entry plus its prompt file content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentPersona {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub content: String,
}
