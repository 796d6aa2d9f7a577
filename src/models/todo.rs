use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A locally persisted todo entry. Never leaves the device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TodoItem {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub done: bool,
    pub created_at: DateTime<Utc>,
}

impl TodoItem {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.into(),
            done: false,
            created_at: Utc::now(),
        }
    }
}
