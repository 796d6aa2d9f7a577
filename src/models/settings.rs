use serde::{Deserialize, Serialize};

/// Provider/channel configuration, kept as an opaque key-value blob.
///
/// The field set belongs to the settings form in the embedding surface; this
/// crate only moves the blob between the backend and the local cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Settings(pub serde_json::Map<String, serde_json::Value>);

impl Settings {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
