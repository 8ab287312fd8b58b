use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A named point-in-time version of the world. Territory tiles and the base
/// map image belong to exactly one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            created_at: None,
        }
    }
}
