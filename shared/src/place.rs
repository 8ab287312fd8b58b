use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    #[default]
    Public,
    Gm,
    Player,
}

/// Presentation filter: GM sees everything, players never see GM-scoped content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    #[default]
    Gm,
    Player,
}

impl ViewMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewMode::Gm => "gm",
            ViewMode::Player => "player",
        }
    }

    pub fn shows(&self, scope: Scope) -> bool {
        match self {
            ViewMode::Gm => true,
            ViewMode::Player => scope != Scope::Gm,
        }
    }
}

impl fmt::Display for ViewMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown view mode: {0:?}")]
pub struct ViewModeParseError(pub String);

impl FromStr for ViewMode {
    type Err = ViewModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gm" => Ok(ViewMode::Gm),
            "player" => Ok(ViewMode::Player),
            _ => Err(ViewModeParseError(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MapPosition {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceKind {
    Building,
    District,
    Landmark,
    #[default]
    Other,
}

/// A point of interest rendered as a marker on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: PlaceKind,
    #[serde(default)]
    pub position: Option<MapPosition>,
    #[serde(default)]
    pub owner_faction_id: Option<String>,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub notes_public: Option<String>,
    #[serde(default)]
    pub notes_gm: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Place {
    pub fn new(id: impl Into<String>, name: impl Into<String>, x: f64, y: f64, scope: Scope) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind: PlaceKind::Other,
            position: Some(MapPosition { x, y }),
            owner_faction_id: None,
            scope,
            notes_public: None,
            notes_gm: None,
            created_at: None,
            updated_at: None,
        }
    }
}
