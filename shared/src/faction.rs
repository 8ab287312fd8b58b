use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::colors::{ColorParseError, parse_hex_color};

/// A faction as served by the backend. Painting only reads `id`, `color` and `opacity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faction {
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub color: String,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default)]
    pub notes_public: Option<String>,
    #[serde(default)]
    pub notes_gm: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

fn default_opacity() -> f64 {
    0.5
}

/// Resolved fill style of a faction's territory.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TerritoryStyle {
    pub rgb: (u8, u8, u8),
    /// Clamped to `0.0..=1.0`.
    pub opacity: f64,
}

impl Faction {
    pub fn new(id: impl Into<String>, color: impl Into<String>, opacity: f64) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            color: color.into(),
            opacity,
            notes_public: None,
            notes_gm: None,
            created_at: None,
            updated_at: None,
        }
    }

    pub fn style(&self) -> Result<TerritoryStyle, ColorParseError> {
        let rgb = parse_hex_color(&self.color)?;
        let opacity = if self.opacity.is_finite() {
            self.opacity.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Ok(TerritoryStyle { rgb, opacity })
    }
}
