use serde::{Deserialize, Serialize};

pub const DEFAULT_BRUSH_SIZE: f64 = 20.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Base,
    Territory,
    Marker,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerState {
    pub id: String,
    pub name: String,
    pub kind: LayerKind,
    pub visible: bool,
    pub opacity: f64,
}

impl LayerState {
    fn new(id: &str, name: &str, kind: LayerKind, opacity: f64) -> Self {
        Self {
            id: id.to_owned(),
            name: name.to_owned(),
            kind,
            visible: true,
            opacity,
        }
    }
}

/// Base land, faction territories and place markers, bottom to top.
pub fn default_layers() -> Vec<LayerState> {
    vec![
        LayerState::new("base-land", "Land/Water", LayerKind::Base, 1.0),
        LayerState::new("territories", "Territories", LayerKind::Territory, 0.6),
        LayerState::new("markers", "Markers", LayerKind::Marker, 1.0),
    ]
}

/// What pointer input on the map does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MapMode {
    #[default]
    Pan,
    AddPlace,
    Brush,
    Eraser,
}
