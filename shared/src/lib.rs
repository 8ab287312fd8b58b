pub mod colors;
pub mod faction;
pub mod layers;
pub mod place;
pub mod snapshot;
pub mod tiles;
pub mod viewport;
pub mod wire;

pub use colors::{ColorParseError, parse_hex_color};
pub use faction::{Faction, TerritoryStyle};
pub use layers::{DEFAULT_BRUSH_SIZE, LayerKind, LayerState, MapMode, default_layers};
pub use place::{MapPosition, Place, PlaceKind, Scope, ViewMode, ViewModeParseError};
pub use snapshot::Snapshot;
pub use tiles::{BASE_ZOOM, TILE_SIZE, TileCoord, TileKey, tile_coords_of, tile_key, visible_tiles};
pub use viewport::Viewport;
pub use wire::*;
