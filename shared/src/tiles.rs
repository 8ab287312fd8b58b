use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::viewport::Viewport;

/// Edge length of one territory tile in map pixels.
pub const TILE_SIZE: u32 = 256;
/// The only zoom level territory tiles are painted and stored at.
pub const BASE_ZOOM: i32 = 0;

const KEY_DELIMITER: char = '_';

/// Grid address of one tile within a faction layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileCoord {
    pub z: i32,
    pub x: i32,
    pub y: i32,
}

impl TileCoord {
    pub fn new(z: i32, x: i32, y: i32) -> Self {
        Self { z, x, y }
    }

    /// Map-space position of the tile's top-left pixel.
    pub fn origin(&self) -> (f64, f64) {
        (
            f64::from(self.x) * f64::from(TILE_SIZE),
            f64::from(self.y) * f64::from(TILE_SIZE),
        )
    }
}

/// Identifies one 256x256 raster region of one faction's territory layer.
///
/// Serialized as `{faction}_{z}_{x}_{y}`. Parsing splits from the right, so
/// faction ids that themselves contain `_` still round-trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TileKey {
    pub faction_id: String,
    pub coord: TileCoord,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed tile key: {0:?}")]
pub struct TileKeyParseError(pub String);

impl TileKey {
    pub fn new(faction_id: impl Into<String>, z: i32, x: i32, y: i32) -> Self {
        Self {
            faction_id: faction_id.into(),
            coord: TileCoord::new(z, x, y),
        }
    }

    pub fn at(faction_id: impl Into<String>, coord: TileCoord) -> Self {
        Self {
            faction_id: faction_id.into(),
            coord,
        }
    }
}

impl fmt::Display for TileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{d}{}{d}{}{d}{}",
            self.faction_id,
            self.coord.z,
            self.coord.x,
            self.coord.y,
            d = KEY_DELIMITER
        )
    }
}

impl FromStr for TileKey {
    type Err = TileKeyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || TileKeyParseError(s.to_owned());
        let mut parts = s.rsplitn(4, KEY_DELIMITER);
        let y = parts.next().and_then(|p| p.parse().ok()).ok_or_else(err)?;
        let x = parts.next().and_then(|p| p.parse().ok()).ok_or_else(err)?;
        let z = parts.next().and_then(|p| p.parse().ok()).ok_or_else(err)?;
        let faction_id = parts.next().filter(|p| !p.is_empty()).ok_or_else(err)?;
        Ok(Self::new(faction_id, z, x, y))
    }
}

/// Delimited cache key for `(faction, z, x, y)`.
pub fn tile_key(faction_id: &str, z: i32, x: i32, y: i32) -> String {
    TileKey::new(faction_id, z, x, y).to_string()
}

/// Tile grid coordinates containing a map-space point.
pub fn tile_coords_of(map_x: f64, map_y: f64) -> (i32, i32) {
    let size = f64::from(TILE_SIZE);
    ((map_x / size).floor() as i32, (map_y / size).floor() as i32)
}

/// All tiles of a `map_w` x `map_h` map that intersect the canvas area shown
/// through `viewport`. Order is unspecified.
pub fn visible_tiles(
    viewport: &Viewport,
    canvas_w: f64,
    canvas_h: f64,
    map_w: f64,
    map_h: f64,
    zoom: i32,
) -> Vec<TileCoord> {
    if viewport.scale <= 0.0 || map_w <= 0.0 || map_h <= 0.0 {
        return Vec::new();
    }

    let corners = [
        viewport.to_map(0.0, 0.0),
        viewport.to_map(canvas_w, 0.0),
        viewport.to_map(0.0, canvas_h),
        viewport.to_map(canvas_w, canvas_h),
    ];
    let (mut min_x, mut min_y, mut max_x, mut max_y) = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
    for (x, y) in corners {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }

    if max_x < 0.0 || max_y < 0.0 || min_x >= map_w || min_y >= map_h {
        return Vec::new();
    }

    let size = f64::from(TILE_SIZE);
    let last_x = (map_w / size).ceil() as i32 - 1;
    let last_y = (map_h / size).ceil() as i32 - 1;

    let min_tx = ((min_x / size).floor() as i32).max(0);
    let min_ty = ((min_y / size).floor() as i32).max(0);
    let max_tx = ((max_x / size).floor() as i32).min(last_x);
    let max_ty = ((max_y / size).floor() as i32).min(last_y);

    let mut tiles = Vec::new();
    for x in min_tx..=max_tx {
        for y in min_ty..=max_ty {
            tiles.push(TileCoord::new(zoom, x, y));
        }
    }
    tiles
}
