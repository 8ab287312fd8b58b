use std::collections::HashMap;

use faction_map_shared::{BASE_ZOOM, Faction, TILE_SIZE, TileCoord, TileKey, tile_coords_of};
use tracing::debug;

use crate::error::PaintError;
use crate::tile_cache::TileCache;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BrushMode {
    Paint,
    Erase,
}

/// Rasterizes brush dabs into faction territory tiles.
#[derive(Debug, Clone, Default)]
pub struct Painter {
    factions: HashMap<String, Faction>,
    /// When set, a dab that crosses a tile edge is drawn into every tile it
    /// overlaps instead of only the tile under its center.
    spill: bool,
}

impl Painter {
    pub fn new(factions: impl IntoIterator<Item = Faction>) -> Self {
        let mut painter = Self::default();
        painter.set_factions(factions);
        painter
    }

    pub fn with_spill(mut self, spill: bool) -> Self {
        self.spill = spill;
        self
    }

    pub fn set_factions(&mut self, factions: impl IntoIterator<Item = Faction>) {
        self.factions = factions
            .into_iter()
            .map(|faction| (faction.id.clone(), faction))
            .collect();
    }

    pub fn faction(&self, id: &str) -> Option<&Faction> {
        self.factions.get(id)
    }

    pub fn faction_ids(&self) -> impl Iterator<Item = &str> {
        self.factions.keys().map(String::as_str)
    }

    /// Paint or erase a disc of `brush_diameter` centered on a map-space point
    /// in `faction_id`'s layer. Returns the tiles that were touched (all of
    /// them are now dirty).
    pub fn paint(
        &self,
        cache: &mut TileCache,
        faction_id: &str,
        map_x: f64,
        map_y: f64,
        brush_diameter: f64,
        mode: BrushMode,
    ) -> Result<Vec<TileKey>, PaintError> {
        if !brush_diameter.is_finite() || brush_diameter <= 0.0 {
            return Err(PaintError::InvalidBrush(brush_diameter));
        }
        if !map_x.is_finite() || !map_y.is_finite() {
            return Err(PaintError::InvalidPosition(map_x, map_y));
        }

        let style = match mode {
            BrushMode::Paint => {
                let faction = self
                    .factions
                    .get(faction_id)
                    .ok_or_else(|| PaintError::UnknownFaction(faction_id.to_owned()))?;
                let style = faction.style().map_err(|source| PaintError::InvalidColor {
                    faction_id: faction_id.to_owned(),
                    source,
                })?;
                Some(style)
            }
            BrushMode::Erase => None,
        };

        let radius = brush_diameter / 2.0;
        let coords = self.tiles_for_dab(map_x, map_y, radius);
        let mut touched = Vec::with_capacity(coords.len());

        for coord in coords {
            let (origin_x, origin_y) = coord.origin();
            let local_x = map_x - origin_x;
            let local_y = map_y - origin_y;
            let key = TileKey::at(faction_id, coord);

            cache.edit(&key, |surface| match style {
                Some(style) => surface.fill_disc(local_x, local_y, radius, style.rgb, style.opacity),
                None => surface.erase_disc(local_x, local_y, radius),
            });
            touched.push(key);
        }

        debug!(
            faction_id,
            map_x,
            map_y,
            radius,
            tiles = touched.len(),
            ?mode,
            "brush dab"
        );
        Ok(touched)
    }

    fn tiles_for_dab(&self, map_x: f64, map_y: f64, radius: f64) -> Vec<TileCoord> {
        let (center_x, center_y) = tile_coords_of(map_x, map_y);
        if !self.spill {
            return vec![TileCoord::new(BASE_ZOOM, center_x, center_y)];
        }

        let (min_x, min_y) = tile_coords_of(map_x - radius, map_y - radius);
        let (max_x, max_y) = tile_coords_of(map_x + radius, map_y + radius);
        let mut coords = Vec::new();
        for y in min_y..=max_y {
            for x in min_x..=max_x {
                let coord = TileCoord::new(BASE_ZOOM, x, y);
                if disc_touches_tile(map_x, map_y, radius, coord) {
                    coords.push(coord);
                }
            }
        }
        coords
    }
}

fn disc_touches_tile(cx: f64, cy: f64, radius: f64, coord: TileCoord) -> bool {
    let (x0, y0) = coord.origin();
    let size = f64::from(TILE_SIZE);
    let nearest_x = cx.clamp(x0, x0 + size);
    let nearest_y = cy.clamp(y0, y0 + size);
    let (dx, dy) = (cx - nearest_x, cy - nearest_y);
    dx * dx + dy * dy < radius * radius
}
