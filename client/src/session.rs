//! One map editing session: viewport, layers, input handling, the tile cache
//! with its upload scheduler, tile and base map loading, and teardown.

use std::collections::{BTreeSet, HashSet};

use faction_map_shared::{
    BASE_ZOOM, DEFAULT_BRUSH_SIZE, LayerKind, LayerState, MapMode, MapUploadResponse, Place, TileKey,
    ViewMode, Viewport, default_layers, tile_coords_of, visible_tiles,
};
use futures::StreamExt;
use image::RgbaImage;
use tracing::{debug, info, warn};

use crate::api::ApiClient;
use crate::base_map::{self, BaseMap, BaseMapLoad, BaseMapRequest};
use crate::config::ClientConfig;
use crate::error::{ApiError, PaintError, TileLoadError};
use crate::painter::{BrushMode, Painter};
use crate::renderer::{self, MARKER_HIGHLIGHT_RADIUS, RenderInput};
use crate::surface::TileSurface;
use crate::tile_cache::{self, SharedTileCache, TileCache};
use crate::upload::{FlushReport, UploadPhase, UploadScheduler};

pub const DEFAULT_CANVAS_SIZE: (u32, u32) = (1280, 800);

/// What an input event did to the session.
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    Ignored,
    Panned,
    Zoomed,
    Painted(Vec<TileKey>),
    PaintRejected(PaintError),
    PlaceSelected(String),
    SelectionCleared,
    /// Map-space point clicked while adding a place.
    MapClick { x: f64, y: f64 },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TileLoadSummary {
    pub requested: usize,
    pub loaded: usize,
    pub empty: usize,
    pub failed: usize,
}

#[derive(Debug, Clone, Copy)]
struct Drag {
    last_x: f64,
    last_y: f64,
}

pub struct MapSession {
    api: ApiClient,
    config: ClientConfig,
    snapshot_id: String,
    viewport: Viewport,
    canvas_size: (u32, u32),
    layers: Vec<LayerState>,
    mode: MapMode,
    brush_size: f64,
    selected_faction: Option<String>,
    selected_place: Option<String>,
    painter: Painter,
    places: Vec<Place>,
    cache: SharedTileCache,
    scheduler: UploadScheduler,
    /// Keys already fetched or in flight; a key leaves the set only when its
    /// fetch fails, so the next refresh retries it.
    requested: HashSet<TileKey>,
    base_map: BaseMap,
    drag: Option<Drag>,
}

impl MapSession {
    pub fn new(api: ApiClient, config: ClientConfig, snapshot_id: impl Into<String>) -> Self {
        let snapshot_id = snapshot_id.into();
        let cache = tile_cache::shared(TileCache::new());
        let scheduler = UploadScheduler::new(
            api.clone(),
            snapshot_id.clone(),
            cache.clone(),
            config.upload_debounce,
        );
        Self {
            painter: Painter::default().with_spill(config.brush_spill),
            api,
            config,
            snapshot_id,
            viewport: Viewport::default(),
            canvas_size: DEFAULT_CANVAS_SIZE,
            layers: default_layers(),
            mode: MapMode::default(),
            brush_size: DEFAULT_BRUSH_SIZE,
            selected_faction: None,
            selected_place: None,
            places: Vec::new(),
            cache,
            scheduler,
            requested: HashSet::new(),
            base_map: BaseMap::new(),
            drag: None,
        }
    }

    /// Build a session from config and load factions, places and the base map.
    pub async fn open(config: ClientConfig, snapshot_id: impl Into<String>) -> Result<Self, ApiError> {
        let api = ApiClient::new(&config)?;
        let mut session = Self::new(api, config, snapshot_id);
        session.load_catalog().await?;
        session.reload_base_map().await;
        Ok(session)
    }

    pub async fn load_catalog(&mut self) -> Result<(), ApiError> {
        let factions = self.api.list_factions().await?;
        let places = self.api.list_places().await?;
        info!(
            snapshot_id = %self.snapshot_id,
            factions = factions.len(),
            places = places.len(),
            "loaded map catalog"
        );
        self.painter.set_factions(factions);
        self.places = places;
        Ok(())
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn snapshot_id(&self) -> &str {
        &self.snapshot_id
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    pub fn canvas_size(&self) -> (u32, u32) {
        self.canvas_size
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.canvas_size = (width.max(1), height.max(1));
    }

    pub fn map_size(&self) -> (u32, u32) {
        self.base_map.size()
    }

    pub fn base_map(&self) -> &BaseMap {
        &self.base_map
    }

    pub fn fit_to_map(&mut self) {
        let (w, h) = self.map_size();
        let (cw, ch) = self.canvas_size;
        self.viewport
            .fit_bounds(0.0, 0.0, f64::from(w), f64::from(h), f64::from(cw), f64::from(ch));
    }

    pub fn layers(&self) -> &[LayerState] {
        &self.layers
    }

    pub fn set_layer_visible(&mut self, layer_id: &str, visible: bool) -> bool {
        match self.layers.iter_mut().find(|layer| layer.id == layer_id) {
            Some(layer) => {
                layer.visible = visible;
                true
            }
            None => false,
        }
    }

    pub fn set_layer_opacity(&mut self, layer_id: &str, opacity: f64) -> bool {
        match self.layers.iter_mut().find(|layer| layer.id == layer_id) {
            Some(layer) => {
                layer.opacity = opacity.clamp(0.0, 1.0);
                true
            }
            None => false,
        }
    }

    pub fn mode(&self) -> MapMode {
        self.mode
    }

    pub fn set_mode(&mut self, mode: MapMode) {
        self.mode = mode;
        self.drag = None;
    }

    pub fn brush_size(&self) -> f64 {
        self.brush_size
    }

    pub fn set_brush_size(&mut self, size: f64) {
        if size.is_finite() && size > 0.0 {
            self.brush_size = size;
        }
    }

    pub fn selected_faction(&self) -> Option<&str> {
        self.selected_faction.as_deref()
    }

    pub fn select_faction(&mut self, faction_id: Option<&str>) {
        self.selected_faction = faction_id.map(str::to_owned);
    }

    pub fn selected_place(&self) -> Option<&str> {
        self.selected_place.as_deref()
    }

    pub fn select_place(&mut self, place_id: Option<&str>) {
        self.selected_place = place_id.map(str::to_owned);
    }

    pub fn places(&self) -> &[Place] {
        &self.places
    }

    pub fn set_places(&mut self, places: Vec<Place>) {
        self.places = places;
    }

    pub fn painter(&self) -> &Painter {
        &self.painter
    }

    pub fn view_mode(&self) -> ViewMode {
        self.api.view_mode()
    }

    /// Switch GM/player presentation. Later requests carry the new mode, and a
    /// selected place that is now hidden is deselected.
    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.api.set_view_mode(mode);
        self.config.view_mode = mode;
        let hidden = self.selected_place.as_deref().is_some_and(|id| {
            self.places
                .iter()
                .any(|place| place.id == id && !mode.shows(place.scope))
        });
        if hidden {
            self.selected_place = None;
        }
    }

    pub fn tiles(&self) -> SharedTileCache {
        self.cache.clone()
    }

    /// Paint or erase at a map-space point with the current brush size.
    ///
    /// Painting needs a selected faction. Erasing with a faction selected only
    /// clears that faction's layer; without one it clears every faction layer
    /// that has a tile at the point.
    pub fn paint(&mut self, map_x: f64, map_y: f64, mode: BrushMode) -> Result<Vec<TileKey>, PaintError> {
        let factions: Vec<String> = match (mode, &self.selected_faction) {
            (_, Some(faction_id)) => vec![faction_id.clone()],
            (BrushMode::Paint, None) => return Err(PaintError::NoFactionSelected),
            (BrushMode::Erase, None) => self.factions_with_tile_at(map_x, map_y),
        };

        let mut touched = Vec::new();
        {
            let mut cache = tile_cache::lock(&self.cache);
            for faction_id in &factions {
                touched.extend(self.painter.paint(
                    &mut cache,
                    faction_id,
                    map_x,
                    map_y,
                    self.brush_size,
                    mode,
                )?);
            }
        }

        if !touched.is_empty() {
            self.scheduler.schedule();
        }
        Ok(touched)
    }

    fn factions_with_tile_at(&self, map_x: f64, map_y: f64) -> Vec<String> {
        let (tx, ty) = tile_coords_of(map_x, map_y);
        let cache = tile_cache::lock(&self.cache);
        let factions: BTreeSet<&str> = cache
            .keys()
            .filter(|key| key.coord.z == BASE_ZOOM && key.coord.x == tx && key.coord.y == ty)
            .map(|key| key.faction_id.as_str())
            .collect();
        factions.into_iter().map(str::to_owned).collect()
    }

    fn stroke(&mut self, canvas_x: f64, canvas_y: f64) -> MapEvent {
        let mode = match self.mode {
            MapMode::Brush => BrushMode::Paint,
            MapMode::Eraser => BrushMode::Erase,
            MapMode::Pan | MapMode::AddPlace => return MapEvent::Ignored,
        };
        let (map_x, map_y) = self.viewport.to_map(canvas_x, canvas_y);
        match self.paint(map_x, map_y, mode) {
            Ok(tiles) => MapEvent::Painted(tiles),
            Err(e) => {
                debug!(error = %e, map_x, map_y, "paint rejected");
                MapEvent::PaintRejected(e)
            }
        }
    }

    pub fn pointer_down(&mut self, canvas_x: f64, canvas_y: f64) -> MapEvent {
        match self.mode {
            MapMode::Pan => {
                self.drag = Some(Drag {
                    last_x: canvas_x,
                    last_y: canvas_y,
                });
                MapEvent::Ignored
            }
            MapMode::Brush | MapMode::Eraser => {
                self.drag = Some(Drag {
                    last_x: canvas_x,
                    last_y: canvas_y,
                });
                self.stroke(canvas_x, canvas_y)
            }
            MapMode::AddPlace => MapEvent::Ignored,
        }
    }

    pub fn pointer_move(&mut self, canvas_x: f64, canvas_y: f64) -> MapEvent {
        let Some(drag) = self.drag else {
            return MapEvent::Ignored;
        };
        self.drag = Some(Drag {
            last_x: canvas_x,
            last_y: canvas_y,
        });
        match self.mode {
            MapMode::Pan => {
                self.viewport
                    .pan(canvas_x - drag.last_x, canvas_y - drag.last_y);
                MapEvent::Panned
            }
            MapMode::Brush | MapMode::Eraser => self.stroke(canvas_x, canvas_y),
            MapMode::AddPlace => MapEvent::Ignored,
        }
    }

    pub fn pointer_up(&mut self) {
        self.drag = None;
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn wheel(&mut self, delta: f64, canvas_x: f64, canvas_y: f64) -> MapEvent {
        self.viewport.zoom_at(delta, canvas_x, canvas_y);
        MapEvent::Zoomed
    }

    /// A click without drag. Markers take precedence over the current mode.
    pub fn click(&mut self, canvas_x: f64, canvas_y: f64) -> MapEvent {
        let markers_visible = self
            .layers
            .iter()
            .any(|layer| layer.kind == LayerKind::Marker && layer.visible);
        if markers_visible {
            let hit = renderer::hit_test_marker(
                &self.places,
                &self.viewport,
                self.view_mode(),
                canvas_x,
                canvas_y,
                MARKER_HIGHLIGHT_RADIUS,
            );
            if let Some(place) = hit {
                let id = place.id.clone();
                self.selected_place = Some(id.clone());
                return MapEvent::PlaceSelected(id);
            }
        }

        if self.mode == MapMode::AddPlace {
            let (x, y) = self.viewport.to_map(canvas_x, canvas_y);
            return MapEvent::MapClick { x, y };
        }
        if self.selected_place.take().is_some() {
            return MapEvent::SelectionCleared;
        }
        MapEvent::Ignored
    }

    pub fn render(&self) -> RgbaImage {
        let (width, height) = self.canvas_size;
        let mut frame = RgbaImage::new(width, height);
        self.render_into(&mut frame);
        frame
    }

    pub fn render_into(&self, frame: &mut RgbaImage) {
        let cache = tile_cache::lock(&self.cache);
        renderer::render_frame(
            frame,
            &RenderInput {
                viewport: &self.viewport,
                layers: &self.layers,
                base_image: self.base_map.image(),
                map_size: self.base_map.size(),
                tiles: &cache,
                places: &self.places,
                view_mode: self.view_mode(),
                selected_place: self.selected_place.as_deref(),
            },
        );
    }

    /// Visible tile keys for every known faction that have not been requested
    /// yet. They are recorded as requested.
    pub fn pending_tile_requests(&mut self) -> Vec<TileKey> {
        let (map_w, map_h) = self.map_size();
        let (canvas_w, canvas_h) = self.canvas_size;
        let coords = visible_tiles(
            &self.viewport,
            f64::from(canvas_w),
            f64::from(canvas_h),
            f64::from(map_w),
            f64::from(map_h),
            BASE_ZOOM,
        );

        let mut faction_ids: Vec<&str> = self.painter.faction_ids().collect();
        faction_ids.sort_unstable();

        let mut keys = Vec::new();
        for faction_id in faction_ids {
            for coord in &coords {
                let key = TileKey::at(faction_id, *coord);
                if self.requested.insert(key.clone()) {
                    keys.push(key);
                }
            }
        }
        keys
    }

    /// Fetch every visible tile not fetched yet, a bounded number at a time.
    pub async fn load_visible_tiles(&mut self) -> TileLoadSummary {
        let keys = self.pending_tile_requests();
        let mut summary = TileLoadSummary {
            requested: keys.len(),
            ..TileLoadSummary::default()
        };
        if keys.is_empty() {
            return summary;
        }

        let api = self.api.clone();
        let snapshot_id = self.snapshot_id.clone();
        let results: Vec<_> = futures::stream::iter(keys)
            .map(|key| {
                let api = api.clone();
                let snapshot_id = snapshot_id.clone();
                async move {
                    let result = fetch_tile(&api, &snapshot_id, &key).await;
                    (key, result)
                }
            })
            .buffer_unordered(self.config.tile_fetch_concurrency.max(1))
            .collect()
            .await;

        for (key, result) in results {
            match &result {
                Ok(Some(_)) => summary.loaded += 1,
                Ok(None) => summary.empty += 1,
                Err(_) => summary.failed += 1,
            }
            self.apply_tile_load(key, result);
        }
        debug!(
            snapshot_id = %self.snapshot_id,
            requested = summary.requested,
            loaded = summary.loaded,
            empty = summary.empty,
            failed = summary.failed,
            "loaded visible tiles"
        );
        summary
    }

    /// Install one tile fetch result. Returns true when a surface was stored.
    pub fn apply_tile_load(
        &mut self,
        key: TileKey,
        result: Result<Option<TileSurface>, TileLoadError>,
    ) -> bool {
        match result {
            Ok(Some(surface)) => {
                let stored = tile_cache::lock(&self.cache).store_loaded(&key, surface);
                if !stored {
                    debug!(tile = %key, "kept local edits over fetched tile");
                }
                stored
            }
            // Nothing painted there yet; painting allocates the surface.
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, tile = %key, "failed to load tile");
                self.requested.remove(&key);
                false
            }
        }
    }

    pub fn begin_base_map_load(&mut self) -> BaseMapRequest {
        self.base_map.begin(&self.snapshot_id)
    }

    pub fn apply_base_map(&mut self, load: BaseMapLoad) -> bool {
        self.base_map.apply(load)
    }

    pub async fn reload_base_map(&mut self) {
        let request = self.begin_base_map_load();
        let load = base_map::fetch(&self.api, request).await;
        self.apply_base_map(load);
    }

    /// Persist pending edits of the current snapshot, then start over on another one.
    pub async fn switch_snapshot(&mut self, snapshot_id: impl Into<String>) -> FlushReport {
        let report = self.scheduler.shutdown().await;
        if !report.is_clean() {
            warn!(
                snapshot_id = %self.snapshot_id,
                failed = ?report.failed_factions,
                "discarding unsaved tiles of previous snapshot"
            );
        }

        self.snapshot_id = snapshot_id.into();
        self.cache = tile_cache::shared(TileCache::new());
        self.scheduler = UploadScheduler::new(
            self.api.clone(),
            self.snapshot_id.clone(),
            self.cache.clone(),
            self.config.upload_debounce,
        );
        self.requested.clear();
        self.selected_place = None;
        self.drag = None;
        self.reload_base_map().await;
        info!(snapshot_id = %self.snapshot_id, "switched snapshot");
        report
    }

    pub async fn flush_uploads(&self) -> FlushReport {
        self.scheduler.flush_now().await
    }

    pub fn upload_phase(&self) -> UploadPhase {
        self.scheduler.phase()
    }

    pub fn has_pending_upload(&self) -> bool {
        self.scheduler.has_pending_timer()
    }

    /// Delete a faction's stored tiles on the backend and drop them locally,
    /// including unsaved edits.
    pub async fn clear_faction_tiles(&mut self, faction_id: &str) -> Result<usize, ApiError> {
        // No batch may be in flight between the delete and the local drop.
        let _exclusive = self.scheduler.exclusive().await;
        let deleted = self.api.delete_tiles(&self.snapshot_id, faction_id).await?;
        tile_cache::lock(&self.cache).remove_faction(faction_id);
        self.requested.retain(|key| key.faction_id != faction_id);
        info!(snapshot_id = %self.snapshot_id, faction_id, deleted, "cleared faction tiles");
        Ok(deleted)
    }

    pub async fn upload_base_map(
        &mut self,
        file_name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<MapUploadResponse, ApiError> {
        let response = self
            .api
            .upload_map(&self.snapshot_id, file_name, content_type, data)
            .await?;
        self.reload_base_map().await;
        Ok(response)
    }

    pub async fn remove_base_map(&mut self) -> Result<(), ApiError> {
        self.api.delete_map(&self.snapshot_id).await?;
        self.reload_base_map().await;
        Ok(())
    }

    /// End the session, uploading every dirty tile first.
    pub async fn shutdown(self) -> FlushReport {
        let report = self.scheduler.shutdown().await;
        info!(
            snapshot_id = %self.snapshot_id,
            batches = report.batches,
            uploaded = report.uploaded,
            failed = report.failed_factions.len(),
            "map session closed"
        );
        report
    }
}

/// Fetch one tile. A missing tile is `Ok(None)`.
pub async fn fetch_tile(
    api: &ApiClient,
    snapshot_id: &str,
    key: &TileKey,
) -> Result<Option<TileSurface>, TileLoadError> {
    match api.get_tile(snapshot_id, key).await? {
        Some(bytes) => Ok(Some(TileSurface::from_png(&bytes)?)),
        None => Ok(None),
    }
}
