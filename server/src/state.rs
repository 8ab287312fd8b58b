use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use faction_map_shared::{Faction, Place, Snapshot, TileKey};
use serde::Deserialize;
use thiserror::Error;

use crate::config::max_upload_bytes;

/// Stored PNG of one territory tile with its precomputed ETag.
#[derive(Debug, Clone)]
pub struct StoredTile {
    pub data: Bytes,
    pub etag: String,
    pub updated_at: DateTime<Utc>,
}

impl StoredTile {
    pub fn new(data: Bytes) -> Self {
        let etag = format!("\"tile-{:08x}\"", crc32fast::hash(&data));
        Self {
            data,
            etag,
            updated_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct MapAsset {
    pub id: String,
    pub content_type: String,
    pub data: Bytes,
    pub uploaded_at: DateTime<Utc>,
}

/// Initial content loaded from `FACTION_MAP_SEED_PATH`.
#[derive(Debug, Default, Deserialize)]
pub struct Seed {
    #[serde(default)]
    pub snapshots: Vec<Snapshot>,
    #[serde(default)]
    pub factions: Vec<Faction>,
    #[serde(default)]
    pub places: Vec<Place>,
}

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("failed to read seed file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse seed file: {0}")]
    Parse(#[from] serde_json::Error),
}

impl Seed {
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let raw = std::fs::read(path)?;
        Ok(serde_json::from_slice(&raw)?)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub snapshots: Arc<DashMap<String, Snapshot>>,
    pub factions: Arc<DashMap<String, Faction>>,
    pub places: Arc<DashMap<String, Place>>,
    /// Keyed by snapshot id, then faction and tile coordinate.
    pub tiles: Arc<DashMap<(String, TileKey), StoredTile>>,
    /// At most one base map per snapshot.
    pub maps: Arc<DashMap<String, MapAsset>>,
    pub next_map_asset_id: Arc<AtomicU64>,
    pub max_upload_bytes: usize,
    pub observability: Arc<ObservabilityCounters>,
}

#[derive(Debug, Default)]
pub struct ObservabilityCounters {
    tile_requests_total: AtomicU64,
    tile_not_modified_total: AtomicU64,
    tile_batches_total: AtomicU64,
    tile_batch_failures_total: AtomicU64,
    tiles_stored_total: AtomicU64,
    map_uploads_total: AtomicU64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObservabilitySnapshot {
    pub tile_requests_total: u64,
    pub tile_not_modified_total: u64,
    pub tile_batches_total: u64,
    pub tile_batch_failures_total: u64,
    pub tiles_stored_total: u64,
    pub map_uploads_total: u64,
}

impl ObservabilityCounters {
    pub fn snapshot(&self) -> ObservabilitySnapshot {
        ObservabilitySnapshot {
            tile_requests_total: self.tile_requests_total.load(Ordering::Relaxed),
            tile_not_modified_total: self.tile_not_modified_total.load(Ordering::Relaxed),
            tile_batches_total: self.tile_batches_total.load(Ordering::Relaxed),
            tile_batch_failures_total: self.tile_batch_failures_total.load(Ordering::Relaxed),
            tiles_stored_total: self.tiles_stored_total.load(Ordering::Relaxed),
            map_uploads_total: self.map_uploads_total.load(Ordering::Relaxed),
        }
    }

    pub fn record_tile_request(&self) {
        self.tile_requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tile_not_modified(&self) {
        self.tile_not_modified_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_tile_batch(&self, stored: u64) {
        self.tile_batches_total.fetch_add(1, Ordering::Relaxed);
        self.tiles_stored_total.fetch_add(stored, Ordering::Relaxed);
    }

    pub fn record_tile_batch_failure(&self) {
        self.tile_batch_failures_total
            .fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_map_upload(&self) {
        self.map_uploads_total.fetch_add(1, Ordering::Relaxed);
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}

impl AppState {
    pub fn new() -> Self {
        Self {
            snapshots: Arc::new(DashMap::new()),
            factions: Arc::new(DashMap::new()),
            places: Arc::new(DashMap::new()),
            tiles: Arc::new(DashMap::new()),
            maps: Arc::new(DashMap::new()),
            next_map_asset_id: Arc::new(AtomicU64::new(1)),
            max_upload_bytes: max_upload_bytes(),
            observability: Arc::new(ObservabilityCounters::default()),
        }
    }

    pub fn from_seed(seed: Seed) -> Self {
        let state = Self::new();
        for snapshot in seed.snapshots {
            state.insert_snapshot(snapshot);
        }
        for faction in seed.factions {
            state.insert_faction(faction);
        }
        for place in seed.places {
            state.insert_place(place);
        }
        state
    }

    pub fn with_max_upload_bytes(mut self, limit: usize) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    pub fn insert_snapshot(&self, snapshot: Snapshot) {
        self.snapshots.insert(snapshot.id.clone(), snapshot);
    }

    pub fn insert_faction(&self, faction: Faction) {
        self.factions.insert(faction.id.clone(), faction);
    }

    pub fn insert_place(&self, place: Place) {
        self.places.insert(place.id.clone(), place);
    }

    pub fn has_snapshot(&self, snapshot_id: &str) -> bool {
        self.snapshots.contains_key(snapshot_id)
    }

    pub fn has_faction(&self, faction_id: &str) -> bool {
        self.factions.contains_key(faction_id)
    }

    pub fn tile(&self, snapshot_id: &str, key: &TileKey) -> Option<StoredTile> {
        self.tiles
            .get(&(snapshot_id.to_owned(), key.clone()))
            .map(|entry| entry.value().clone())
    }

    pub fn tile_count(&self, snapshot_id: &str, faction_id: &str) -> usize {
        self.tiles
            .iter()
            .filter(|entry| entry.key().0 == snapshot_id && entry.key().1.faction_id == faction_id)
            .count()
    }

    pub fn next_map_asset_id(&self, snapshot_id: &str) -> String {
        let seq = self.next_map_asset_id.fetch_add(1, Ordering::Relaxed);
        format!("{snapshot_id}-map-{seq}")
    }
}
