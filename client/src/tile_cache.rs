use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use faction_map_shared::{TileBatchItem, TileBatchUpload, TileKey};
use tracing::warn;

use crate::surface::TileSurface;

/// Cache shared between the painting session and the upload scheduler.
pub type SharedTileCache = Arc<Mutex<TileCache>>;

pub fn shared(cache: TileCache) -> SharedTileCache {
    Arc::new(Mutex::new(cache))
}

/// Lock the shared cache. A poisoned lock only means a panic happened while
/// pixels were being written, so the data is still usable.
pub fn lock(cache: &SharedTileCache) -> MutexGuard<'_, TileCache> {
    cache.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Debug)]
struct TileEntry {
    surface: TileSurface,
    /// Stamp of the latest local edit, unique across the whole cache; lets an
    /// upload tell whether the tile changed again while its batch was in
    /// flight, even if the entry was dropped and recreated meanwhile.
    revision: u64,
}

/// Every tile surface of the session, keyed by faction and tile coordinate,
/// plus the set of keys with unpersisted edits. Unbounded: surfaces live
/// until the session ends or the snapshot changes.
#[derive(Debug, Default)]
pub struct TileCache {
    tiles: HashMap<TileKey, TileEntry>,
    dirty: HashSet<TileKey>,
    next_revision: u64,
}

/// Serialized dirty tiles of one faction, ready for the batch endpoint.
#[derive(Debug, Clone)]
pub struct PendingBatch {
    pub faction_id: String,
    pub tiles: Vec<PendingTile>,
}

#[derive(Debug, Clone)]
pub struct PendingTile {
    pub key: TileKey,
    pub revision: u64,
    pub png: Vec<u8>,
}

impl PendingBatch {
    pub fn to_upload(&self) -> TileBatchUpload {
        TileBatchUpload {
            faction_id: self.faction_id.clone(),
            tiles: self
                .tiles
                .iter()
                .map(|tile| TileBatchItem::from_png(tile.key.coord, &tile.png))
                .collect(),
        }
    }
}

impl TileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The surface for `key`, allocating a blank one on first touch.
    pub fn get_or_create(&mut self, key: &TileKey) -> &mut TileSurface {
        &mut self
            .tiles
            .entry(key.clone())
            .or_insert_with(|| TileEntry {
                surface: TileSurface::blank(),
                revision: 0,
            })
            .surface
    }

    pub fn get(&self, key: &TileKey) -> Option<&TileSurface> {
        self.tiles.get(key).map(|entry| &entry.surface)
    }

    pub fn contains(&self, key: &TileKey) -> bool {
        self.tiles.contains_key(key)
    }

    /// Apply a local edit to `key`'s surface and mark it dirty.
    pub fn edit<R>(&mut self, key: &TileKey, f: impl FnOnce(&mut TileSurface) -> R) -> R {
        let entry = self.tiles.entry(key.clone()).or_insert_with(|| TileEntry {
            surface: TileSurface::blank(),
            revision: 0,
        });
        let out = f(&mut entry.surface);
        self.next_revision += 1;
        entry.revision = self.next_revision;
        self.mark_dirty(key);
        out
    }

    pub fn mark_dirty(&mut self, key: &TileKey) {
        if !self.dirty.contains(key) {
            self.dirty.insert(key.clone());
        }
    }

    pub fn is_dirty(&self, key: &TileKey) -> bool {
        self.dirty.contains(key)
    }

    pub fn has_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    pub fn dirty_keys(&self) -> impl Iterator<Item = &TileKey> {
        self.dirty.iter()
    }

    pub fn dirty_count(&self) -> usize {
        self.dirty.len()
    }

    pub fn revision(&self, key: &TileKey) -> Option<u64> {
        self.tiles.get(key).map(|entry| entry.revision)
    }

    /// Clear `key`'s dirty flag unless it was edited after `revision` was taken.
    pub fn clear_dirty_if_unchanged(&mut self, key: &TileKey, revision: u64) -> bool {
        if self.revision(key) != Some(revision) {
            return false;
        }
        self.dirty.remove(key)
    }

    pub fn clear_dirty(&mut self) {
        self.dirty.clear();
    }

    /// Install a surface fetched from the backend. Tiles with local unsaved
    /// edits keep their local content.
    pub fn store_loaded(&mut self, key: &TileKey, surface: TileSurface) -> bool {
        if self.dirty.contains(key) {
            return false;
        }
        match self.tiles.get_mut(key) {
            Some(entry) => entry.surface = surface,
            None => {
                self.tiles.insert(key.clone(), TileEntry { surface, revision: 0 });
            }
        }
        true
    }

    /// Drop every surface and dirty flag belonging to `faction_id`.
    pub fn remove_faction(&mut self, faction_id: &str) -> usize {
        let before = self.tiles.len();
        self.tiles.retain(|key, _| key.faction_id != faction_id);
        self.dirty.retain(|key| key.faction_id != faction_id);
        before - self.tiles.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&TileKey, &TileSurface)> {
        self.tiles.iter().map(|(key, entry)| (key, &entry.surface))
    }

    pub fn keys(&self) -> impl Iterator<Item = &TileKey> {
        self.tiles.keys()
    }

    pub fn len(&self) -> usize {
        self.tiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiles.is_empty()
    }

    pub fn clear(&mut self) {
        self.tiles.clear();
        self.dirty.clear();
    }

    /// Group dirty tiles by faction and encode each as PNG. Tiles that fail to
    /// encode are skipped and stay dirty.
    pub fn prepare_batches(&self) -> Vec<PendingBatch> {
        let mut by_faction: BTreeMap<&str, Vec<PendingTile>> = BTreeMap::new();

        for key in &self.dirty {
            let Some(entry) = self.tiles.get(key) else {
                continue;
            };
            let png = match entry.surface.to_png() {
                Ok(png) => png,
                Err(e) => {
                    warn!(error = %e, tile = %key, "failed to encode dirty tile");
                    continue;
                }
            };
            by_faction
                .entry(key.faction_id.as_str())
                .or_default()
                .push(PendingTile {
                    key: key.clone(),
                    revision: entry.revision,
                    png,
                });
        }

        by_faction
            .into_iter()
            .map(|(faction_id, mut tiles)| {
                tiles.sort_by(|a, b| a.key.coord.cmp(&b.key.coord));
                PendingBatch {
                    faction_id: faction_id.to_owned(),
                    tiles,
                }
            })
            .collect()
    }
}
