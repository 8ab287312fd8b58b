use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use faction_map_shared::{Faction, Place, Snapshot, ViewMode};

use super::view_mode;
use crate::state::AppState;

pub async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let observability = state.observability.snapshot();
    Json(serde_json::json!({
        "status": "ok",
        "snapshots": state.snapshots.len(),
        "factions": state.factions.len(),
        "tiles": state.tiles.len(),
        "maps": state.maps.len(),
        "observability": {
            "tile_requests_total": observability.tile_requests_total,
            "tile_not_modified_total": observability.tile_not_modified_total,
            "tile_batches_total": observability.tile_batches_total,
            "tile_batch_failures_total": observability.tile_batch_failures_total,
            "tiles_stored_total": observability.tiles_stored_total,
            "map_uploads_total": observability.map_uploads_total,
        }
    }))
}

pub async fn list_snapshots(State(state): State<AppState>) -> Json<Vec<Snapshot>> {
    let mut snapshots: Vec<Snapshot> = state
        .snapshots
        .iter()
        .map(|entry| entry.value().clone())
        .collect();
    snapshots.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    Json(snapshots)
}

pub async fn list_factions(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Json<Vec<Faction>> {
    let mode = view_mode(&headers);
    let mut factions: Vec<Faction> = state
        .factions
        .iter()
        .map(|entry| {
            let mut faction = entry.value().clone();
            if mode == ViewMode::Player {
                faction.notes_gm = None;
            }
            faction
        })
        .collect();
    factions.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    Json(factions)
}

/// Places visible in the caller's view mode; player view also drops GM notes.
pub async fn list_places(State(state): State<AppState>, headers: HeaderMap) -> Json<Vec<Place>> {
    let mode = view_mode(&headers);
    let mut places: Vec<Place> = state
        .places
        .iter()
        .filter(|entry| mode.shows(entry.value().scope))
        .map(|entry| {
            let mut place = entry.value().clone();
            if mode == ViewMode::Player {
                place.notes_gm = None;
            }
            place
        })
        .collect();
    places.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    Json(places)
}
