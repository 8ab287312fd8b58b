use axum::Json;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::Response;
use bytes::Bytes;
use faction_map_shared::{
    DeleteTilesResponse, FactionQuery, TileBatchResponse, TileBatchUpload, TileKey, TileQuery,
};
use tracing::{info, warn};

use super::{if_none_match_matches, not_modified_response};
use crate::config::TILE_CACHE_CONTROL;
use crate::state::{AppState, StoredTile};

/// PNG of one tile. 404 when nothing was painted there.
pub async fn get_tile(
    State(state): State<AppState>,
    Path(snapshot_id): Path<String>,
    Query(query): Query<TileQuery>,
    headers: HeaderMap,
) -> Result<Response, StatusCode> {
    state.observability.record_tile_request();
    if !state.has_snapshot(&snapshot_id) || !state.has_faction(&query.faction_id) {
        return Err(StatusCode::NOT_FOUND);
    }

    let key = TileKey::new(query.faction_id, query.z, query.x, query.y);
    let tile = state
        .tile(&snapshot_id, &key)
        .ok_or(StatusCode::NOT_FOUND)?;

    if if_none_match_matches(&headers, &tile.etag) {
        state.observability.record_tile_not_modified();
        return Ok(not_modified_response(TILE_CACHE_CONTROL, &tile.etag));
    }
    Ok(png_response(tile.data, &tile.etag))
}

/// Upsert every tile of one faction. The whole batch is rejected if any
/// payload is not valid base64.
pub async fn upload_tiles_batch(
    State(state): State<AppState>,
    Path(snapshot_id): Path<String>,
    Json(batch): Json<TileBatchUpload>,
) -> Result<Json<TileBatchResponse>, StatusCode> {
    if !state.has_snapshot(&snapshot_id) || !state.has_faction(&batch.faction_id) {
        state.observability.record_tile_batch_failure();
        return Err(StatusCode::NOT_FOUND);
    }

    let mut decoded = Vec::with_capacity(batch.tiles.len());
    for item in &batch.tiles {
        let data = item.decode_png().map_err(|e| {
            warn!(
                error = %e,
                %snapshot_id,
                faction_id = %batch.faction_id,
                z = item.z,
                x = item.x,
                y = item.y,
                "rejecting tile batch with invalid base64"
            );
            state.observability.record_tile_batch_failure();
            StatusCode::BAD_REQUEST
        })?;
        decoded.push((TileKey::at(batch.faction_id.as_str(), item.coord()), data));
    }

    let uploaded = decoded.len();
    for (key, data) in decoded {
        state
            .tiles
            .insert((snapshot_id.clone(), key), StoredTile::new(Bytes::from(data)));
    }
    state.observability.record_tile_batch(uploaded as u64);
    info!(%snapshot_id, faction_id = %batch.faction_id, uploaded, "stored tile batch");

    Ok(Json(TileBatchResponse {
        status: "ok".to_owned(),
        uploaded,
        snapshot_id,
        faction_id: batch.faction_id,
    }))
}

pub async fn delete_tiles(
    State(state): State<AppState>,
    Path(snapshot_id): Path<String>,
    Query(query): Query<FactionQuery>,
) -> Result<Json<DeleteTilesResponse>, StatusCode> {
    if !state.has_snapshot(&snapshot_id) {
        return Err(StatusCode::NOT_FOUND);
    }

    let mut deleted = 0;
    state.tiles.retain(|(snapshot, key), _| {
        let matches = snapshot == &snapshot_id && key.faction_id == query.faction_id;
        if matches {
            deleted += 1;
        }
        !matches
    });
    info!(%snapshot_id, faction_id = %query.faction_id, deleted, "deleted faction tiles");

    Ok(Json(DeleteTilesResponse {
        status: "ok".to_owned(),
        deleted,
    }))
}

fn png_response(body: Bytes, etag: &str) -> Response {
    let mut response = Response::new(Body::from(body));
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("image/png"));
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(TILE_CACHE_CONTROL),
    );
    if let Ok(etag_header) = HeaderValue::from_str(etag) {
        headers.insert(header::ETAG, etag_header);
    }
    response
}
