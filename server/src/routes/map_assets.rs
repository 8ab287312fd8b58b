use axum::Json;
use axum::body::Body;
use axum::extract::{Multipart, Path, State};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::Response;
use chrono::Utc;
use faction_map_shared::MapUploadResponse;
use tracing::{info, warn};

use crate::state::{AppState, MapAsset};

const DEFAULT_MAP_CONTENT_TYPE: &str = "image/png";

/// Set or replace the snapshot's base map from the multipart field `file`.
pub async fn upload_map(
    State(state): State<AppState>,
    Path(snapshot_id): Path<String>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<MapUploadResponse>), StatusCode> {
    if !state.has_snapshot(&snapshot_id) {
        return Err(StatusCode::NOT_FOUND);
    }

    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field
            .content_type()
            .unwrap_or(DEFAULT_MAP_CONTENT_TYPE)
            .to_owned();
        let data = field.bytes().await.map_err(|_| StatusCode::BAD_REQUEST)?;
        upload = Some((content_type, data));
    }

    let Some((content_type, data)) = upload else {
        return Err(StatusCode::BAD_REQUEST);
    };
    if !content_type.starts_with("image/") {
        warn!(%snapshot_id, %content_type, "rejecting non-image map upload");
        return Err(StatusCode::BAD_REQUEST);
    }
    if data.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }

    // One map per snapshot: replacing keeps the asset id.
    let id = state
        .maps
        .get(&snapshot_id)
        .map(|existing| existing.id.clone())
        .unwrap_or_else(|| state.next_map_asset_id(&snapshot_id));
    let uploaded_at = Utc::now();
    let bytes = data.len();
    state.maps.insert(
        snapshot_id.clone(),
        MapAsset {
            id: id.clone(),
            content_type,
            data,
            uploaded_at,
        },
    );
    state.observability.record_map_upload();
    info!(%snapshot_id, map_asset_id = %id, bytes, "stored base map");

    Ok((
        StatusCode::CREATED,
        Json(MapUploadResponse {
            status: "ok".to_owned(),
            message: "Map uploaded successfully".to_owned(),
            map_asset_id: id,
            snapshot_id,
            uploaded_at,
        }),
    ))
}

pub async fn download_map(
    State(state): State<AppState>,
    Path(snapshot_id): Path<String>,
) -> Result<Response, StatusCode> {
    if !state.has_snapshot(&snapshot_id) {
        return Err(StatusCode::NOT_FOUND);
    }
    let asset = state
        .maps
        .get(&snapshot_id)
        .map(|entry| entry.value().clone())
        .ok_or(StatusCode::NOT_FOUND)?;

    let mut response = Response::new(Body::from(asset.data));
    let content_type = HeaderValue::from_str(&asset.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static(DEFAULT_MAP_CONTENT_TYPE));
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, content_type);
    Ok(response)
}

pub async fn delete_map(
    State(state): State<AppState>,
    Path(snapshot_id): Path<String>,
) -> StatusCode {
    if !state.has_snapshot(&snapshot_id) {
        return StatusCode::NOT_FOUND;
    }
    match state.maps.remove(&snapshot_id) {
        Some(_) => {
            info!(%snapshot_id, "deleted base map");
            StatusCode::NO_CONTENT
        }
        None => StatusCode::NOT_FOUND,
    }
}
