//! JSON payloads of the territory tile and base-map endpoints.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::tiles::TileCoord;

/// Request header carrying the caller's [`crate::ViewMode`].
pub const VIEW_MODE_HEADER: &str = "x-view-mode";

/// Strip a `data:<mime>;base64,` prefix if present, leaving the raw base64 payload.
pub fn strip_data_url_prefix(data: &str) -> &str {
    if data.starts_with("data:")
        && let Some((_, payload)) = data.split_once(',')
    {
        return payload;
    }
    data
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileBatchItem {
    pub z: i32,
    pub x: i32,
    pub y: i32,
    /// Base64 PNG without a data-URL prefix.
    pub data: String,
}

impl TileBatchItem {
    pub fn from_png(coord: TileCoord, png: &[u8]) -> Self {
        Self {
            z: coord.z,
            x: coord.x,
            y: coord.y,
            data: STANDARD.encode(png),
        }
    }

    pub fn coord(&self) -> TileCoord {
        TileCoord::new(self.z, self.x, self.y)
    }

    pub fn decode_png(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(strip_data_url_prefix(&self.data))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileBatchUpload {
    pub faction_id: String,
    pub tiles: Vec<TileBatchItem>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileBatchResponse {
    pub status: String,
    pub uploaded: usize,
    pub snapshot_id: String,
    pub faction_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteTilesResponse {
    pub status: String,
    pub deleted: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapUploadResponse {
    pub status: String,
    pub message: String,
    pub map_asset_id: String,
    pub snapshot_id: String,
    pub uploaded_at: DateTime<Utc>,
}

/// Query string of `GET /snapshots/{id}/territory/tiles`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TileQuery {
    pub faction_id: String,
    pub z: i32,
    pub x: i32,
    pub y: i32,
}

/// Query string of `DELETE /snapshots/{id}/territory/tiles`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactionQuery {
    pub faction_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_data_url_prefix() {
        assert_eq!(strip_data_url_prefix("data:image/png;base64,iVBORw0"), "iVBORw0");
        assert_eq!(strip_data_url_prefix("iVBORw0"), "iVBORw0");
        assert_eq!(strip_data_url_prefix("data:broken"), "data:broken");
    }

    #[test]
    fn batch_item_decodes_prefixed_and_bare_payloads() {
        let item = TileBatchItem::from_png(TileCoord::new(0, 5, 6), b"\x89PNG");
        assert!(!item.data.starts_with("data:"));
        assert_eq!(item.decode_png().expect("bare"), b"\x89PNG");

        let prefixed = TileBatchItem {
            data: format!("data:image/png;base64,{}", item.data),
            ..item.clone()
        };
        assert_eq!(prefixed.decode_png().expect("prefixed"), b"\x89PNG");
        assert_eq!(prefixed.coord(), TileCoord::new(0, 5, 6));
    }

    #[test]
    fn batch_upload_matches_wire_shape() {
        let batch = TileBatchUpload {
            faction_id: "f1".to_owned(),
            tiles: vec![TileBatchItem {
                z: 0,
                x: 1,
                y: 2,
                data: "AAAA".to_owned(),
            }],
        };
        let value = serde_json::to_value(&batch).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({
                "faction_id": "f1",
                "tiles": [{"z": 0, "x": 1, "y": 2, "data": "AAAA"}]
            })
        );
    }
}
