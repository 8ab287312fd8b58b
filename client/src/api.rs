//! HTTP client for the snapshot territory/map endpoints and the faction and
//! place reads a map session needs.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use bytes::Bytes;
use faction_map_shared::{
    DeleteTilesResponse, Faction, FactionQuery, MapUploadResponse, Place, TileBatchUpload,
    TileKey, TileQuery, VIEW_MODE_HEADER, ViewMode,
};
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use tracing::warn;

use crate::config::{ClientConfig, USER_AGENT};
use crate::error::ApiError;

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Arc<str>,
    /// Shared so every clone (e.g. the upload scheduler's) follows mode switches.
    player_view: Arc<AtomicBool>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.http_timeout)
            .connect_timeout(config.connect_timeout)
            .build()
            .or_else(|e| {
                warn!(
                    error = %e,
                    "failed to build configured HTTP client, retrying without custom user-agent"
                );
                reqwest::Client::builder()
                    .timeout(config.http_timeout)
                    .connect_timeout(config.connect_timeout)
                    .build()
            })?;
        Ok(Self::with_client(http, &config.api_url, config.view_mode))
    }

    pub fn with_client(http: reqwest::Client, base_url: &str, view_mode: ViewMode) -> Self {
        Self {
            http,
            base_url: Arc::from(base_url.trim_end_matches('/')),
            player_view: Arc::new(AtomicBool::new(view_mode == ViewMode::Player)),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn view_mode(&self) -> ViewMode {
        if self.player_view.load(Ordering::Relaxed) {
            ViewMode::Player
        } else {
            ViewMode::Gm
        }
    }

    pub fn set_view_mode(&self, mode: ViewMode) {
        self.player_view
            .store(mode == ViewMode::Player, Ordering::Relaxed);
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .header(VIEW_MODE_HEADER, self.view_mode().as_str())
    }

    pub async fn list_factions(&self) -> Result<Vec<Faction>, ApiError> {
        let response = self.request(Method::GET, "/factions").send().await?;
        Ok(expect_success(response, "list factions")?.json().await?)
    }

    pub async fn list_places(&self) -> Result<Vec<Place>, ApiError> {
        let response = self.request(Method::GET, "/places").send().await?;
        Ok(expect_success(response, "list places")?.json().await?)
    }

    /// Fetch one tile's PNG. `Ok(None)` means nothing has been painted there.
    pub async fn get_tile(&self, snapshot_id: &str, key: &TileKey) -> Result<Option<Bytes>, ApiError> {
        let query = TileQuery {
            faction_id: key.faction_id.clone(),
            z: key.coord.z,
            x: key.coord.x,
            y: key.coord.y,
        };
        let response = self
            .request(Method::GET, &format!("/snapshots/{snapshot_id}/territory/tiles"))
            .query(&query)
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(expect_success(response, "get tile")?.bytes().await?))
    }

    pub async fn upload_tiles_batch(
        &self,
        snapshot_id: &str,
        batch: &TileBatchUpload,
    ) -> Result<(), ApiError> {
        let response = self
            .request(
                Method::PUT,
                &format!("/snapshots/{snapshot_id}/territory/tiles/batch"),
            )
            .json(batch)
            .send()
            .await?;
        expect_success(response, "upload tile batch")?;
        Ok(())
    }

    /// Remove every stored tile of a faction in a snapshot. Returns how many were deleted.
    pub async fn delete_tiles(&self, snapshot_id: &str, faction_id: &str) -> Result<usize, ApiError> {
        let response = self
            .request(
                Method::DELETE,
                &format!("/snapshots/{snapshot_id}/territory/tiles"),
            )
            .query(&FactionQuery {
                faction_id: faction_id.to_owned(),
            })
            .send()
            .await?;
        let body: DeleteTilesResponse = expect_success(response, "delete tiles")?.json().await?;
        Ok(body.deleted)
    }

    /// Fetch the snapshot's base map image. `Ok(None)` means no map is set.
    pub async fn download_map(&self, snapshot_id: &str) -> Result<Option<Bytes>, ApiError> {
        let response = self
            .request(Method::GET, &format!("/snapshots/{snapshot_id}/map"))
            .send()
            .await?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        Ok(Some(expect_success(response, "download map")?.bytes().await?))
    }

    pub async fn upload_map(
        &self,
        snapshot_id: &str,
        file_name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> Result<MapUploadResponse, ApiError> {
        let part = reqwest::multipart::Part::bytes(data)
            .file_name(file_name.to_owned())
            .mime_str(content_type)?;
        let form = reqwest::multipart::Form::new().part("file", part);
        let response = self
            .request(Method::POST, &format!("/snapshots/{snapshot_id}/map"))
            .multipart(form)
            .send()
            .await?;
        Ok(expect_success(response, "upload map")?.json().await?)
    }

    pub async fn delete_map(&self, snapshot_id: &str) -> Result<(), ApiError> {
        let response = self
            .request(Method::DELETE, &format!("/snapshots/{snapshot_id}/map"))
            .send()
            .await?;
        expect_success(response, "delete map")?;
        Ok(())
    }
}

fn expect_success(response: Response, context: &str) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        Ok(response)
    } else {
        Err(ApiError::Status {
            status,
            context: context.to_owned(),
        })
    }
}
