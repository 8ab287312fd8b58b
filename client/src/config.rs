use std::time::Duration;

use faction_map_shared::ViewMode;

pub const DEFAULT_API_URL: &str = "http://localhost:8000/api";
pub const DEFAULT_UPLOAD_DEBOUNCE_MS: u64 = 2000;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 3;
pub const DEFAULT_TILE_FETCH_CONCURRENCY: usize = 6;
pub const USER_AGENT: &str = "faction-map/0.1";

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_url: String,
    pub view_mode: ViewMode,
    pub upload_debounce: Duration,
    pub http_timeout: Duration,
    pub connect_timeout: Duration,
    pub tile_fetch_concurrency: usize,
    pub brush_spill: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_owned(),
            view_mode: ViewMode::Gm,
            upload_debounce: Duration::from_millis(DEFAULT_UPLOAD_DEBOUNCE_MS),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            tile_fetch_concurrency: DEFAULT_TILE_FETCH_CONCURRENCY,
            brush_spill: false,
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Self {
        Self {
            api_url: api_url(),
            view_mode: view_mode(),
            upload_debounce: upload_debounce(),
            http_timeout: http_timeout(),
            connect_timeout: connect_timeout(),
            tile_fetch_concurrency: tile_fetch_concurrency(),
            brush_spill: brush_spill(),
        }
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into();
        self
    }

    pub fn with_upload_debounce(mut self, debounce: Duration) -> Self {
        self.upload_debounce = debounce;
        self
    }
}

pub fn api_url() -> String {
    std::env::var("FACTION_MAP_API_URL")
        .ok()
        .map(|value| value.trim().trim_end_matches('/').to_owned())
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| DEFAULT_API_URL.to_owned())
}

pub fn view_mode() -> ViewMode {
    std::env::var("FACTION_MAP_VIEW_MODE")
        .ok()
        .and_then(|value| value.parse::<ViewMode>().ok())
        .unwrap_or_default()
}

pub fn upload_debounce() -> Duration {
    std::env::var("FACTION_MAP_UPLOAD_DEBOUNCE_MS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_millis)
        .unwrap_or_else(|| Duration::from_millis(DEFAULT_UPLOAD_DEBOUNCE_MS))
}

pub fn http_timeout() -> Duration {
    std::env::var("FACTION_MAP_HTTP_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS))
}

pub fn connect_timeout() -> Duration {
    std::env::var("FACTION_MAP_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .filter(|value| *value > 0)
        .map(Duration::from_secs)
        .unwrap_or_else(|| Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
}

pub fn tile_fetch_concurrency() -> usize {
    std::env::var("FACTION_MAP_TILE_FETCH_CONCURRENCY")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_TILE_FETCH_CONCURRENCY)
}

pub fn brush_spill() -> bool {
    std::env::var("FACTION_MAP_BRUSH_SPILL")
        .map(|value| {
            let normalized = value.trim().to_ascii_lowercase();
            matches!(normalized.as_str(), "1" | "true" | "yes" | "on")
        })
        .unwrap_or(false)
}
