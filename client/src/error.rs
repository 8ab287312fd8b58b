use faction_map_shared::ColorParseError;
use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{context} returned {status}")]
    Status { status: StatusCode, context: String },
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Http(e) => e.status(),
            ApiError::Status { status, .. } => Some(*status),
        }
    }
}

#[derive(Debug, Error)]
pub enum SurfaceError {
    #[error("failed to decode tile image: {0}")]
    Image(#[from] image::ImageError),
    #[error("tile image is {width}x{height}, expected {expected}x{expected}")]
    Size {
        width: u32,
        height: u32,
        expected: u32,
    },
}

#[derive(Debug, Error)]
pub enum TileLoadError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Surface(#[from] SurfaceError),
}

#[derive(Debug, Error)]
pub enum BaseMapError {
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error("failed to decode base map: {0}")]
    Decode(#[from] image::ImageError),
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PaintError {
    #[error("unknown faction: {0:?}")]
    UnknownFaction(String),
    #[error("no faction selected")]
    NoFactionSelected,
    #[error("faction {faction_id:?} has an unusable color: {source}")]
    InvalidColor {
        faction_id: String,
        source: ColorParseError,
    },
    #[error("invalid brush size: {0}")]
    InvalidBrush(f64),
    #[error("invalid paint position: ({0}, {1})")]
    InvalidPosition(f64, f64),
}
