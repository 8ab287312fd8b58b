//! The snapshot's base map image. Loads are tagged with a generation so a
//! response for a snapshot the session has already left is dropped.

use bytes::Bytes;
use image::RgbaImage;
use tracing::{debug, warn};

use crate::api::ApiClient;
use crate::error::BaseMapError;

/// Size of the placeholder grid drawn while no base map is available.
pub const PLACEHOLDER_SIZE: (u32, u32) = (1000, 1000);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseMapStatus {
    /// No load has completed for the current snapshot yet.
    Loading,
    Loaded,
    /// The snapshot has no map, or it failed to load; the grid is shown.
    Placeholder,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BaseMapRequest {
    pub snapshot_id: String,
    pub generation: u64,
}

/// Outcome of one fetch, to be handed back to [`BaseMap::apply`].
#[derive(Debug)]
pub struct BaseMapLoad {
    pub request: BaseMapRequest,
    pub result: Result<Option<RgbaImage>, BaseMapError>,
}

#[derive(Debug)]
pub struct BaseMap {
    image: Option<RgbaImage>,
    status: BaseMapStatus,
    generation: u64,
}

impl Default for BaseMap {
    fn default() -> Self {
        Self {
            image: None,
            status: BaseMapStatus::Loading,
            generation: 0,
        }
    }
}

impl BaseMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn image(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }

    pub fn status(&self) -> BaseMapStatus {
        self.status
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Map extent in map pixels: the image size, or the placeholder size.
    pub fn size(&self) -> (u32, u32) {
        self.image
            .as_ref()
            .map(RgbaImage::dimensions)
            .unwrap_or(PLACEHOLDER_SIZE)
    }

    /// Start a new load for `snapshot_id`. Anything requested before is now stale.
    pub fn begin(&mut self, snapshot_id: &str) -> BaseMapRequest {
        self.generation += 1;
        self.image = None;
        self.status = BaseMapStatus::Loading;
        BaseMapRequest {
            snapshot_id: snapshot_id.to_owned(),
            generation: self.generation,
        }
    }

    /// Install a finished load. Returns false when the load was stale and ignored.
    pub fn apply(&mut self, load: BaseMapLoad) -> bool {
        if load.request.generation != self.generation {
            debug!(
                snapshot_id = %load.request.snapshot_id,
                generation = load.request.generation,
                current = self.generation,
                "discarding stale base map load"
            );
            return false;
        }

        match load.result {
            Ok(Some(image)) => {
                self.image = Some(image);
                self.status = BaseMapStatus::Loaded;
            }
            Ok(None) => {
                debug!(snapshot_id = %load.request.snapshot_id, "snapshot has no base map");
                self.image = None;
                self.status = BaseMapStatus::Placeholder;
            }
            Err(e) => {
                warn!(
                    error = %e,
                    snapshot_id = %load.request.snapshot_id,
                    "failed to load base map, showing placeholder"
                );
                self.image = None;
                self.status = BaseMapStatus::Placeholder;
            }
        }
        true
    }
}

pub fn decode_base_map(bytes: &Bytes) -> Result<RgbaImage, BaseMapError> {
    Ok(image::load_from_memory(bytes)?.to_rgba8())
}

/// Fetch and decode the base map for `request`.
pub async fn fetch(api: &ApiClient, request: BaseMapRequest) -> BaseMapLoad {
    let result = match api.download_map(&request.snapshot_id).await {
        Ok(Some(bytes)) => decode_base_map(&bytes).map(Some),
        Ok(None) => Ok(None),
        Err(e) => Err(BaseMapError::Api(e)),
    };
    BaseMapLoad { request, result }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use image::{ImageFormat, Rgba};

    use super::*;

    fn image(width: u32, height: u32) -> RgbaImage {
        RgbaImage::from_pixel(width, height, Rgba([1, 2, 3, 255]))
    }

    #[test]
    fn placeholder_size_until_loaded() {
        let mut map = BaseMap::new();
        assert_eq!(map.size(), PLACEHOLDER_SIZE);
        assert_eq!(map.status(), BaseMapStatus::Loading);

        let request = map.begin("s1");
        assert!(map.apply(BaseMapLoad {
            request,
            result: Ok(Some(image(640, 480))),
        }));
        assert_eq!(map.size(), (640, 480));
        assert_eq!(map.status(), BaseMapStatus::Loaded);
    }

    #[test]
    fn stale_load_is_discarded() {
        let mut map = BaseMap::new();
        let first = map.begin("s1");
        let second = map.begin("s2");

        assert!(!map.apply(BaseMapLoad {
            request: first,
            result: Ok(Some(image(10, 10))),
        }));
        assert!(map.image().is_none());
        assert_eq!(map.status(), BaseMapStatus::Loading);

        assert!(map.apply(BaseMapLoad {
            request: second,
            result: Ok(None),
        }));
        assert_eq!(map.status(), BaseMapStatus::Placeholder);
    }

    #[test]
    fn missing_map_falls_back_to_placeholder() {
        let mut map = BaseMap::new();
        let request = map.begin("s1");
        map.apply(BaseMapLoad {
            request,
            result: Ok(Some(image(20, 20))),
        });

        let request = map.begin("s1");
        map.apply(BaseMapLoad {
            request,
            result: Err(BaseMapError::Decode(image::ImageError::Limits(
                image::error::LimitError::from_kind(image::error::LimitErrorKind::DimensionError),
            ))),
        });
        assert!(map.image().is_none());
        assert_eq!(map.size(), PLACEHOLDER_SIZE);
        assert_eq!(map.status(), BaseMapStatus::Placeholder);
    }

    #[test]
    fn decodes_png_bytes() {
        let mut buf = Cursor::new(Vec::new());
        image(3, 2).write_to(&mut buf, ImageFormat::Png).unwrap();
        let decoded = decode_base_map(&Bytes::from(buf.into_inner())).unwrap();
        assert_eq!(decoded.dimensions(), (3, 2));
        assert!(decode_base_map(&Bytes::from_static(b"not an image")).is_err());
    }
}
