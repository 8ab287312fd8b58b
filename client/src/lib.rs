pub mod api;
pub mod base_map;
pub mod config;
pub mod error;
pub mod painter;
pub mod renderer;
pub mod session;
pub mod surface;
pub mod tile_cache;
pub mod upload;

pub use api::ApiClient;
pub use base_map::{BaseMap, BaseMapLoad, BaseMapRequest, BaseMapStatus};
pub use config::ClientConfig;
pub use error::{ApiError, BaseMapError, PaintError, SurfaceError, TileLoadError};
pub use painter::{BrushMode, Painter};
pub use renderer::{RenderInput, render_frame};
pub use session::{MapEvent, MapSession, TileLoadSummary};
pub use surface::TileSurface;
pub use tile_cache::{SharedTileCache, TileCache};
pub use upload::{FlushReport, UploadPhase, UploadScheduler};
