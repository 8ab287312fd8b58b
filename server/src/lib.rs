pub mod app;
pub mod config;
pub mod routes;
pub mod state;

pub use app::build_app;
pub use state::{AppState, ObservabilitySnapshot, Seed};
