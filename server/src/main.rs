use faction_map_server::state::SeedError;
use faction_map_server::{AppState, Seed, build_app, config};
use tokio::signal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let state = match initial_state(config::seed_path().as_deref()) {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "failed to load seed data");
            std::process::exit(1);
        }
    };

    let app = build_app(state);

    let addr = format!("0.0.0.0:{}", config::server_port());
    tracing::info!("Faction map server listening on {addr}");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(error = %e, %addr, "failed to bind TCP listener");
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!(error = %e, "server failed");
        std::process::exit(1);
    }

    tracing::info!("Server shut down gracefully");
}

/// Store contents at startup: the seed file when one is configured, otherwise
/// an empty store.
fn initial_state(seed_path: Option<&str>) -> Result<AppState, SeedError> {
    let Some(path) = seed_path else {
        tracing::warn!("FACTION_MAP_SEED_PATH not set, starting with an empty store");
        return Ok(AppState::new());
    };
    let seed = Seed::load(path)?;
    tracing::info!(
        %path,
        snapshots = seed.snapshots.len(),
        factions = seed.factions.len(),
        places = seed.places.len(),
        "loaded seed data"
    );
    Ok(AppState::from_seed(seed))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        let mut sigterm = match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(sigterm) => sigterm,
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                return;
            }
        };
        sigterm.recv().await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_seed_path_starts_empty() {
        let state = initial_state(None).expect("empty store");
        assert!(!state.has_snapshot("s1"));
    }

    #[test]
    fn unreadable_seed_file_is_an_error() {
        let path = std::env::temp_dir().join("faction-map-missing-seed.json");
        let result = initial_state(path.to_str());
        assert!(matches!(result, Err(SeedError::Io(_))));
    }

    #[test]
    fn malformed_seed_file_is_an_error() {
        let path = std::env::temp_dir().join(format!(
            "faction-map-bad-seed-{}.json",
            std::process::id()
        ));
        std::fs::write(&path, b"{ not json").expect("write seed");
        let result = initial_state(path.to_str());
        let _ = std::fs::remove_file(&path);
        assert!(matches!(result, Err(SeedError::Parse(_))));
    }
}
