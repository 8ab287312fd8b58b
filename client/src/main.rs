use std::path::PathBuf;

use faction_map_client::{ClientConfig, MapSession};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: faction-map-render <snapshot-id> <output.png> [width height]";

struct Args {
    snapshot_id: String,
    output: PathBuf,
    size: Option<(u32, u32)>,
}

fn parse_args(mut args: impl Iterator<Item = String>) -> Option<Args> {
    let snapshot_id = args.next()?;
    let output = PathBuf::from(args.next()?);
    let size = match (args.next(), args.next()) {
        (Some(w), Some(h)) => Some((w.parse().ok()?, h.parse().ok()?)),
        (None, None) => None,
        _ => return None,
    };
    Some(Args {
        snapshot_id,
        output,
        size,
    })
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let Some(args) = parse_args(std::env::args().skip(1)) else {
        eprintln!("{USAGE}");
        std::process::exit(2);
    };

    let config = ClientConfig::from_env();
    tracing::info!(api_url = %config.api_url, view_mode = %config.view_mode, "rendering snapshot");

    let mut session = match MapSession::open(config, args.snapshot_id.as_str()).await {
        Ok(session) => session,
        Err(e) => {
            tracing::error!(error = %e, "failed to open map session");
            std::process::exit(1);
        }
    };
    if let Some((width, height)) = args.size {
        session.resize(width, height);
    }
    session.fit_to_map();

    let summary = session.load_visible_tiles().await;
    tracing::info!(
        loaded = summary.loaded,
        empty = summary.empty,
        failed = summary.failed,
        "tiles loaded"
    );

    let frame = session.render();
    if let Err(e) = frame.save(&args.output) {
        tracing::error!(error = %e, path = %args.output.display(), "failed to write frame");
        std::process::exit(1);
    }
    tracing::info!(path = %args.output.display(), "frame written");

    session.shutdown().await;
}
