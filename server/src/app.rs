use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::routing::{get, put};
use tower_http::compression::CompressionLayer;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::routes;
use crate::state::AppState;

pub fn build_app(state: AppState) -> Router {
    let body_limit = state.max_upload_bytes;

    Router::new()
        .route("/api/health", get(routes::catalog::health))
        .route("/api/snapshots", get(routes::catalog::list_snapshots))
        .route("/api/factions", get(routes::catalog::list_factions))
        .route("/api/places", get(routes::catalog::list_places))
        .route(
            "/api/snapshots/{snapshot_id}/territory/tiles",
            get(routes::tiles::get_tile).delete(routes::tiles::delete_tiles),
        )
        .route(
            "/api/snapshots/{snapshot_id}/territory/tiles/batch",
            put(routes::tiles::upload_tiles_batch),
        )
        .route(
            "/api/snapshots/{snapshot_id}/map",
            get(routes::map_assets::download_map)
                .post(routes::map_assets::upload_map)
                .delete(routes::map_assets::delete_map),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;

    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use faction_map_shared::{
        DeleteTilesResponse, Faction, MapUploadResponse, Place, Scope, Snapshot, TileBatchItem,
        TileBatchResponse, TileBatchUpload, TileCoord, VIEW_MODE_HEADER,
    };

    use super::build_app;
    use crate::state::AppState;

    async fn spawn_test_server(state: AppState) -> (SocketAddr, tokio::task::JoinHandle<()>) {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("listener address");
        let app = build_app(state);
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve test app");
        });
        (addr, handle)
    }

    fn seeded_state() -> AppState {
        let state = AppState::new();
        state.insert_snapshot(Snapshot::new("s1", "Session 1"));
        state.insert_faction(Faction::new("f1", "#aa0000", 0.5));
        state.insert_faction(Faction::new("f2", "#0000aa", 0.5));
        state
    }

    fn batch(faction_id: &str, coords: &[(i32, i32)]) -> TileBatchUpload {
        TileBatchUpload {
            faction_id: faction_id.to_owned(),
            tiles: coords
                .iter()
                .map(|&(x, y)| TileBatchItem::from_png(TileCoord::new(0, x, y), format!("png-{x}-{y}").as_bytes()))
                .collect(),
        }
    }

    #[tokio::test]
    async fn batch_upload_then_get_tile_roundtrips_bytes() {
        let state = seeded_state();
        let (addr, server_handle) = spawn_test_server(state.clone()).await;
        let base_url = format!("http://{addr}/api");
        let client = reqwest::Client::new();

        let response = client
            .put(format!("{base_url}/snapshots/s1/territory/tiles/batch"))
            .json(&batch("f1", &[(0, 0), (1, 0)]))
            .send()
            .await
            .expect("batch request")
            .error_for_status()
            .expect("batch status")
            .json::<TileBatchResponse>()
            .await
            .expect("parse batch response");
        assert_eq!(response.uploaded, 2);
        assert_eq!(response.snapshot_id, "s1");
        assert_eq!(response.faction_id, "f1");

        let tile = client
            .get(format!("{base_url}/snapshots/s1/territory/tiles"))
            .query(&[("faction_id", "f1"), ("z", "0"), ("x", "1"), ("y", "0")])
            .send()
            .await
            .expect("tile request");
        assert_eq!(tile.status(), reqwest::StatusCode::OK);
        assert_eq!(
            tile.headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok()),
            Some("image/png")
        );
        assert_eq!(tile.bytes().await.expect("tile body").as_ref(), b"png-1-0");

        let missing = client
            .get(format!("{base_url}/snapshots/s1/territory/tiles"))
            .query(&[("faction_id", "f1"), ("z", "0"), ("x", "5"), ("y", "5")])
            .send()
            .await
            .expect("missing tile request");
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

        let observability = state.observability.snapshot();
        assert_eq!(observability.tile_batches_total, 1);
        assert_eq!(observability.tiles_stored_total, 2);
        assert_eq!(observability.tile_requests_total, 2);

        server_handle.abort();
        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn batch_upload_is_idempotent_upsert() {
        let state = seeded_state();
        let (addr, server_handle) = spawn_test_server(state.clone()).await;
        let url = format!("http://{addr}/api/snapshots/s1/territory/tiles/batch");
        let client = reqwest::Client::new();

        for _ in 0..2 {
            client
                .put(&url)
                .json(&batch("f1", &[(0, 0)]))
                .send()
                .await
                .expect("batch request")
                .error_for_status()
                .expect("batch status");
        }
        assert_eq!(state.tile_count("s1", "f1"), 1);

        server_handle.abort();
        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn batch_upload_rejects_unknown_snapshot_faction_and_bad_base64() {
        let state = seeded_state();
        let (addr, server_handle) = spawn_test_server(state.clone()).await;
        let base_url = format!("http://{addr}/api");
        let client = reqwest::Client::new();

        let unknown_snapshot = client
            .put(format!("{base_url}/snapshots/nope/territory/tiles/batch"))
            .json(&batch("f1", &[(0, 0)]))
            .send()
            .await
            .expect("request");
        assert_eq!(unknown_snapshot.status(), reqwest::StatusCode::NOT_FOUND);

        let unknown_faction = client
            .put(format!("{base_url}/snapshots/s1/territory/tiles/batch"))
            .json(&batch("ghost", &[(0, 0)]))
            .send()
            .await
            .expect("request");
        assert_eq!(unknown_faction.status(), reqwest::StatusCode::NOT_FOUND);

        let mut bad = batch("f1", &[(0, 0), (1, 1)]);
        bad.tiles[1].data = "%%% not base64 %%%".to_owned();
        let bad_payload = client
            .put(format!("{base_url}/snapshots/s1/territory/tiles/batch"))
            .json(&bad)
            .send()
            .await
            .expect("request");
        assert_eq!(bad_payload.status(), reqwest::StatusCode::BAD_REQUEST);
        // Nothing from a rejected batch is stored.
        assert_eq!(state.tile_count("s1", "f1"), 0);
        assert_eq!(state.observability.snapshot().tile_batch_failures_total, 3);

        server_handle.abort();
        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn batch_accepts_data_url_prefixed_payloads() {
        let state = seeded_state();
        let (addr, server_handle) = spawn_test_server(state.clone()).await;
        let client = reqwest::Client::new();

        let upload = TileBatchUpload {
            faction_id: "f2".to_owned(),
            tiles: vec![TileBatchItem {
                z: 0,
                x: 3,
                y: 4,
                data: format!("data:image/png;base64,{}", STANDARD.encode(b"prefixed")),
            }],
        };
        client
            .put(format!("http://{addr}/api/snapshots/s1/territory/tiles/batch"))
            .json(&upload)
            .send()
            .await
            .expect("batch request")
            .error_for_status()
            .expect("batch status");

        let stored = state
            .tile("s1", &faction_map_shared::TileKey::new("f2", 0, 3, 4))
            .expect("tile stored");
        assert_eq!(stored.data.as_ref(), b"prefixed");

        server_handle.abort();
        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn tile_endpoint_returns_not_modified_when_etag_matches() {
        let state = seeded_state();
        let (addr, server_handle) = spawn_test_server(state.clone()).await;
        let url = format!("http://{addr}/api/snapshots/s1/territory/tiles");
        let client = reqwest::Client::new();
        client
            .put(format!("{url}/batch"))
            .json(&batch("f1", &[(2, 2)]))
            .send()
            .await
            .expect("batch request")
            .error_for_status()
            .expect("batch status");

        let query = [("faction_id", "f1"), ("z", "0"), ("x", "2"), ("y", "2")];
        let first = client
            .get(&url)
            .query(&query)
            .send()
            .await
            .expect("tile request");
        let etag = first
            .headers()
            .get(reqwest::header::ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned)
            .expect("etag header should be present");

        let second = client
            .get(&url)
            .query(&query)
            .header(reqwest::header::IF_NONE_MATCH, etag.as_str())
            .send()
            .await
            .expect("conditional tile request");
        assert_eq!(second.status(), reqwest::StatusCode::NOT_MODIFIED);
        assert_eq!(state.observability.snapshot().tile_not_modified_total, 1);

        server_handle.abort();
        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn delete_tiles_only_clears_one_faction() {
        let state = seeded_state();
        let (addr, server_handle) = spawn_test_server(state.clone()).await;
        let url = format!("http://{addr}/api/snapshots/s1/territory/tiles");
        let client = reqwest::Client::new();

        for upload in [batch("f1", &[(0, 0), (0, 1)]), batch("f2", &[(0, 0)])] {
            client
                .put(format!("{url}/batch"))
                .json(&upload)
                .send()
                .await
                .expect("batch request")
                .error_for_status()
                .expect("batch status");
        }

        let deleted = client
            .delete(&url)
            .query(&[("faction_id", "f1")])
            .send()
            .await
            .expect("delete request")
            .error_for_status()
            .expect("delete status")
            .json::<DeleteTilesResponse>()
            .await
            .expect("parse delete response");
        assert_eq!(deleted.deleted, 2);
        assert_eq!(deleted.status, "ok");
        assert_eq!(state.tile_count("s1", "f1"), 0);
        assert_eq!(state.tile_count("s1", "f2"), 1);

        server_handle.abort();
        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn map_upload_replace_download_and_delete() {
        let state = seeded_state();
        let (addr, server_handle) = spawn_test_server(state.clone()).await;
        let url = format!("http://{addr}/api/snapshots/s1/map");
        let client = reqwest::Client::new();

        let missing = client.get(&url).send().await.expect("map request");
        assert_eq!(missing.status(), reqwest::StatusCode::NOT_FOUND);

        let mut asset_ids = Vec::new();
        for body in [b"first-image".as_slice(), b"second-image".as_slice()] {
            let part = reqwest::multipart::Part::bytes(body.to_vec())
                .file_name("map.png")
                .mime_str("image/png")
                .expect("mime");
            let response = client
                .post(&url)
                .multipart(reqwest::multipart::Form::new().part("file", part))
                .send()
                .await
                .expect("upload request");
            assert_eq!(response.status(), reqwest::StatusCode::CREATED);
            let parsed = response
                .json::<MapUploadResponse>()
                .await
                .expect("parse upload response");
            assert_eq!(parsed.snapshot_id, "s1");
            asset_ids.push(parsed.map_asset_id);
        }
        assert_eq!(asset_ids[0], asset_ids[1]);

        let downloaded = client
            .get(&url)
            .send()
            .await
            .expect("download request")
            .error_for_status()
            .expect("download status")
            .bytes()
            .await
            .expect("download body");
        assert_eq!(downloaded.as_ref(), b"second-image");

        let deleted = client.delete(&url).send().await.expect("delete request");
        assert_eq!(deleted.status(), reqwest::StatusCode::NO_CONTENT);
        let again = client.delete(&url).send().await.expect("delete request");
        assert_eq!(again.status(), reqwest::StatusCode::NOT_FOUND);

        server_handle.abort();
        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn map_upload_rejects_non_images_and_empty_files() {
        let state = seeded_state();
        let (addr, server_handle) = spawn_test_server(state.clone()).await;
        let url = format!("http://{addr}/api/snapshots/s1/map");
        let client = reqwest::Client::new();

        for (body, mime) in [(b"hello".to_vec(), "text/plain"), (Vec::new(), "image/png")] {
            let part = reqwest::multipart::Part::bytes(body)
                .file_name("map")
                .mime_str(mime)
                .expect("mime");
            let response = client
                .post(&url)
                .multipart(reqwest::multipart::Form::new().part("file", part))
                .send()
                .await
                .expect("upload request");
            assert_eq!(response.status(), reqwest::StatusCode::BAD_REQUEST);
        }
        assert!(state.maps.is_empty());

        server_handle.abort();
        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn player_view_hides_gm_places_and_notes() {
        let state = seeded_state();
        let mut public = Place::new("p1", "Market", 10.0, 10.0, Scope::Public);
        public.notes_gm = Some("smugglers meet here".to_owned());
        state.insert_place(public);
        state.insert_place(Place::new("p2", "Hideout", 20.0, 20.0, Scope::Gm));
        state.insert_place(Place::new("p3", "Camp", 30.0, 30.0, Scope::Player));

        let (addr, server_handle) = spawn_test_server(state).await;
        let url = format!("http://{addr}/api/places");
        let client = reqwest::Client::new();

        let gm = client
            .get(&url)
            .send()
            .await
            .expect("places request")
            .json::<Vec<Place>>()
            .await
            .expect("parse places");
        assert_eq!(gm.len(), 3);

        let player = client
            .get(&url)
            .header(VIEW_MODE_HEADER, "player")
            .send()
            .await
            .expect("places request")
            .json::<Vec<Place>>()
            .await
            .expect("parse places");
        let ids: Vec<&str> = player.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p3", "p1"]);
        assert!(player.iter().all(|p| p.notes_gm.is_none()));

        server_handle.abort();
        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn unknown_snapshot_routes_are_not_found() {
        use axum::body::Body;
        use axum::http::{Method, Request, StatusCode};
        use tower::ServiceExt;

        let app = build_app(seeded_state());
        for (method, uri) in [
            (Method::GET, "/api/snapshots/nope/map"),
            (Method::DELETE, "/api/snapshots/nope/map"),
            (Method::GET, "/api/snapshots/nope/territory/tiles?faction_id=f1&z=0&x=0&y=0"),
            (Method::DELETE, "/api/snapshots/nope/territory/tiles?faction_id=f1"),
            (Method::GET, "/api/snapshots/s1/territory/tiles?faction_id=ghost&z=0&x=0&y=0"),
        ] {
            let response = app
                .clone()
                .oneshot(
                    Request::builder()
                        .method(method.clone())
                        .uri(uri)
                        .body(Body::empty())
                        .expect("build request"),
                )
                .await
                .expect("route request");
            assert_eq!(response.status(), StatusCode::NOT_FOUND, "{method} {uri}");
        }
    }

    #[tokio::test]
    async fn malformed_tile_query_is_bad_request() {
        use axum::body::Body;
        use axum::http::{Request, StatusCode};
        use tower::ServiceExt;

        let response = build_app(seeded_state())
            .oneshot(
                Request::builder()
                    .uri("/api/snapshots/s1/territory/tiles?faction_id=f1&z=zero&x=0&y=0")
                    .body(Body::empty())
                    .expect("build request"),
            )
            .await
            .expect("route request");
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_exposes_observability() {
        let state = seeded_state();
        let (addr, server_handle) = spawn_test_server(state).await;

        let health = reqwest::Client::new()
            .get(format!("http://{addr}/api/health"))
            .send()
            .await
            .expect("health request")
            .error_for_status()
            .expect("health status")
            .json::<serde_json::Value>()
            .await
            .expect("parse health");

        assert_eq!(health.get("status").and_then(|v| v.as_str()), Some("ok"));
        assert_eq!(health.get("factions").and_then(|v| v.as_u64()), Some(2));
        assert!(
            health
                .get("observability")
                .and_then(|v| v.get("tile_batches_total"))
                .is_some()
        );

        server_handle.abort();
        let _ = server_handle.await;
    }

    #[tokio::test]
    async fn oversized_bodies_are_rejected() {
        let state = seeded_state().with_max_upload_bytes(64);
        let (addr, server_handle) = spawn_test_server(state).await;

        let response = reqwest::Client::new()
            .put(format!("http://{addr}/api/snapshots/s1/territory/tiles/batch"))
            .json(&batch("f1", &[(0, 0), (0, 1), (0, 2), (0, 3)]))
            .send()
            .await
            .expect("batch request");
        assert_eq!(response.status(), reqwest::StatusCode::PAYLOAD_TOO_LARGE);

        server_handle.abort();
        let _ = server_handle.await;
    }
}
