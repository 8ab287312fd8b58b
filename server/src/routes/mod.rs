pub mod catalog;
pub mod map_assets;
pub mod tiles;

use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use faction_map_shared::{VIEW_MODE_HEADER, ViewMode};

/// View mode of the caller. A missing or unknown header means GM.
pub(crate) fn view_mode(headers: &HeaderMap) -> ViewMode {
    headers
        .get(VIEW_MODE_HEADER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<ViewMode>().ok())
        .unwrap_or_default()
}

pub(crate) fn not_modified_response(cache_control: &'static str, etag: &str) -> Response {
    let mut response = StatusCode::NOT_MODIFIED.into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static(cache_control),
    );
    if let Ok(etag_header) = HeaderValue::from_str(etag) {
        headers.insert(header::ETAG, etag_header);
    }
    response
}

fn normalize_etag(candidate: &str) -> &str {
    candidate.strip_prefix("W/").unwrap_or(candidate).trim()
}

pub(crate) fn if_none_match_matches(headers: &HeaderMap, etag: &str) -> bool {
    let Some(value) = headers.get(header::IF_NONE_MATCH) else {
        return false;
    };
    let Ok(raw) = value.to_str() else {
        return false;
    };

    raw.split(',').any(|candidate| {
        let candidate = candidate.trim();
        candidate == "*" || normalize_etag(candidate) == normalize_etag(etag)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_mode_defaults_to_gm() {
        let mut headers = HeaderMap::new();
        assert_eq!(view_mode(&headers), ViewMode::Gm);
        headers.insert(VIEW_MODE_HEADER, HeaderValue::from_static("Player"));
        assert_eq!(view_mode(&headers), ViewMode::Player);
        headers.insert(VIEW_MODE_HEADER, HeaderValue::from_static("spectator"));
        assert_eq!(view_mode(&headers), ViewMode::Gm);
    }

    #[test]
    fn if_none_match_supports_weak_and_multiple_etags() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::IF_NONE_MATCH,
            HeaderValue::from_static("W/\"other\", \"tile-0000beef\""),
        );
        assert!(if_none_match_matches(&headers, "\"tile-0000beef\""));
        assert!(!if_none_match_matches(&headers, "\"tile-00000000\""));
    }
}
