pub const DEFAULT_SERVER_PORT: u16 = 8000;
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 32 * 1024 * 1024;
pub const TILE_CACHE_CONTROL: &str = "private, max-age=0, must-revalidate";

pub fn server_port() -> u16 {
    std::env::var("FACTION_MAP_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_SERVER_PORT)
}

/// Optional JSON file with snapshots, factions and places to start with.
pub fn seed_path() -> Option<String> {
    std::env::var("FACTION_MAP_SEED_PATH")
        .ok()
        .map(|value| value.trim().to_owned())
        .filter(|value| !value.is_empty())
}

/// Request body limit; covers base map uploads and tile batches.
pub fn max_upload_bytes() -> usize {
    std::env::var("FACTION_MAP_MAX_UPLOAD_BYTES")
        .ok()
        .and_then(|value| value.parse::<usize>().ok())
        .filter(|value| *value > 0)
        .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn port_falls_back_on_garbage() {
        temp_env::with_var("FACTION_MAP_PORT", Some("not-a-port"), || {
            assert_eq!(server_port(), DEFAULT_SERVER_PORT);
        });
        temp_env::with_var("FACTION_MAP_PORT", Some("9100"), || {
            assert_eq!(server_port(), 9100);
        });
    }

    #[test]
    fn blank_seed_path_is_ignored() {
        temp_env::with_var("FACTION_MAP_SEED_PATH", Some("  "), || {
            assert_eq!(seed_path(), None);
        });
        temp_env::with_var("FACTION_MAP_SEED_PATH", None::<&str>, || {
            assert_eq!(seed_path(), None);
        });
    }

    #[test]
    fn upload_limit_rejects_zero() {
        temp_env::with_var("FACTION_MAP_MAX_UPLOAD_BYTES", Some("0"), || {
            assert_eq!(max_upload_bytes(), DEFAULT_MAX_UPLOAD_BYTES);
        });
        temp_env::with_var("FACTION_MAP_MAX_UPLOAD_BYTES", Some("65536"), || {
            assert_eq!(max_upload_bytes(), 65536);
        });
    }
}
