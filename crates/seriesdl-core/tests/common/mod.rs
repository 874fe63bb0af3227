//! Fixtures shared by the integration tests: an on-disk "CDN" of episode files
//! and a JSON manifest pointing at them through `file://` URLs.

use std::fs;
use std::path::{Path, PathBuf};

use url::Url;

pub const SLUG: &str = "frieren";

/// Deterministic body for episode `n`.
pub fn episode_body(n: u16) -> Vec<u8> {
    format!("episode {} of {}\n", n, SLUG).repeat(64).into_bytes()
}

/// Write `count` episode files under `cdn` and a manifest describing them.
/// Returns the manifest path.
pub fn write_manifest(cdn: &Path, count: u16) -> PathBuf {
    let mut episodes = Vec::new();
    for n in 1..=count {
        let file = cdn.join(format!("src-{}.mp4", n));
        fs::write(&file, episode_body(n)).unwrap();
        let url = Url::from_file_path(&file).unwrap();
        episodes.push(serde_json::json!({
            "id": 100 + u64::from(n),
            "number": n,
            "url": url.as_str(),
        }));
    }
    let manifest = serde_json::json!({
        "name": "local",
        "series": [
            { "id": "7", "name": "Frieren", "slug": SLUG, "episodes": episodes }
        ]
    });
    let path = cdn.join("catalog.json");
    fs::write(&path, serde_json::to_vec_pretty(&manifest).unwrap()).unwrap();
    path
}
