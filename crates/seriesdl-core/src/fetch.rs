//! Single-stream episode download.
//!
//! The body is written to `<final>.part`, optionally checked against a SHA-256
//! digest, then renamed into place so a half-written file never looks finished.

use anyhow::{Context, Result};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::checksum;

/// Suffix of in-progress downloads.
pub const TEMP_SUFFIX: &str = ".part";

/// `episode.mp4` → `episode.mp4.part`.
pub fn temp_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(TEMP_SUFFIX);
    PathBuf::from(o)
}

/// Download `url` to `final_path`. Returns the number of bytes written.
///
/// Non-HTTP schemes (e.g. `file://`) report response code 0 and are accepted.
/// On any failure the `.part` file is removed.
pub fn download_episode(url: &str, final_path: &Path, expected_sha256: Option<&str>) -> Result<u64> {
    if let Some(parent) = final_path.parent() {
        fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
    }
    let part = temp_path(final_path);

    let result = fetch_to(url, &part).and_then(|written| {
        if let Some(expected) = expected_sha256 {
            checksum::verify_sha256(&part, expected)?;
        }
        fs::rename(&part, final_path).with_context(|| {
            format!("rename {} -> {}", part.display(), final_path.display())
        })?;
        Ok(written)
    });

    match result {
        Ok(written) => {
            tracing::debug!(url, path = %final_path.display(), bytes = written, "episode fetched");
            Ok(written)
        }
        Err(e) => {
            let _ = fs::remove_file(&part);
            Err(e)
        }
    }
}

fn fetch_to(url: &str, part: &Path) -> Result<u64> {
    let mut file =
        File::create(part).with_context(|| format!("failed to create temp file: {}", part.display()))?;

    let mut easy = curl::easy::Easy::new();
    easy.url(url).context("invalid URL")?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(Duration::from_secs(30))?;
    easy.low_speed_limit(1024)?;
    easy.low_speed_time(Duration::from_secs(60))?;
    easy.timeout(Duration::from_secs(3600))?;

    let mut written = 0u64;
    let mut write_err: Option<std::io::Error> = None;
    let performed = {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| match file.write_all(data) {
            Ok(()) => {
                written += data.len() as u64;
                Ok(data.len())
            }
            Err(e) => {
                write_err = Some(e);
                Ok(0) // abort transfer
            }
        })?;
        transfer.perform()
    };

    if let Some(e) = write_err {
        return Err(anyhow::Error::new(e).context(format!("write {}", part.display())));
    }
    performed.with_context(|| format!("GET {} failed", url))?;

    let code = easy.response_code().context("no response code")?;
    if code != 0 && !(200..300).contains(&code) {
        anyhow::bail!("GET {} returned HTTP {}", url, code);
    }

    file.sync_all()
        .with_context(|| format!("sync {}", part.display()))?;
    Ok(written)
}
