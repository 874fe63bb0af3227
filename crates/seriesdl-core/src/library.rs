//! On-disk episode library: `<root>/<slug>/<number>.mp4`.
//!
//! Also owns the two filesystem phases that run through the task pool:
//! seeding the membership cache from existing files, and deleting episodes
//! older than the one being watched.

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use walkdir::WalkDir;

use crate::pool::TaskPool;
use crate::seen::MembershipCache;

pub const EPISODE_EXTENSION: &str = "mp4";

/// Subgroup that feeds existing files into the membership cache.
pub const CACHE_SUBGROUP: &str = "bloom";
const CACHE_BUFFER: usize = 100;
const CACHE_WORKERS: usize = 5;

/// Subgroup that deletes superseded episodes. One worker keeps deletes serial.
pub const PRUNE_SUBGROUP: &str = "delete_prev";

pub fn series_dir(root: &Path, slug: &str) -> PathBuf {
    root.join(slug)
}

pub fn episode_path(root: &Path, slug: &str, number: u16) -> PathBuf {
    series_dir(root, slug).join(format!("{}.{}", number, EPISODE_EXTENSION))
}

/// Key under which a file path is stored in the membership cache.
pub fn cache_key(path: &Path) -> Vec<u8> {
    path.to_string_lossy().into_owned().into_bytes()
}

/// Episode number encoded in a file name: the part before the first `.`.
pub fn episode_number_from_file_name(name: &str) -> Option<u32> {
    name.split('.').next()?.parse().ok()
}

/// Add every regular file under `root` to `cache`, via the [`CACHE_SUBGROUP`] subgroup.
/// Closes that subgroup (waiting for it) before returning. Returns the number of files submitted.
pub fn populate_cache(pool: &TaskPool, cache: &Arc<MembershipCache>, root: &Path) -> Result<usize> {
    if !root.is_dir() {
        tracing::debug!(root = %root.display(), "no library yet, cache left empty");
        return Ok(0);
    }

    let group = pool.get_or_create_subgroup(CACHE_SUBGROUP, CACHE_BUFFER, CACHE_WORKERS)?;
    let mut submitted = 0usize;
    for entry in WalkDir::new(root) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!("skipping unreadable library entry: {}", e);
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.into_path();
        let cache = Arc::clone(cache);
        if group.add_task(move || cache.add(&cache_key(&path))) {
            submitted += 1;
        }
    }
    group.close();
    tracing::info!(root = %root.display(), files = submitted, "membership cache populated");
    Ok(submitted)
}

/// True if `path` is an existing, non-empty regular file.
///
/// The cache answers first so the common "not downloaded yet" case costs no
/// syscall; a positive answer is confirmed on disk.
pub fn is_downloaded(cache: &MembershipCache, path: &Path) -> bool {
    if !cache.contains(&cache_key(path)) {
        return false;
    }
    matches!(fs::metadata(path), Ok(meta) if meta.is_file() && meta.len() > 0)
}

/// Schedule deletion of every file in `dir` whose episode number is below `current`.
///
/// Runs in the [`PRUNE_SUBGROUP`] subgroup of `pool`; each successful delete bumps
/// `deleted`. Returns the number of files looked at. A missing directory is not an error.
pub fn prune_previous(
    pool: &TaskPool,
    dir: &Path,
    current: u16,
    deleted: &Arc<AtomicUsize>,
) -> Result<usize> {
    let entries: Vec<PathBuf> = match fs::read_dir(dir) {
        Ok(rd) => rd.filter_map(|e| e.ok()).map(|e| e.path()).collect(),
        Err(e) => {
            tracing::warn!(dir = %dir.display(), "cannot read directory to prune: {}", e);
            return Ok(0);
        }
    };
    if entries.is_empty() {
        return Ok(0);
    }

    let group = pool.get_or_create_subgroup(PRUNE_SUBGROUP, entries.len(), 1)?;
    let scheduled = entries.len();
    for path in entries {
        let deleted = Arc::clone(deleted);
        group.add_task(move || prune_one(&path, current, &deleted));
    }
    Ok(scheduled)
}

fn prune_one(path: &Path, current: u16, deleted: &AtomicUsize) {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return;
    };
    let Some(number) = episode_number_from_file_name(name) else {
        tracing::warn!(file = %path.display(), "not an episode file, skipping");
        return;
    };
    if number >= u32::from(current) {
        return;
    }
    match fs::remove_file(path) {
        Ok(()) => {
            tracing::info!(file = %path.display(), "deleted previous episode");
            deleted.fetch_add(1, Ordering::Relaxed);
        }
        Err(e) => tracing::warn!(file = %path.display(), "failed to delete: {}", e),
    }
}
