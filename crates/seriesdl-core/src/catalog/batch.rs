//! Concurrent, chunked episode listing.

use std::sync::mpsc;
use std::sync::Arc;

use super::{Catalog, CatalogError, Episode, Series};
use crate::pool::TaskPool;

/// Episodes requested per catalog call.
pub const EPISODE_CHUNK: u32 = 120;

/// Subgroup that runs the chunk requests.
pub const EPISODES_SUBGROUP: &str = "episodes";

/// List the episodes of `series` numbered `start..=end`, sorted by number.
///
/// `end == 0` or an `end` past the series total means "up to the last episode".
/// The range is split into [`EPISODE_CHUNK`]-sized requests run concurrently in
/// the [`EPISODES_SUBGROUP`] subgroup of `pool`, which is closed once they are
/// collected; any failing chunk fails the call.
pub fn fetch_episodes(
    pool: &TaskPool,
    catalog: &Arc<dyn Catalog>,
    series: &Series,
    start: u32,
    end: u32,
) -> Result<Vec<Episode>, CatalogError> {
    let total = series.episodes;
    if total == 0 {
        return Ok(Vec::new());
    }
    let start = start.max(1);
    let end = if end == 0 || end > total { total } else { end };
    if start > end {
        return Ok(Vec::new());
    }

    let chunks: Vec<(u32, u32)> = (start..=end)
        .step_by(EPISODE_CHUNK as usize)
        .map(|s| (s, s.saturating_add(EPISODE_CHUNK - 1).min(end)))
        .collect();

    let group = pool.get_or_create_subgroup(EPISODES_SUBGROUP, chunks.len(), pool.concurrency())?;
    let (tx, rx) = mpsc::channel();
    for &(chunk_start, chunk_end) in &chunks {
        let tx = tx.clone();
        let catalog = Arc::clone(catalog);
        let series = series.clone();
        group.add_task(move || {
            let result = catalog.episode_range(&series, chunk_start, chunk_end);
            let _ = tx.send((chunk_start, result));
        });
    }
    drop(tx);
    group.close();

    let mut results: Vec<(u32, Result<Vec<Episode>, CatalogError>)> = rx.iter().collect();
    if results.len() < chunks.len() {
        return Err(CatalogError::Cancelled {
            series: series.name.clone(),
        });
    }
    results.sort_by_key(|(chunk_start, _)| *chunk_start);

    let mut episodes = Vec::new();
    for (chunk_start, result) in results {
        match result {
            Ok(mut chunk) => episodes.append(&mut chunk),
            Err(e) => {
                tracing::warn!(series = %series.slug, chunk_start, "episode chunk failed: {}", e);
                return Err(e);
            }
        }
    }
    episodes.sort_by_key(|e| e.number);
    episodes.dedup_by_key(|e| e.number);
    Ok(episodes)
}
