//! `seriesdl continue` – download the next episode of a series from the history.

use anyhow::Result;
use seriesdl_core::catalog::fetch_episodes;
use std::io::{BufRead, Write};

use super::watch::watch_series;
use super::App;
use crate::cli::prompt;

pub fn run_continue<R: BufRead, W: Write>(app: &App, delete: bool, input: &mut R, out: &mut W) -> Result<()> {
    let catalog = app.catalog()?;
    let mut entries: Vec<_> = app
        .history
        .entries()
        .into_iter()
        .filter(|h| h.provider == catalog.name())
        .collect();
    if entries.is_empty() {
        writeln!(out, "Nothing to continue: the history is empty.")?;
        return Ok(());
    }
    let entry = if entries.len() == 1 {
        entries.remove(0)
    } else {
        let i = prompt::choose(input, out, "Continue which series", &entries, |h| {
            format!("{} (last watched {}/{})", h.series_name, h.episode_number, h.series_total_episodes)
        })?;
        entries.swap_remove(i)
    };

    // Prefer the catalog's current view; the stored total may be stale.
    let series = catalog
        .search(&entry.series_name)?
        .into_iter()
        .find(|s| s.id == entry.series_id)
        .unwrap_or_else(|| entry.series());
    let episodes = fetch_episodes(app.scheduler.root(), &catalog, &series, 1, 0)?;
    watch_series(app, catalog, &series, &episodes, None, delete, input, out)
}
