//! `seriesdl history` – list watched series.

use anyhow::Result;
use seriesdl_core::config::SeriesConfig;
use seriesdl_core::history::HistoryStore;
use std::io::Write;

pub fn run_history<W: Write>(cfg: &SeriesConfig, out: &mut W) -> Result<()> {
    let root = cfg.resolved_root_dir()?;
    let history = HistoryStore::open(&root)?;
    let entries = history.entries();
    if entries.is_empty() {
        writeln!(out, "No series watched yet.")?;
        return Ok(());
    }
    writeln!(out, "{:<12} {:<32} {}", "PROVIDER", "SERIES", "EPISODE")?;
    for h in entries {
        writeln!(
            out,
            "{:<12} {:<32} {}/{}",
            h.provider, h.series_name, h.episode_number, h.series_total_episodes
        )?;
    }
    Ok(())
}
