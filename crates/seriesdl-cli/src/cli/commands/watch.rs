//! `seriesdl watch <title>` – search a series and download an episode.

use anyhow::Result;
use seriesdl_core::catalog::{fetch_episodes, Catalog, Episode, Series};
use seriesdl_core::library;
use seriesdl_core::session::{self, Plan};
use std::io::{BufRead, Write};
use std::sync::Arc;

use super::App;
use crate::cli::prompt;

pub fn run_watch<R: BufRead, W: Write>(
    app: &App,
    title: &str,
    episode: Option<u16>,
    delete: bool,
    input: &mut R,
    out: &mut W,
) -> Result<()> {
    let catalog = app.catalog()?;
    let mut hits = catalog.search(title)?;
    if hits.is_empty() {
        writeln!(out, "No series matching \"{}\".", title)?;
        return Ok(());
    }
    let series = if hits.len() == 1 {
        hits.remove(0)
    } else {
        let i = prompt::choose(input, out, "Select a series", &hits, |s| {
            format!("{} ({} episodes)", s.name, s.episodes)
        })?;
        hits.swap_remove(i)
    };

    let episodes = fetch_episodes(app.scheduler.root(), &catalog, &series, 1, 0)?;
    watch_series(app, catalog, &series, &episodes, episode, delete, input, out)
}

/// Pick, download and report one episode of `series`.
///
/// With history for the series the user is offered the next episode; declining,
/// or having no history, shows the episode menu.
#[allow(clippy::too_many_arguments)]
pub(super) fn watch_series<R: BufRead, W: Write>(
    app: &App,
    catalog: Arc<dyn Catalog>,
    series: &Series,
    episodes: &[Episode],
    requested: Option<u16>,
    delete: bool,
    input: &mut R,
    out: &mut W,
) -> Result<()> {
    let plan = match (requested, app.history.find(catalog.name(), &series.id)) {
        (Some(_), _) => session::plan(&app.history, catalog.name(), series, episodes, requested)?,
        (None, Some(entry)) => {
            writeln!(out, "Current episode: {}", entry.episode_number)?;
            if prompt::confirm(input, out, "Watch the next episode?")? {
                session::plan(&app.history, catalog.name(), series, episodes, None)?
            } else {
                choose_episode(series, episodes, input, out)?
            }
        }
        (None, None) => choose_episode(series, episodes, input, out)?,
    };
    let episode = match plan {
        Plan::Watch(e) => e,
        Plan::SeriesOver => {
            writeln!(out, "{} is over: every episode has been watched.", series.name)?;
            return Ok(());
        }
    };

    writeln!(out, "Downloading {} episode {}...", series.name, episode.number)?;
    let report = app.session(catalog, delete).run(series, &episode, episodes)?;

    let path = library::episode_path(&app.root, &series.slug, episode.number);
    if !path.is_file() {
        anyhow::bail!("episode {} of {} could not be downloaded", episode.number, series.name);
    }
    writeln!(out, "{}", path.display())?;
    writeln!(
        out,
        "downloaded {}, already present {}, failed {}, deleted {}",
        report.downloaded, report.skipped, report.failed, report.deleted
    )?;
    Ok(())
}

fn choose_episode<R: BufRead, W: Write>(
    series: &Series,
    episodes: &[Episode],
    input: &mut R,
    out: &mut W,
) -> Result<Plan> {
    if episodes.is_empty() {
        anyhow::bail!("{} has no episodes", series.name);
    }
    let i = prompt::choose(input, out, "Select an episode", episodes, |e| {
        format!("Episode {}", e.number)
    })?;
    Ok(Plan::Watch(episodes[i].clone()))
}
