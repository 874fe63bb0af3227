//! The "watch an episode" workflow.
//!
//! One session downloads the selected episode on the root pool, queues the next
//! few episodes on the `download_next` subgroup, optionally prunes older files on
//! `delete_prev`, then waits for the whole tree.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::catalog::{Catalog, Episode, Series};
use crate::config::SeriesConfig;
use crate::history::HistoryStore;
use crate::library;
use crate::pool::PoolError;
use crate::scheduler::Scheduler;
use crate::seen::MembershipCache;

/// Subgroup for the look-ahead batch.
pub const NEXT_SUBGROUP: &str = "download_next";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Episodes after the selected one to fetch in the background.
    pub next_episodes: usize,
    pub next_batch_concurrency: usize,
    /// Delete episodes numbered below the selected one.
    pub delete_previous: bool,
}

impl SessionOptions {
    pub fn from_config(cfg: &SeriesConfig, delete_previous: bool) -> Self {
        Self {
            next_episodes: cfg.download_next_episodes,
            next_batch_concurrency: cfg.next_batch_concurrency,
            delete_previous,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionReport {
    pub downloaded: usize,
    pub skipped: usize,
    pub failed: usize,
    pub deleted: usize,
}

#[derive(Default)]
struct Counters {
    downloaded: AtomicUsize,
    skipped: AtomicUsize,
    failed: AtomicUsize,
    deleted: Arc<AtomicUsize>,
}

impl Counters {
    fn report(&self) -> SessionReport {
        SessionReport {
            downloaded: self.downloaded.load(Ordering::SeqCst),
            skipped: self.skipped.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            deleted: self.deleted.load(Ordering::SeqCst),
        }
    }
}

/// What happened to one episode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fetched {
    Downloaded(PathBuf),
    AlreadyPresent(PathBuf),
}

impl Fetched {
    pub fn path(&self) -> &Path {
        match self {
            Fetched::Downloaded(p) | Fetched::AlreadyPresent(p) => p,
        }
    }
}

/// The episode right after `last_watched`, or `None` when the series is over.
pub fn next_after(episodes: &[Episode], last_watched: u16) -> Option<&Episode> {
    episodes.iter().filter(|e| e.number > last_watched).min_by_key(|e| e.number)
}

/// Which episode a session should fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Plan {
    Watch(Episode),
    /// History already reached the last episode.
    SeriesOver,
}

/// Pick the episode to watch: `requested` if given, else the one after the last
/// watched episode in `history`, else the first episode of the series.
pub fn plan(
    history: &HistoryStore,
    provider: &str,
    series: &Series,
    episodes: &[Episode],
    requested: Option<u16>,
) -> anyhow::Result<Plan> {
    if let Some(number) = requested {
        return match episodes.iter().find(|e| e.number == number) {
            Some(e) => Ok(Plan::Watch(e.clone())),
            None => anyhow::bail!("episode {} not found in {}", number, series.name),
        };
    }
    match history.find(provider, &series.id) {
        Some(entry) => Ok(next_after(episodes, entry.episode_number)
            .cloned()
            .map_or(Plan::SeriesOver, Plan::Watch)),
        None => match episodes.iter().min_by_key(|e| e.number) {
            Some(first) => Ok(Plan::Watch(first.clone())),
            None => anyhow::bail!("{} has no episodes", series.name),
        },
    }
}

/// Download one episode unless it is already in the library.
pub fn fetch_episode(
    catalog: &dyn Catalog,
    cache: &MembershipCache,
    root: &Path,
    series: &Series,
    episode: &Episode,
) -> anyhow::Result<Fetched> {
    let path = library::episode_path(root, &series.slug, episode.number);
    if library::is_downloaded(cache, &path) {
        tracing::debug!(path = %path.display(), "already downloaded, skipping");
        return Ok(Fetched::AlreadyPresent(path));
    }
    catalog.download(series, episode, &path)?;
    cache.add(&library::cache_key(&path));
    Ok(Fetched::Downloaded(path))
}

/// Called with the selected episode's path as soon as it is on disk.
pub type ReadyHook = Arc<dyn Fn(&Path) + Send + Sync>;

/// Collaborators a session submits work against.
pub struct WatchSession<'a> {
    scheduler: &'a Scheduler,
    catalog: Arc<dyn Catalog>,
    cache: Arc<MembershipCache>,
    history: Arc<HistoryStore>,
    root: PathBuf,
    options: SessionOptions,
    on_ready: Option<ReadyHook>,
}

impl<'a> WatchSession<'a> {
    pub fn new(
        scheduler: &'a Scheduler,
        catalog: Arc<dyn Catalog>,
        cache: Arc<MembershipCache>,
        history: Arc<HistoryStore>,
        root: PathBuf,
        options: SessionOptions,
    ) -> Self {
        Self {
            scheduler,
            catalog,
            cache,
            history,
            root,
            options,
            on_ready: None,
        }
    }

    /// Run `hook` on the worker that fetched the selected episode, before the
    /// look-ahead batch is done.
    pub fn on_ready(mut self, hook: ReadyHook) -> Self {
        self.on_ready = Some(hook);
        self
    }

    /// Fetch `selected` (recording it in the history), the look-ahead batch from
    /// `episodes`, and prune if asked. Blocks until all of it has finished; the
    /// subgroups it used are closed afterwards.
    pub fn run(&self, series: &Series, selected: &Episode, episodes: &[Episode]) -> Result<SessionReport, PoolError> {
        let counters = Arc::new(Counters::default());
        let mut used = Vec::new();

        self.submit_main(series, selected, &counters);

        let batch: Vec<Episode> = episodes
            .iter()
            .filter(|e| e.number > selected.number)
            .take(self.options.next_episodes)
            .cloned()
            .collect();
        if !batch.is_empty() {
            tracing::info!(series = %series.slug, count = batch.len(), "queueing next episodes");
            let group = self.scheduler.subgroup(
                NEXT_SUBGROUP,
                batch.len(),
                self.options.next_batch_concurrency,
            )?;
            for episode in batch {
                let catalog = Arc::clone(&self.catalog);
                let cache = Arc::clone(&self.cache);
                let root = self.root.clone();
                let series = series.clone();
                let counters = Arc::clone(&counters);
                group.add_task(move || {
                    match fetch_episode(catalog.as_ref(), &cache, &root, &series, &episode) {
                        Ok(fetched) => count(&counters, &fetched),
                        Err(e) => {
                            counters.failed.fetch_add(1, Ordering::SeqCst);
                            tracing::warn!(episode = episode.number, "download failed: {:#}", e);
                        }
                    }
                });
            }
            used.push(group);
        }

        if self.options.delete_previous {
            let dir = library::series_dir(&self.root, &series.slug);
            match library::prune_previous(self.scheduler.root(), &dir, selected.number, &counters.deleted) {
                Ok(0) => {}
                Ok(_) => {
                    if let Some(group) = self.scheduler.root().child(library::PRUNE_SUBGROUP) {
                        used.push(group);
                    }
                }
                Err(e) => tracing::warn!(dir = %dir.display(), "pruning skipped: {:#}", e),
            }
        }

        self.scheduler.wait_all();
        for group in used {
            group.close_all();
        }

        let report = counters.report();
        tracing::info!(
            series = %series.slug,
            downloaded = report.downloaded,
            skipped = report.skipped,
            failed = report.failed,
            deleted = report.deleted,
            "session finished"
        );
        Ok(report)
    }

    fn submit_main(&self, series: &Series, episode: &Episode, counters: &Arc<Counters>) {
        let catalog = Arc::clone(&self.catalog);
        let cache = Arc::clone(&self.cache);
        let history = Arc::clone(&self.history);
        let root = self.root.clone();
        let series = series.clone();
        let episode = episode.clone();
        let counters = Arc::clone(counters);
        let on_ready = self.on_ready.clone();
        self.scheduler.add_task(move || {
            tracing::info!(series = %series.slug, episode = episode.number, "downloading selected episode");
            match fetch_episode(catalog.as_ref(), &cache, &root, &series, &episode) {
                Ok(fetched) => {
                    count(&counters, &fetched);
                    if let Some(hook) = &on_ready {
                        hook(fetched.path());
                    }
                    if let Err(e) = history.record(catalog.name(), &series, &episode) {
                        tracing::warn!("could not update history: {:#}", e);
                    }
                }
                Err(e) => {
                    counters.failed.fetch_add(1, Ordering::SeqCst);
                    tracing::warn!(episode = episode.number, "download failed: {:#}", e);
                }
            }
        });
    }
}

fn count(counters: &Counters, fetched: &Fetched) {
    match fetched {
        Fetched::Downloaded(path) => {
            tracing::info!(path = %path.display(), "episode downloaded");
            counters.downloaded.fetch_add(1, Ordering::SeqCst);
        }
        Fetched::AlreadyPresent(_) => {
            counters.skipped.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ep(number: u16) -> Episode {
        Episode {
            id: u64::from(number),
            number,
            code: None,
            url: None,
            sha256: None,
        }
    }

    #[test]
    fn next_after_skips_gaps_and_detects_the_end() {
        let eps = vec![ep(1), ep(2), ep(4), ep(5)];
        assert_eq!(next_after(&eps, 0).map(|e| e.number), Some(1));
        assert_eq!(next_after(&eps, 2).map(|e| e.number), Some(4));
        assert!(next_after(&eps, 5).is_none());
        assert!(next_after(&[], 0).is_none());
    }

    #[test]
    fn plan_continues_from_history() {
        let dir = tempfile::tempdir().unwrap();
        let history = HistoryStore::open(dir.path()).unwrap();
        let series = Series {
            id: "7".into(),
            name: "Frieren".into(),
            slug: "frieren".into(),
            episodes: 3,
            image_url: None,
        };
        let eps = vec![ep(1), ep(2), ep(3)];

        assert_eq!(plan(&history, "local", &series, &eps, None).unwrap(), Plan::Watch(ep(1)));
        assert_eq!(plan(&history, "local", &series, &eps, Some(3)).unwrap(), Plan::Watch(ep(3)));
        assert!(plan(&history, "local", &series, &eps, Some(9)).is_err());

        history.record("local", &series, &ep(2)).unwrap();
        assert_eq!(plan(&history, "local", &series, &eps, None).unwrap(), Plan::Watch(ep(3)));
        history.record("local", &series, &ep(3)).unwrap();
        assert_eq!(plan(&history, "local", &series, &eps, None).unwrap(), Plan::SeriesOver);
        // A different provider has its own history.
        assert_eq!(plan(&history, "other", &series, &eps, None).unwrap(), Plan::Watch(ep(1)));
    }

    #[test]
    fn options_follow_config() {
        let mut cfg = SeriesConfig::default();
        cfg.download_next_episodes = 2;
        cfg.next_batch_concurrency = 3;
        let opts = SessionOptions::from_config(&cfg, true);
        assert_eq!(opts.next_episodes, 2);
        assert_eq!(opts.next_batch_concurrency, 3);
        assert!(opts.delete_previous);
    }
}
