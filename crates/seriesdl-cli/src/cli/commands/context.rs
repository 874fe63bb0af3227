//! Process-wide state shared by the download commands.

use anyhow::{Context, Result};
use seriesdl_core::catalog::{Catalog, ManifestCatalog};
use seriesdl_core::config::{self, SeriesConfig};
use seriesdl_core::history::HistoryStore;
use seriesdl_core::library;
use seriesdl_core::scheduler::Scheduler;
use seriesdl_core::seen::MembershipCache;
use seriesdl_core::session::{SessionOptions, WatchSession};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::player::Player;

pub struct App {
    pub cfg: SeriesConfig,
    pub root: PathBuf,
    pub scheduler: Scheduler,
    pub cache: Arc<MembershipCache>,
    pub history: Arc<HistoryStore>,
    catalog_path: Option<PathBuf>,
    player: Option<Arc<dyn Player>>,
}

impl App {
    /// Create the output root, start the scheduler, load the history and fill the
    /// membership cache from the files already on disk. Without a `player` episodes
    /// are only downloaded.
    pub fn open(
        cfg: SeriesConfig,
        catalog_override: Option<PathBuf>,
        player: Option<Arc<dyn Player>>,
    ) -> Result<Self> {
        let root = cfg.resolved_root_dir()?;
        fs::create_dir_all(&root).with_context(|| format!("create {}", root.display()))?;

        let scheduler = Scheduler::from_config(&cfg)?;
        let cache_cfg = cfg.cache_config();
        let cache = Arc::new(MembershipCache::new(
            cache_cfg.expected_items,
            cache_cfg.false_positive_rate,
        ));
        library::populate_cache(scheduler.root(), &cache, &root)?;
        let history = Arc::new(HistoryStore::open(&root)?);
        let catalog_path = catalog_override.or_else(|| cfg.catalog_path.clone());

        Ok(Self {
            cfg,
            root,
            scheduler,
            cache,
            history,
            catalog_path,
            player,
        })
    }

    pub fn catalog(&self) -> Result<Arc<dyn Catalog>> {
        let path = match &self.catalog_path {
            Some(p) => p,
            None => {
                let cfg_path = config::config_path(None)?;
                anyhow::bail!(
                    "no catalog configured; pass --catalog or set catalog_path in {}",
                    cfg_path.display()
                );
            }
        };
        Ok(Arc::new(ManifestCatalog::load(path)?))
    }

    pub fn session(&self, catalog: Arc<dyn Catalog>, delete_previous: bool) -> WatchSession<'_> {
        let session = WatchSession::new(
            &self.scheduler,
            catalog,
            Arc::clone(&self.cache),
            Arc::clone(&self.history),
            self.root.clone(),
            SessionOptions::from_config(&self.cfg, delete_previous),
        );
        match &self.player {
            Some(player) => {
                let player = Arc::clone(player);
                session.on_ready(Arc::new(move |path: &Path| {
                    if let Err(e) = player.play(path) {
                        tracing::warn!("could not play episode: {:#}", e);
                    }
                }))
            }
            None => session,
        }
    }

    /// Drain and stop every pool.
    pub fn shutdown(self) {
        self.scheduler.close_all();
    }
}
