//! Per-user watch history, stored as JSON in `<root>/.history`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::catalog::{Episode, Series};

pub const HISTORY_FILE: &str = ".history";

/// Last episode watched for one series of one provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub provider: String,
    pub series_id: String,
    pub series_name: String,
    pub series_slug: String,
    #[serde(rename = "series_tot_episodes", default)]
    pub series_total_episodes: u32,
    pub episode_id: u64,
    pub episode_number: u16,
}

impl HistoryEntry {
    /// The series as last seen, for resuming without a catalog search.
    pub fn series(&self) -> Series {
        Series {
            id: self.series_id.clone(),
            name: self.series_name.clone(),
            slug: self.series_slug.clone(),
            episodes: self.series_total_episodes,
            image_url: None,
        }
    }
}

/// Watch history shared between the CLI and download tasks.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    entries: Mutex<Vec<HistoryEntry>>,
}

impl HistoryStore {
    /// Load `<root>/.history`. A missing file gives an empty history; an unreadable
    /// one is logged and also treated as empty.
    pub fn open(root: &Path) -> Result<Self> {
        let path = root.join(HISTORY_FILE);
        let entries = match fs::read(&path) {
            Ok(data) => serde_json::from_slice(&data).unwrap_or_else(|e| {
                tracing::warn!(path = %path.display(), "ignoring corrupt history: {}", e);
                Vec::new()
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                return Err(anyhow::Error::new(e).context(format!("read {}", path.display())));
            }
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Vec<HistoryEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> Vec<HistoryEntry> {
        self.lock().clone()
    }

    pub fn find(&self, provider: &str, series_id: &str) -> Option<HistoryEntry> {
        self.lock()
            .iter()
            .find(|h| h.provider == provider && h.series_id == series_id)
            .cloned()
    }

    /// Record `episode` as the last one watched of `series`, then persist.
    pub fn record(&self, provider: &str, series: &Series, episode: &Episode) -> Result<()> {
        let mut entries = self.lock();
        match entries
            .iter_mut()
            .find(|h| h.provider == provider && h.series_id == series.id)
        {
            Some(entry) => {
                entry.episode_id = episode.id;
                entry.episode_number = episode.number;
                if series.episodes > 0 {
                    entry.series_total_episodes = series.episodes;
                }
            }
            None => entries.push(HistoryEntry {
                provider: provider.to_string(),
                series_id: series.id.clone(),
                series_name: series.name.clone(),
                series_slug: series.slug.clone(),
                series_total_episodes: series.episodes,
                episode_id: episode.id,
                episode_number: episode.number,
            }),
        }
        self.persist(&entries)
    }

    fn persist(&self, entries: &[HistoryEntry]) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("create {}", parent.display()))?;
        }
        let json = serde_json::to_vec_pretty(entries)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &self.path)
            .with_context(|| format!("rename {} -> {}", tmp.display(), self.path.display()))?;
        Ok(())
    }
}
