//! Episode catalogs.
//!
//! A [`Catalog`] answers searches, lists episodes of a series and knows how to
//! fetch one episode to disk. Episode listing for long series is split into
//! chunks fetched concurrently through the task pool (see [`fetch_episodes`]).

mod batch;
mod manifest;

pub use batch::{fetch_episodes, EPISODE_CHUNK, EPISODES_SUBGROUP};
pub use manifest::ManifestCatalog;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::pool::PoolError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Series {
    pub id: String,
    pub name: String,
    pub slug: String,
    /// Total number of episodes the catalog reports for the series.
    #[serde(default)]
    pub episodes: u32,
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    pub id: u64,
    pub number: u16,
    /// Provider-specific stream code.
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    /// Hex SHA-256 of the file, checked after download when present.
    #[serde(default)]
    pub sha256: Option<String>,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("series `{0}` not found in catalog")]
    SeriesNotFound(String),
    #[error("episode {number} of `{series}` has no download url")]
    MissingUrl { series: String, number: u16 },
    #[error("invalid url `{url}` for episode {number} of `{series}`")]
    InvalidUrl {
        series: String,
        number: u16,
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("failed to read catalog manifest {path}")]
    ManifestIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid catalog manifest {path}")]
    ManifestFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("episode listing for `{series}` was cancelled")]
    Cancelled { series: String },
    #[error(transparent)]
    Pool(#[from] PoolError),
}

/// Source of series, episode listings and episode files.
pub trait Catalog: Send + Sync {
    /// Provider name recorded in the watch history.
    fn name(&self) -> &str;

    fn search(&self, query: &str) -> Result<Vec<Series>, CatalogError>;

    /// Episodes numbered `start..=end` (1-based).
    fn episode_range(&self, series: &Series, start: u32, end: u32) -> Result<Vec<Episode>, CatalogError>;

    /// Fetch one episode to `dest`. Returns the bytes written.
    fn download(&self, series: &Series, episode: &Episode, dest: &Path) -> anyhow::Result<u64>;
}
