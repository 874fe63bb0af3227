//! Catalog backed by a local JSON manifest.
//!
//! ```json
//! {
//!   "name": "local",
//!   "series": [
//!     { "id": "1", "name": "Show", "slug": "show",
//!       "episodes": [ { "id": 10, "number": 1, "url": "https://cdn.example/show/1.mp4" } ] }
//!   ]
//! }
//! ```
//!
//! Episode URLs may use any scheme curl understands, including `file://`.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use super::{Catalog, CatalogError, Episode, Series};
use crate::fetch;

const DEFAULT_PROVIDER_NAME: &str = "manifest";

#[derive(Debug, Deserialize)]
struct ManifestFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    series: Vec<ManifestSeries>,
}

#[derive(Debug, Clone, Deserialize)]
struct ManifestSeries {
    id: String,
    name: String,
    slug: String,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    episodes: Vec<Episode>,
}

impl ManifestSeries {
    fn summary(&self) -> Series {
        Series {
            id: self.id.clone(),
            name: self.name.clone(),
            slug: self.slug.clone(),
            episodes: self.episodes.len() as u32,
            image_url: self.image_url.clone(),
        }
    }
}

#[derive(Debug)]
pub struct ManifestCatalog {
    name: String,
    series: Vec<ManifestSeries>,
}

impl ManifestCatalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let data = fs::read_to_string(path).map_err(|source| CatalogError::ManifestIo {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&data).map_err(|source| CatalogError::ManifestFormat {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_json(data: &str) -> Result<Self, serde_json::Error> {
        let file: ManifestFile = serde_json::from_str(data)?;
        let mut series = file.series;
        for s in &mut series {
            s.episodes.sort_by_key(|e| e.number);
        }
        Ok(Self {
            name: file.name.unwrap_or_else(|| DEFAULT_PROVIDER_NAME.to_string()),
            series,
        })
    }

    fn find(&self, id: &str) -> Result<&ManifestSeries, CatalogError> {
        self.series
            .iter()
            .find(|s| s.id == id)
            .ok_or_else(|| CatalogError::SeriesNotFound(id.to_string()))
    }
}

impl Catalog for ManifestCatalog {
    fn name(&self) -> &str {
        &self.name
    }

    /// Case-insensitive substring match on name and slug; an empty query lists everything.
    fn search(&self, query: &str) -> Result<Vec<Series>, CatalogError> {
        let needle = query.trim().to_lowercase();
        Ok(self
            .series
            .iter()
            .filter(|s| {
                needle.is_empty()
                    || s.name.to_lowercase().contains(&needle)
                    || s.slug.to_lowercase().contains(&needle)
            })
            .map(ManifestSeries::summary)
            .collect())
    }

    fn episode_range(&self, series: &Series, start: u32, end: u32) -> Result<Vec<Episode>, CatalogError> {
        let entry = self.find(&series.id)?;
        Ok(entry
            .episodes
            .iter()
            .filter(|e| (start..=end).contains(&u32::from(e.number)))
            .cloned()
            .collect())
    }

    fn download(&self, series: &Series, episode: &Episode, dest: &Path) -> anyhow::Result<u64> {
        let raw = episode.url.as_deref().ok_or_else(|| CatalogError::MissingUrl {
            series: series.slug.clone(),
            number: episode.number,
        })?;
        let url = url::Url::parse(raw).map_err(|source| CatalogError::InvalidUrl {
            series: series.slug.clone(),
            number: episode.number,
            url: raw.to_string(),
            source,
        })?;
        fetch::download_episode(url.as_str(), dest, episode.sha256.as_deref())
    }
}
