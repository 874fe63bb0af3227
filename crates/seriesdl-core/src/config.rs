//! User configuration: `~/.config/seriesdl/config.toml` (or `<user>.toml` per profile),
//! overridable from the environment.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const MAX_CONCURRENT_DOWNLOADS_ENV: &str = "MAX_CONCURRENT_DOWNLOADS";
pub const DOWNLOAD_NEXT_EPISODES_ENV: &str = "DOWNLOAD_NEXT_EPISODES";
pub const USER_ROOT_DIR_ENV: &str = "USER_ROOT_DIR";

/// Default root pool size when nothing (valid) is configured.
pub const DEFAULT_MAX_CONCURRENT_DOWNLOADS: usize = 5;

/// Output directory name under `$HOME` when `root_dir` is not set.
pub const DEFAULT_ROOT_DIR_NAME: &str = ".series_downloader";

/// Membership cache sizing (optional section in the config file).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Roughly how many episode files the output directory will hold.
    pub expected_items: usize,
    /// Target false-positive rate for `contains`.
    pub false_positive_rate: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            expected_items: 1000,
            false_positive_rate: 0.01,
        }
    }
}

fn default_next_batch_concurrency() -> usize {
    5
}

fn default_play_after_download() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeriesConfig {
    /// Worker count (and queue size) of the root pool.
    pub max_concurrent_downloads: usize,
    /// How many episodes after the selected one to fetch in the background.
    pub download_next_episodes: usize,
    /// Workers for the background batch.
    #[serde(default = "default_next_batch_concurrency")]
    pub next_batch_concurrency: usize,
    /// Open the selected episode in the system player once it is on disk.
    #[serde(default = "default_play_after_download")]
    pub play_after_download: bool,
    /// Where episodes and the history file live. Defaults to `~/.series_downloader`.
    #[serde(default)]
    pub root_dir: Option<PathBuf>,
    /// JSON catalog manifest used when `--catalog` is not given.
    #[serde(default)]
    pub catalog_path: Option<PathBuf>,
    #[serde(default)]
    pub cache: Option<CacheConfig>,
}

impl Default for SeriesConfig {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: DEFAULT_MAX_CONCURRENT_DOWNLOADS,
            download_next_episodes: 5,
            next_batch_concurrency: default_next_batch_concurrency(),
            play_after_download: default_play_after_download(),
            root_dir: None,
            catalog_path: None,
            cache: None,
        }
    }
}

impl SeriesConfig {
    /// Apply `MAX_CONCURRENT_DOWNLOADS`, `DOWNLOAD_NEXT_EPISODES` and `USER_ROOT_DIR`.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Same as [`apply_env_overrides`](Self::apply_env_overrides) with an explicit lookup.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(MAX_CONCURRENT_DOWNLOADS_ENV) {
            if let Some(n) = parse_count(MAX_CONCURRENT_DOWNLOADS_ENV, &raw) {
                self.max_concurrent_downloads = n;
            }
        }
        if let Some(raw) = lookup(DOWNLOAD_NEXT_EPISODES_ENV) {
            if let Some(n) = parse_count(DOWNLOAD_NEXT_EPISODES_ENV, &raw) {
                self.download_next_episodes = n;
            }
        }
        if let Some(raw) = lookup(USER_ROOT_DIR_ENV) {
            if !raw.trim().is_empty() {
                self.root_dir = Some(PathBuf::from(raw.trim()));
            }
        }
    }

    /// Output root: `root_dir` if set, else `~/.series_downloader`.
    pub fn resolved_root_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.root_dir {
            return Ok(dir.clone());
        }
        let home = std::env::var_os("HOME").context("HOME is not set and no root_dir configured")?;
        Ok(PathBuf::from(home).join(DEFAULT_ROOT_DIR_NAME))
    }

    pub fn cache_config(&self) -> CacheConfig {
        self.cache.clone().unwrap_or_default()
    }
}

/// Parse a non-negative count from an environment value.
///
/// Empty input is ignored; anything but ASCII digits (or a value over `u16::MAX`)
/// is ignored with a warning so the default stays in effect.
pub fn parse_count(name: &str, raw: &str) -> Option<usize> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if !raw.chars().all(|c| c.is_ascii_digit()) {
        tracing::warn!("only digits are allowed in {}, ignoring {:?}", name, raw);
        return None;
    }
    match raw.parse::<u16>() {
        Ok(n) => Some(usize::from(n)),
        Err(e) => {
            tracing::warn!("{}={} is out of range ({}), ignoring", name, raw, e);
            None
        }
    }
}

fn profile_file_name(user: Option<&str>) -> String {
    match user.map(str::trim).filter(|u| !u.is_empty()) {
        Some(user) => {
            let safe: String = user
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
                .collect();
            format!("{}.toml", safe)
        }
        None => "config.toml".to_string(),
    }
}

/// Config file for the given profile under `~/.config/seriesdl/`.
pub fn config_path(user: Option<&str>) -> Result<PathBuf> {
    let xdg_dirs = xdg::BaseDirectories::with_prefix("seriesdl")?;
    Ok(xdg_dirs.place_config_file(profile_file_name(user))?)
}

/// Load the profile's configuration, creating a default file if none exists.
pub fn load_or_init(user: Option<&str>) -> Result<SeriesConfig> {
    load_or_init_at(&config_path(user)?)
}

/// Load configuration from `path`, writing defaults there first if it is missing.
pub fn load_or_init_at(path: &Path) -> Result<SeriesConfig> {
    if !path.exists() {
        let default_cfg = SeriesConfig::default();
        let toml = toml::to_string_pretty(&default_cfg)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml).with_context(|| format!("write {}", path.display()))?;
        tracing::info!("created default config at {}", path.display());
        return Ok(default_cfg);
    }

    let data = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: SeriesConfig =
        toml::from_str(&data).with_context(|| format!("parse {}", path.display()))?;
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn default_config_values() {
        let cfg = SeriesConfig::default();
        assert_eq!(cfg.max_concurrent_downloads, 5);
        assert_eq!(cfg.download_next_episodes, 5);
        assert_eq!(cfg.next_batch_concurrency, 5);
        assert!(cfg.play_after_download);
        assert!(cfg.root_dir.is_none());
        assert_eq!(cfg.cache_config(), CacheConfig::default());
    }

    #[test]
    fn config_toml_roundtrip() {
        let cfg = SeriesConfig::default();
        let toml = toml::to_string_pretty(&cfg).unwrap();
        let parsed: SeriesConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed, cfg);
    }

    #[test]
    fn config_toml_custom_values() {
        let toml = r#"
            max_concurrent_downloads = 8
            download_next_episodes = 2
            root_dir = "/srv/series"

            [cache]
            expected_items = 500
            false_positive_rate = 0.05
        "#;
        let cfg: SeriesConfig = toml::from_str(toml).unwrap();
        assert_eq!(cfg.max_concurrent_downloads, 8);
        assert_eq!(cfg.download_next_episodes, 2);
        assert_eq!(cfg.next_batch_concurrency, 5);
        assert!(cfg.play_after_download);
        assert_eq!(cfg.root_dir.as_deref(), Some(Path::new("/srv/series")));
        let cache = cfg.cache_config();
        assert_eq!(cache.expected_items, 500);
        assert!((cache.false_positive_rate - 0.05).abs() < 1e-9);
    }

    #[test]
    fn env_overrides_apply_valid_numbers() {
        let mut cfg = SeriesConfig::default();
        cfg.apply_overrides(lookup(&[
            (MAX_CONCURRENT_DOWNLOADS_ENV, "12"),
            (DOWNLOAD_NEXT_EPISODES_ENV, " 3 "),
            (USER_ROOT_DIR_ENV, "/data/anime"),
        ]));
        assert_eq!(cfg.max_concurrent_downloads, 12);
        assert_eq!(cfg.download_next_episodes, 3);
        assert_eq!(cfg.resolved_root_dir().unwrap(), PathBuf::from("/data/anime"));
    }

    #[test]
    fn non_numeric_env_falls_back_to_default() {
        let mut cfg = SeriesConfig::default();
        cfg.apply_overrides(lookup(&[
            (MAX_CONCURRENT_DOWNLOADS_ENV, "five"),
            (DOWNLOAD_NEXT_EPISODES_ENV, "-1"),
        ]));
        assert_eq!(cfg.max_concurrent_downloads, DEFAULT_MAX_CONCURRENT_DOWNLOADS);
        assert_eq!(cfg.download_next_episodes, 5);
    }

    #[test]
    fn parse_count_rejects_garbage_and_overflow() {
        assert_eq!(parse_count("X", "7"), Some(7));
        assert_eq!(parse_count("X", "0"), Some(0));
        assert_eq!(parse_count("X", ""), None);
        assert_eq!(parse_count("X", "4a"), None);
        assert_eq!(parse_count("X", "70000"), None);
    }

    #[test]
    fn profile_file_names() {
        assert_eq!(profile_file_name(None), "config.toml");
        assert_eq!(profile_file_name(Some("  ")), "config.toml");
        assert_eq!(profile_file_name(Some("alice")), "alice.toml");
        assert_eq!(profile_file_name(Some("../evil")), "___evil.toml");
    }

    #[test]
    fn load_or_init_creates_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let cfg = load_or_init_at(&path).unwrap();
        assert_eq!(cfg, SeriesConfig::default());
        assert!(path.exists());

        fs::write(
            &path,
            "max_concurrent_downloads = 2\ndownload_next_episodes = 0\nplay_after_download = false\n",
        )
        .unwrap();
        let cfg = load_or_init_at(&path).unwrap();
        assert!(!cfg.play_after_download);
        assert_eq!(cfg.max_concurrent_downloads, 2);
        assert_eq!(cfg.download_next_episodes, 0);
    }
}
