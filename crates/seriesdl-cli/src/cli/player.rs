//! Playback of a downloaded episode.

use anyhow::{Context, Result};
use std::path::Path;

pub trait Player: Send + Sync {
    fn play(&self, path: &Path) -> Result<()>;
}

/// Opens files with the desktop's default application (`xdg-open` and friends).
#[derive(Debug, Default)]
pub struct SystemPlayer;

impl Player for SystemPlayer {
    fn play(&self, path: &Path) -> Result<()> {
        open::that(path).with_context(|| format!("open {} in the default player", path.display()))
    }
}
