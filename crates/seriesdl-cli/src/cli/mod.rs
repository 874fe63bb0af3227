//! CLI for seriesdl.

mod commands;
mod player;
mod prompt;

use anyhow::Result;
use clap::{Parser, Subcommand};
use seriesdl_core::config;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use commands::{run_continue, run_history, run_watch, App};
use player::{Player, SystemPlayer};

/// Top-level CLI for the series downloader.
#[derive(Debug, Parser)]
#[command(name = "seriesdl")]
#[command(about = "seriesdl: download series episodes ahead of watching them", long_about = None)]
pub struct Cli {
    /// Config profile: reads `<user>.toml` instead of `config.toml`.
    #[arg(short, long, global = true, value_name = "NAME")]
    pub user: Option<String>,

    /// JSON catalog manifest (overrides `catalog_path` from the config).
    #[arg(long, global = true, value_name = "PATH")]
    pub catalog: Option<PathBuf>,

    /// Only download; do not open the episode in the default player.
    #[arg(long, global = true)]
    pub no_play: bool,

    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Search a series and download an episode plus the next few.
    Watch {
        /// Series title (or part of it).
        title: String,

        /// Episode number to watch. Without it you are offered the next one, or a menu.
        #[arg(short, long, value_name = "N")]
        episode: Option<u16>,

        /// Delete downloaded episodes numbered below the one being watched.
        #[arg(short, long)]
        delete: bool,
    },

    /// Pick a series from the history and download its next episode.
    Continue {
        /// Delete downloaded episodes numbered below the one being watched.
        #[arg(short, long)]
        delete: bool,
    },

    /// Show the watch history.
    History,
}

impl CliCommand {
    pub fn run_from_args() -> Result<()> {
        Cli::parse().run()
    }
}

impl Cli {
    fn run(self) -> Result<()> {
        let mut cfg = config::load_or_init(self.user.as_deref())?;
        cfg.apply_env_overrides();
        tracing::debug!("loaded config: {:?}", cfg);

        let player: Option<Arc<dyn Player>> = if self.no_play || !cfg.play_after_download {
            None
        } else {
            Some(Arc::new(SystemPlayer))
        };

        let stdin = io::stdin();
        let mut input = stdin.lock();
        let stdout = io::stdout();
        let mut out = stdout.lock();

        match self.command {
            CliCommand::History => run_history(&cfg, &mut out)?,
            CliCommand::Watch {
                title,
                episode,
                delete,
            } => {
                let app = App::open(cfg, self.catalog, player)?;
                let result = run_watch(&app, &title, episode, delete, &mut input, &mut out);
                app.shutdown();
                result?;
            }
            CliCommand::Continue { delete } => {
                let app = App::open(cfg, self.catalog, player)?;
                let result = run_continue(&app, delete, &mut input, &mut out);
                app.shutdown();
                result?;
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
