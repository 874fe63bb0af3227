use super::parse;
use crate::cli::{Cli, CliCommand};
use clap::Parser;
use std::path::PathBuf;

#[test]
fn cli_parse_watch() {
    let cli = parse(&["seriesdl", "watch", "frieren"]);
    assert!(cli.user.is_none());
    match cli.command {
        CliCommand::Watch {
            title,
            episode,
            delete,
        } => {
            assert_eq!(title, "frieren");
            assert_eq!(episode, None);
            assert!(!delete);
        }
        _ => panic!("expected Watch"),
    }
}

#[test]
fn cli_parse_watch_with_flags() {
    let cli = parse(&["seriesdl", "watch", "frieren", "-d", "--episode", "12"]);
    match cli.command {
        CliCommand::Watch { episode, delete, .. } => {
            assert_eq!(episode, Some(12));
            assert!(delete);
        }
        _ => panic!("expected Watch"),
    }
}

#[test]
fn cli_parse_continue() {
    match parse(&["seriesdl", "continue", "--delete"]).command {
        CliCommand::Continue { delete } => assert!(delete),
        _ => panic!("expected Continue"),
    }
}

#[test]
fn cli_parse_global_options_after_subcommand() {
    let cli = parse(&["seriesdl", "history", "--user", "alice", "--catalog", "/tmp/c.json"]);
    assert!(matches!(cli.command, CliCommand::History));
    assert_eq!(cli.user.as_deref(), Some("alice"));
    assert_eq!(cli.catalog, Some(PathBuf::from("/tmp/c.json")));
}

#[test]
fn cli_parse_no_play() {
    assert!(!parse(&["seriesdl", "continue"]).no_play);
    let cli = parse(&["seriesdl", "watch", "frieren", "--no-play"]);
    assert!(cli.no_play);
    assert!(matches!(cli.command, CliCommand::Watch { .. }));
}

#[test]
fn cli_rejects_bad_episode_and_missing_title() {
    assert!(Cli::try_parse_from(["seriesdl", "watch", "x", "--episode", "-3"]).is_err());
    assert!(Cli::try_parse_from(["seriesdl", "watch", "x", "--episode", "70000"]).is_err());
    assert!(Cli::try_parse_from(["seriesdl", "watch"]).is_err());
    assert!(Cli::try_parse_from(["seriesdl"]).is_err());
}
