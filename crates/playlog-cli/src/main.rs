use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use playlog_core::Policy;
use playlog_ingest::LogCache;
use tracing_subscriber::EnvFilter;

use playlog_cli::commands::report::ReportOptions;
use playlog_cli::commands::util::{load_cache, resolve_players};
use playlog_cli::commands::{grabs, players, report, segments, watch};
use playlog_cli::{Cli, Commands, Config, SourceArgs};

/// Loads the cache for `source`, falling back to the configured data directory.
fn open_source(source: &SourceArgs, config: &Config) -> Result<(LogCache, Vec<String>)> {
    let data_dir = source.data_dir.as_deref().unwrap_or(config.data_dir.as_path());
    let cache = load_cache(data_dir, config)?;
    let players = resolve_players(&source.players, &cache);
    Ok((cache, players))
}

fn report_options(players: Vec<String>, policy: Option<Policy>, config: &Config) -> ReportOptions {
    ReportOptions {
        players,
        policy: policy.unwrap_or(config.default_policy),
        exclude_root_grabs: config.exclude_root_grabs,
    }
}

fn output_dir<'a>(out_dir: Option<&'a Path>, config: &'a Config) -> &'a Path {
    out_dir.unwrap_or(config.output_dir.as_path())
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let config = Config::load_from(cli.config.as_deref()).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    let mut stdout = io::stdout().lock();

    match cli.command {
        Some(Commands::Report {
            source,
            out_dir,
            policy,
        }) => {
            let (cache, players) = open_source(&source, &config)?;
            let options = report_options(players, policy, &config);
            report::run(
                &mut stdout,
                &cache,
                output_dir(out_dir.as_deref(), &config),
                &options,
            )?;
        }
        Some(Commands::Segments { source, view, json }) => {
            let (cache, players) = open_source(&source, &config)?;
            segments::run(&mut stdout, &cache, &players, view, json)?;
        }
        Some(Commands::Grabs {
            stage,
            source,
            policy,
            json,
        }) => {
            let (cache, players) = open_source(&source, &config)?;
            let options = grabs::GrabsOptions {
                stage: &stage,
                players: &players,
                policy: policy.unwrap_or(config.default_policy),
                exclude_root: config.exclude_root_grabs,
                segment_config: config.segment_config(),
            };
            grabs::run(&mut stdout, &cache, &options, json)?;
        }
        Some(Commands::Players { data_dir }) => {
            let data_dir: PathBuf = data_dir.unwrap_or_else(|| config.data_dir.clone());
            let cache = load_cache(&data_dir, &config)?;
            players::run(&mut stdout, &cache)?;
        }
        Some(Commands::Watch {
            source,
            out_dir,
            policy,
            interval,
        }) => {
            let (mut cache, players) = open_source(&source, &config)?;
            let options = report_options(players, policy, &config);
            let interval = Duration::from_secs(interval.unwrap_or(config.watch_interval_secs).max(1));
            watch::run(
                &mut stdout,
                &mut cache,
                output_dir(out_dir.as_deref(), &config),
                &options,
                interval,
            )?;
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
