//! Shared utilities for CLI commands.

use std::path::Path;

use anyhow::{Context, Result};
use playlog_ingest::LogCache;

use crate::Config;

/// Parses a `--players` argument.
///
/// `all` (any case) or an empty argument selects every player and yields an
/// empty list.
pub fn parse_players(arg: &str) -> Vec<String> {
    let arg = arg.trim();
    if arg.is_empty() || arg.eq_ignore_ascii_case("all") {
        return Vec::new();
    }
    arg.split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parses a `--players` argument, warning about players without a log.
pub fn resolve_players(arg: &str, cache: &LogCache) -> Vec<String> {
    let players = parse_players(arg);
    let known = cache.players();
    for player in players.iter().filter(|p| !known.contains(&p.as_str())) {
        tracing::warn!(%player, "no log file for selected player");
    }
    players
}

/// Creates a cache over `data_dir` and loads every log in it.
pub fn load_cache(data_dir: &Path, config: &Config) -> Result<LogCache> {
    let mut cache = LogCache::new(
        data_dir,
        config.file_extension.as_str(),
        config.segment_config(),
    );
    cache
        .initial_load()
        .with_context(|| format!("failed to load logs from {}", data_dir.display()))?;
    Ok(cache)
}

/// Formats an optional measurement with one decimal, `-` when absent.
pub fn format_optional(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.1}"))
}
