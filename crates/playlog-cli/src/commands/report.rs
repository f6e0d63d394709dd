//! Report command writing the aggregate CSV tables.
//!
//! This module implements `playlog report`, which writes five tables to the
//! output directory:
//!
//! | File                              | Rows                                   |
//! |-----------------------------------|----------------------------------------|
//! | `global_stage_means.csv`          | one per stage                          |
//! | `global_exit_counts.csv`          | one per stage                          |
//! | `personal_exit_counts.csv`        | one per (player, stage)                |
//! | `personal_first_clear_stars.csv`  | one per (player, stage) with a clear   |
//! | `first_grab_top3_by_stage.csv`    | up to three per stage                  |

use std::collections::BTreeSet;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use playlog_core::{
    Event, Policy, Segment, first_clear_stars, player_selected, player_stage_exit_counts, select,
    stage_exit_counts, stage_means, top_distinct_grabs,
};
use playlog_ingest::LogCache;
use serde::Serialize;

pub const GLOBAL_STAGE_MEANS: &str = "global_stage_means.csv";
pub const GLOBAL_EXIT_COUNTS: &str = "global_exit_counts.csv";
pub const PERSONAL_EXIT_COUNTS: &str = "personal_exit_counts.csv";
pub const PERSONAL_FIRST_CLEAR_STARS: &str = "personal_first_clear_stars.csv";
pub const FIRST_GRAB_TOP3: &str = "first_grab_top3_by_stage.csv";

const STAGE_MEANS_HEADER: &[&str] = &[
    "stage",
    "n_players_used",
    "mean_stage_play_time",
    "mean_clear_time",
    "mean_first_clear_star",
    "mean_retry",
    "mean_cam_move",
    "mean_cam_rotate",
    "mean_cam_pan",
    "mean_cam_total",
    "mean_grab_pair",
    "mean_pushpull",
];
const STAGE_EXIT_HEADER: &[&str] = &["stage", "exit_sum"];
const PLAYER_EXIT_HEADER: &[&str] = &["player_id", "stage", "exit_sum"];
const FIRST_CLEAR_STAR_HEADER: &[&str] = &["player_id", "stage", "first_clear_star"];
const FIRST_GRAB_HEADER: &[&str] = &[
    "stage",
    "rank",
    "object_name",
    "timestamp",
    "elapsed_seconds",
    "player_id",
];

/// What to include in a report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportOptions {
    /// Selected players; empty means everyone.
    pub players: Vec<String>,
    /// Policy choosing the attempt whose grabs are ranked per stage.
    pub policy: Policy,
    pub exclude_root_grabs: bool,
}

/// One row of the first-grab table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StageGrabRow {
    pub stage: String,
    pub rank: usize,
    pub object_name: String,
    pub timestamp: DateTime<Utc>,
    pub elapsed_seconds: f64,
    pub player_id: String,
}

/// Ranks first grabs for every stage present in `segments`, ordered by stage.
pub fn first_grab_rows(
    events: &[&Event],
    segments: &[Segment],
    options: &ReportOptions,
) -> Vec<StageGrabRow> {
    let stages: BTreeSet<&str> = segments.iter().map(|s| s.stage.as_str()).collect();

    stages
        .into_iter()
        .flat_map(|stage| {
            select(segments, stage, &options.players, options.policy)
                .map(|seg| {
                    top_distinct_grabs(events, seg, &options.players, options.exclude_root_grabs)
                })
                .unwrap_or_default()
                .into_iter()
                .map(move |grab| StageGrabRow {
                    stage: stage.to_string(),
                    rank: grab.rank,
                    object_name: grab.object_name,
                    timestamp: grab.timestamp,
                    elapsed_seconds: grab.elapsed_seconds,
                    player_id: grab.player_id,
                })
        })
        .collect()
}

/// Writes rows as CSV with a header line, even when there are no rows.
fn write_table<T: Serialize>(path: &Path, header: &[&str], rows: &[T]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    writer.write_record(header)?;
    for row in rows {
        writer.serialize(row)?;
    }
    writer
        .flush()
        .with_context(|| format!("failed to write {}", path.display()))?;
    tracing::debug!(path = %path.display(), rows = rows.len(), "wrote report table");
    Ok(())
}

/// Writes all report tables into `out_dir`, returning the written paths.
pub fn generate(cache: &LogCache, out_dir: &Path, options: &ReportOptions) -> Result<Vec<PathBuf>> {
    fs::create_dir_all(out_dir)
        .with_context(|| format!("failed to create {}", out_dir.display()))?;

    let segments: Vec<Segment> = cache
        .all_segments()
        .into_iter()
        .filter(|s| player_selected(&options.players, &s.player_id))
        .collect();
    let events = cache.all_events();
    let players = &options.players;

    let table = |name: &str| out_dir.join(name);
    write_table(&table(GLOBAL_STAGE_MEANS), STAGE_MEANS_HEADER, &stage_means(&segments))?;
    write_table(
        &table(GLOBAL_EXIT_COUNTS),
        STAGE_EXIT_HEADER,
        &stage_exit_counts(&segments, players),
    )?;
    write_table(
        &table(PERSONAL_EXIT_COUNTS),
        PLAYER_EXIT_HEADER,
        &player_stage_exit_counts(&segments, players),
    )?;
    write_table(
        &table(PERSONAL_FIRST_CLEAR_STARS),
        FIRST_CLEAR_STAR_HEADER,
        &first_clear_stars(&segments, players),
    )?;
    write_table(
        &table(FIRST_GRAB_TOP3),
        FIRST_GRAB_HEADER,
        &first_grab_rows(&events, &segments, options),
    )?;

    tracing::info!(
        out_dir = %out_dir.display(),
        segments = segments.len(),
        "report generated"
    );
    Ok([
        GLOBAL_STAGE_MEANS,
        GLOBAL_EXIT_COUNTS,
        PERSONAL_EXIT_COUNTS,
        PERSONAL_FIRST_CLEAR_STARS,
        FIRST_GRAB_TOP3,
    ]
    .into_iter()
    .map(table)
    .collect())
}

pub fn run<W: Write>(
    writer: &mut W,
    cache: &LogCache,
    out_dir: &Path,
    options: &ReportOptions,
) -> Result<()> {
    let written = generate(cache, out_dir, options)?;
    writeln!(writer, "Saved to {}", out_dir.display())?;
    for path in written {
        if let Some(name) = path.file_name() {
            writeln!(writer, "  {}", name.to_string_lossy())?;
        }
    }
    Ok(())
}
