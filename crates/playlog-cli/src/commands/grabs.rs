//! Grabs command ranking the first objects grabbed during a stage.

use std::io::Write;

use anyhow::Result;
use playlog_core::{Policy, SegmentConfig, first_grabs_for_stage};
use playlog_ingest::LogCache;

/// Options for ranking grabs.
#[derive(Debug, Clone)]
pub struct GrabsOptions<'a> {
    pub stage: &'a str,
    pub players: &'a [String],
    pub policy: Policy,
    pub exclude_root: bool,
    pub segment_config: SegmentConfig,
}

pub fn run<W: Write>(
    writer: &mut W,
    cache: &LogCache,
    options: &GrabsOptions<'_>,
    json: bool,
) -> Result<()> {
    let events = cache.all_events();
    let ranks = first_grabs_for_stage(
        &events,
        options.stage,
        options.players,
        options.policy,
        options.exclude_root,
        &options.segment_config,
    );

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&ranks)?)?;
        return Ok(());
    }

    let Some(first) = ranks.first() else {
        writeln!(writer, "No grabs recorded for stage '{}'.", options.stage)?;
        return Ok(());
    };

    writeln!(
        writer,
        "First grabs in '{}' by {} ({} policy)",
        options.stage, first.player_id, options.policy
    )?;
    for grab in &ranks {
        writeln!(
            writer,
            "{}. {:<12} +{:.1}s",
            grab.rank, grab.object_name, grab.elapsed_seconds
        )?;
    }
    Ok(())
}
