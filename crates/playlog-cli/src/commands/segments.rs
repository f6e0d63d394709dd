//! Segments command listing finalized stage attempts per player.

use std::io::Write;

use anyhow::Result;
use playlog_core::{SegmentView, dedup_by_stage, player_selected};
use playlog_ingest::LogCache;

use super::util::format_optional;

pub fn run<W: Write>(
    writer: &mut W,
    cache: &LogCache,
    players: &[String],
    view: SegmentView,
    json: bool,
) -> Result<()> {
    let segments: Vec<_> = cache
        .players()
        .into_iter()
        .filter(|player| player_selected(players, player))
        .filter_map(|player| cache.player_segments(player))
        .flat_map(|segments| dedup_by_stage(segments, view))
        .collect();
    tracing::debug!(%view, count = segments.len(), "listing segments");

    if json {
        for seg in segments {
            writeln!(writer, "{}", serde_json::to_string(seg)?)?;
        }
        return Ok(());
    }

    if segments.is_empty() {
        writeln!(writer, "No segments found.")?;
        return Ok(());
    }

    writeln!(
        writer,
        "{:<10} {:<12} {:<12} {:>8} {:>8} {:>5} {:>5} {:>4} {:>4}",
        "PLAYER", "STAGE", "OUTCOME", "TOTAL", "CLEAR", "RETRY", "STAR", "CAM", "GRAB"
    )?;
    for seg in segments {
        writeln!(
            writer,
            "{:<10} {:<12} {:<12} {:>8.1} {:>8} {:>5} {:>5} {:>4} {:>4}",
            seg.player_id,
            seg.stage,
            seg.close_reason.as_str(),
            seg.total_time,
            format_optional(seg.clear_time),
            seg.retry_cnt,
            format_optional(seg.final_star),
            seg.cam_total_cnt,
            seg.grab_pair_cnt,
        )?;
    }
    Ok(())
}
