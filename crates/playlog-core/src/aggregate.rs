//! Per-stage and per-player summaries over finalized segments.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::finalize::Segment;
use crate::select::player_selected;

/// Per-stage means across all attempts.
///
/// A mean is `None` only when no attempt defines the field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageSummary {
    pub stage: String,
    pub n_players_used: usize,
    pub mean_stage_play_time: Option<f64>,
    pub mean_clear_time: Option<f64>,
    /// Mean over players of the star earned on their first clear.
    pub mean_first_clear_star: Option<f64>,
    pub mean_retry: Option<f64>,
    pub mean_cam_move: Option<f64>,
    pub mean_cam_rotate: Option<f64>,
    pub mean_cam_pan: Option<f64>,
    pub mean_cam_total: Option<f64>,
    pub mean_grab_pair: Option<f64>,
    pub mean_pushpull: Option<f64>,
}

/// Star earned by a player on their first clear of a stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FirstClearStar {
    pub player_id: String,
    pub stage: String,
    pub first_clear_star: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageExitCount {
    pub stage: String,
    pub exit_sum: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStageExitCount {
    pub player_id: String,
    pub stage: String,
    pub exit_sum: usize,
}

/// Arithmetic mean, or `None` for an empty input.
#[allow(clippy::cast_precision_loss)]
fn mean(values: impl IntoIterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values
        .into_iter()
        .fold((0.0, 0usize), |(sum, n), v| (sum + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

#[allow(clippy::cast_precision_loss)]
fn mean_count(group: &[&Segment], field: impl Fn(&Segment) -> usize) -> Option<f64> {
    mean(group.iter().map(|s| field(s) as f64))
}

fn group_by_stage<'a>(
    segments: impl IntoIterator<Item = &'a Segment>,
) -> BTreeMap<&'a str, Vec<&'a Segment>> {
    let mut groups: BTreeMap<&str, Vec<&Segment>> = BTreeMap::new();
    for seg in segments {
        groups.entry(seg.stage.as_str()).or_default().push(seg);
    }
    groups
}

/// Computes per-stage means, ordered by stage.
pub fn stage_means(segments: &[Segment]) -> Vec<StageSummary> {
    let mut first_clear_by_stage: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    for first in first_clear_stars(segments, &[]) {
        first_clear_by_stage
            .entry(first.stage)
            .or_default()
            .push(first.first_clear_star);
    }

    group_by_stage(segments)
        .into_iter()
        .map(|(stage, group)| {
            let players: BTreeSet<&str> = group.iter().map(|s| s.player_id.as_str()).collect();
            StageSummary {
                stage: stage.to_string(),
                n_players_used: players.len(),
                mean_stage_play_time: mean(group.iter().filter_map(|s| s.stage_play_time)),
                mean_clear_time: mean(group.iter().filter_map(|s| s.clear_time)),
                mean_first_clear_star: first_clear_by_stage
                    .get(stage)
                    .and_then(|stars| mean(stars.iter().copied())),
                mean_retry: mean_count(&group, |s| s.retry_cnt),
                mean_cam_move: mean_count(&group, |s| s.cam_move_cnt),
                mean_cam_rotate: mean_count(&group, |s| s.cam_rotate_cnt),
                mean_cam_pan: mean_count(&group, |s| s.cam_pan_cnt),
                mean_cam_total: mean_count(&group, |s| s.cam_total_cnt),
                mean_grab_pair: mean_count(&group, |s| s.grab_pair_cnt),
                mean_pushpull: mean_count(&group, |s| s.pushpull_cnt),
            }
        })
        .collect()
}

/// Star of each player's chronologically first clear per stage.
///
/// Only cleared attempts with a star value qualify. Ordered by player, then stage.
pub fn first_clear_stars(segments: &[Segment], players: &[String]) -> Vec<FirstClearStar> {
    let mut cleared: Vec<&Segment> = segments
        .iter()
        .filter(|s| player_selected(players, &s.player_id))
        .filter(|s| s.cleared && s.first_star.is_some())
        .collect();
    cleared.sort_by(|a, b| {
        (&a.player_id, &a.stage, a.t_end).cmp(&(&b.player_id, &b.stage, b.t_end))
    });

    let mut firsts: BTreeMap<(&str, &str), f64> = BTreeMap::new();
    for seg in cleared {
        if let Some(star) = seg.first_star {
            firsts
                .entry((seg.player_id.as_str(), seg.stage.as_str()))
                .or_insert(star);
        }
    }

    firsts
        .into_iter()
        .map(|((player_id, stage), star)| FirstClearStar {
            player_id: player_id.to_string(),
            stage: stage.to_string(),
            first_clear_star: star,
        })
        .collect()
}

/// Total `exit_cnt` per stage over the selected players.
pub fn stage_exit_counts(segments: &[Segment], players: &[String]) -> Vec<StageExitCount> {
    group_by_stage(
        segments
            .iter()
            .filter(|s| player_selected(players, &s.player_id)),
    )
    .into_iter()
    .map(|(stage, group)| StageExitCount {
        stage: stage.to_string(),
        exit_sum: group.iter().map(|s| s.exit_cnt).sum(),
    })
    .collect()
}

/// Total `exit_cnt` per (player, stage) over the selected players.
pub fn player_stage_exit_counts(
    segments: &[Segment],
    players: &[String],
) -> Vec<PlayerStageExitCount> {
    let mut sums: BTreeMap<(&str, &str), usize> = BTreeMap::new();
    for seg in segments
        .iter()
        .filter(|s| player_selected(players, &s.player_id))
    {
        *sums
            .entry((seg.player_id.as_str(), seg.stage.as_str()))
            .or_default() += seg.exit_cnt;
    }

    sums.into_iter()
        .map(|((player_id, stage), exit_sum)| PlayerStageExitCount {
            player_id: player_id.to_string(),
            stage: stage.to_string(),
            exit_sum,
        })
        .collect()
}
