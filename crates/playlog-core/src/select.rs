//! Policy-driven selection across segments and grab events.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::{LogEvent, is_root_object, normalize_stage};
use crate::event_type::EventKind;
use crate::finalize::{Segment, seconds_between};
use crate::segment::{SegmentConfig, segment_all};

/// Maximum number of distinct grabbed objects ranked per segment.
pub const TOP_GRAB_COUNT: usize = 3;

/// Error type for unknown policy names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown selection policy: {0}")]
pub struct UnknownPolicy(pub String);

/// Rule for picking one representative segment among several attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Policy {
    /// The attempt that ended first.
    Earliest,
    /// The attempt that ended last.
    #[default]
    Latest,
    /// The cleared attempt with the smallest clear time; falls back to
    /// `Latest` when nothing was cleared.
    ShortestClear,
}

impl Policy {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Earliest => "earliest",
            Self::Latest => "latest",
            Self::ShortestClear => "shortest_clear",
        }
    }

    /// Parses a policy name, falling back to [`Policy::Latest`] for unknown names.
    pub fn from_name(name: &str) -> Self {
        name.parse().unwrap_or_else(|err: UnknownPolicy| {
            tracing::warn!(%err, "falling back to latest policy");
            Self::Latest
        })
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Policy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "earliest" => Ok(Self::Earliest),
            "latest" => Ok(Self::Latest),
            "shortest_clear" => Ok(Self::ShortestClear),
            other => Err(UnknownPolicy(other.to_string())),
        }
    }
}

/// One ranked entry of the first-distinct-grabs table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrabRank {
    /// 1-based rank in grab order.
    pub rank: usize,
    pub object_name: String,
    pub timestamp: DateTime<Utc>,
    /// Seconds since the segment began.
    pub elapsed_seconds: f64,
    pub player_id: String,
}

/// Returns true if `player_id` is in the selection; an empty selection means everyone.
pub fn player_selected(players: &[String], player_id: &str) -> bool {
    players.is_empty() || players.iter().any(|p| p == player_id)
}

/// Stable candidate order: `(t_end, t_begin, player_id)` ascending.
fn by_close_time(a: &&Segment, b: &&Segment) -> Ordering {
    a.t_end
        .cmp(&b.t_end)
        .then(a.t_begin.cmp(&b.t_begin))
        .then_with(|| a.player_id.cmp(&b.player_id))
}

/// Picks one candidate under `policy`.
///
/// Candidates are stably sorted first, so ties resolve to the earliest
/// position in that order.
fn pick<'a>(candidates: &[&'a Segment], policy: Policy) -> Option<&'a Segment> {
    let mut sorted = candidates.to_vec();
    sorted.sort_by(by_close_time);

    let latest = |sorted: &[&'a Segment]| {
        let max_end = sorted.iter().map(|s| s.t_end).max()?;
        sorted.iter().copied().find(|s| s.t_end == max_end)
    };

    match policy {
        Policy::Earliest => sorted.first().copied(),
        Policy::Latest => latest(&sorted),
        Policy::ShortestClear => sorted
            .iter()
            .copied()
            .filter_map(|s| s.clear_time.filter(|_| s.cleared).map(|t| (s, t)))
            .min_by(|(_, a), (_, b)| a.total_cmp(b))
            .map(|(s, _)| s)
            .or_else(|| latest(&sorted)),
    }
}

/// Selects one representative segment of `stage` among `players`.
///
/// Returns `None` when no segment matches.
pub fn select<'a>(
    segments: &'a [Segment],
    stage: &str,
    players: &[String],
    policy: Policy,
) -> Option<&'a Segment> {
    let stage = normalize_stage(stage);
    let candidates: Vec<&Segment> = segments
        .iter()
        .filter(|s| s.stage == stage && player_selected(players, &s.player_id))
        .collect();

    let chosen = pick(&candidates, policy);
    tracing::debug!(
        %stage,
        %policy,
        candidate_count = candidates.len(),
        chosen = ?chosen.map(|s| (&s.player_id, s.t_end)),
        "selected segment"
    );
    chosen
}

/// Ranks the first distinct objects grabbed inside `segment`'s time window.
///
/// Considers only the segment's own player, restricted to `players`, with
/// timestamps in `[t_begin, t_end]`.
pub fn top_distinct_grabs<E: LogEvent>(
    events: &[E],
    segment: &Segment,
    players: &[String],
    exclude_root: bool,
) -> Vec<GrabRank> {
    if !player_selected(players, &segment.player_id) {
        return Vec::new();
    }

    let mut grabs: Vec<&E> = events
        .iter()
        .filter(|e| e.player_id() == segment.player_id)
        .filter(|e| (segment.t_begin..=segment.t_end).contains(&e.timestamp()))
        .filter(|e| *e.kind() == EventKind::InputGrab)
        .filter(|e| !(exclude_root && is_root_object(e.value())))
        .collect();
    grabs.sort_by_key(|e| e.timestamp());

    let mut seen = HashSet::new();
    grabs
        .into_iter()
        .filter(|e| seen.insert((*e).value()))
        .take(TOP_GRAB_COUNT)
        .enumerate()
        .map(|(i, e)| GrabRank {
            rank: i + 1,
            object_name: e.value().to_string(),
            timestamp: e.timestamp(),
            elapsed_seconds: seconds_between(segment.t_begin, e.timestamp()),
            player_id: segment.player_id.clone(),
        })
        .collect()
}

/// Segments a raw multi-player table, selects one attempt at `stage` and
/// ranks its first grabbed objects.
pub fn first_grabs_for_stage<E: LogEvent + Sync>(
    events: &[E],
    stage: &str,
    players: &[String],
    policy: Policy,
    exclude_root: bool,
    config: &SegmentConfig,
) -> Vec<GrabRank> {
    if events.is_empty() || stage.trim().is_empty() {
        return Vec::new();
    }

    let selected: Vec<&E> = events
        .iter()
        .filter(|e| player_selected(players, e.player_id()))
        .collect();
    let segments = segment_all(&selected, config);

    select(&segments, stage, players, policy)
        .map(|seg| top_distinct_grabs(&selected, seg, players, exclude_root))
        .unwrap_or_default()
}

/// Which attempts to keep per stage in a personal view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SegmentView {
    /// Every attempt.
    #[default]
    All,
    /// The attempt that ended last.
    Latest,
    /// The shortest clear, or the latest attempt for stages never cleared.
    BestClear,
    /// The attempt that began first.
    First,
}

impl SegmentView {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Latest => "latest",
            Self::BestClear => "best",
            Self::First => "first",
        }
    }
}

impl fmt::Display for SegmentView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SegmentView {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "all" => Ok(Self::All),
            "latest" => Ok(Self::Latest),
            "best" => Ok(Self::BestClear),
            "first" => Ok(Self::First),
            _ => Err(format!("invalid segment view: {s}")),
        }
    }
}

/// Reduces segments to one representative per stage according to `view`.
///
/// Output is ordered by stage, then `(t_begin, t_end)` for [`SegmentView::All`].
pub fn dedup_by_stage(segments: &[Segment], view: SegmentView) -> Vec<&Segment> {
    let mut by_stage: BTreeMap<&str, Vec<&Segment>> = BTreeMap::new();
    for seg in segments {
        by_stage.entry(seg.stage.as_str()).or_default().push(seg);
    }

    by_stage
        .into_values()
        .flat_map(|mut group| {
            group.sort_by(|a, b| a.t_begin.cmp(&b.t_begin).then(a.t_end.cmp(&b.t_end)));
            match view {
                SegmentView::All => group,
                SegmentView::Latest => pick(&group, Policy::Latest).into_iter().collect(),
                SegmentView::BestClear => {
                    pick(&group, Policy::ShortestClear).into_iter().collect()
                }
                SegmentView::First => group.first().copied().into_iter().collect(),
            }
        })
        .collect()
}
