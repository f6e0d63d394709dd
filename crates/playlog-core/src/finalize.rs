//! Segment finalization: derived metrics over a closed segment's window.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event::{LogEvent, is_root_object};
use crate::event_type::EventKind;
use crate::segment::{Boundary, CloseReason, SegmentConfig};

/// A finalized stage attempt.
///
/// Times are in fractional seconds. Counts cover only the events inside the
/// segment's own window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub player_id: String,
    /// Normalized stage name.
    pub stage: String,
    pub t_begin: DateTime<Utc>,
    pub t_end: DateTime<Utc>,
    pub cleared: bool,
    pub close_reason: CloseReason,

    /// `t_end - t_begin`, whatever the outcome.
    pub total_time: f64,
    /// Same as `total_time`, only for cleared attempts.
    pub stage_play_time: Option<f64>,
    /// Time from the last retry (or from the begin) to the clear.
    pub clear_time: Option<f64>,

    pub retry_cnt: usize,
    /// 1 for every attempt that was not cleared.
    pub exit_cnt: usize,

    pub first_star: Option<f64>,
    pub final_star: Option<f64>,

    /// `CameraZoom` count.
    pub cam_move_cnt: usize,
    pub cam_rotate_cnt: usize,
    pub cam_pan_cnt: usize,
    pub cam_total_cnt: usize,

    pub grab_pair_cnt: usize,
    pub pushpull_cnt: usize,
    /// First grabbed object other than the scene root.
    pub first_grab_object: Option<String>,
}

/// Computes all derived metrics of a closed segment.
///
/// `events` is the same slice the boundary was cut from.
pub fn finalize<E: LogEvent>(boundary: &Boundary, events: &[E], config: &SegmentConfig) -> Segment {
    let window = events
        .get(boundary.start_idx..=boundary.end_idx)
        .unwrap_or_default();
    let cleared = boundary.cleared();

    let total_time = seconds_between(boundary.t_begin, boundary.t_end);
    let stage_play_time = cleared.then_some(total_time);
    let clear_time = cleared.then(|| {
        boundary
            .last_retry_idx
            .and_then(|idx| events.get(idx))
            .map_or(total_time, |retry| {
                seconds_between(retry.timestamp(), boundary.t_end)
            })
    });

    let count = |kind: EventKind| window.iter().filter(|e| *e.kind() == kind).count();

    let mut stars = window
        .iter()
        .filter(|e| *e.kind() == EventKind::StageStar)
        .filter_map(|e| parse_star(e.value()));
    let first_star = stars.next();
    let final_star = stars.last().or(first_star);

    let cam_move_cnt = count(EventKind::CameraZoom);
    let cam_rotate_cnt = count(EventKind::CameraRotate);
    let cam_pan_cnt = count(EventKind::CameraPanning);

    let grab_kinds = window
        .iter()
        .map(LogEvent::kind)
        .filter(|k| matches!(k, EventKind::InputGrab | EventKind::InputGrabBreak));

    let first_grab_object = window
        .iter()
        .find(|e| *e.kind() == EventKind::InputGrab && !is_root_object(e.value()))
        .map(|e| e.value().to_string());

    Segment {
        player_id: boundary.player_id.clone(),
        stage: boundary.stage.clone(),
        t_begin: boundary.t_begin,
        t_end: boundary.t_end,
        cleared,
        close_reason: boundary.close,
        total_time,
        stage_play_time,
        clear_time,
        retry_cnt: count(EventKind::StageRetry),
        exit_cnt: usize::from(!cleared),
        first_star,
        final_star,
        cam_move_cnt,
        cam_rotate_cnt,
        cam_pan_cnt,
        cam_total_cnt: window.iter().filter(|e| e.kind().is_camera()).count(),
        grab_pair_cnt: count_grab_pairs(grab_kinds, config.count_orphan_grabs),
        pushpull_cnt: count(EventKind::InputPushPull),
        first_grab_object,
    }
}

/// Counts grab/release pairs over time-ordered grab events.
///
/// Each `InputGrab` opens a grab; each `InputGrabBreak` closes one if any is
/// open and is dropped otherwise. Grabs still open at the end count as pairs
/// when `count_orphans` is set.
pub fn count_grab_pairs<'a, I>(kinds: I, count_orphans: bool) -> usize
where
    I: IntoIterator<Item = &'a EventKind>,
{
    let mut open: usize = 0;
    let mut pairs: usize = 0;

    for kind in kinds {
        match kind {
            EventKind::InputGrab => open += 1,
            EventKind::InputGrabBreak if open > 0 => {
                open -= 1;
                pairs += 1;
            }
            _ => {}
        }
    }

    if count_orphans {
        pairs += open;
    }
    pairs
}

/// Parses a star payload; anything that is not a number counts as absent.
fn parse_star(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| !v.is_nan())
}

/// Fractional seconds from `start` to `end`.
#[allow(clippy::cast_precision_loss)]
pub(crate) fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    let delta = end - start;
    delta.num_seconds() as f64 + f64::from(delta.subsec_nanos()) / 1_000_000_000.0
}
