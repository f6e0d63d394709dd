//! Stage attempt segmentation.
//!
//! Scans one player's chronologically ordered events and cuts them into
//! stage attempts ("segments").
//!
//! # State Machine
//!
//! | State    | Event                       | Result                                      |
//! |----------|-----------------------------|---------------------------------------------|
//! | `Idle`   | `StageBegin`                | open a segment, go `Active`                 |
//! | `Active` | `StageBegin`                | close as superseded, open a new segment     |
//! | `Active` | `StageClear` (same stage)   | close as cleared, go `Idle`                 |
//! | `Active` | `StageExit`                 | close as exited, go `Idle`                  |
//! | `Active` | `StageRetry`                | remember the retry index                    |
//! | `Active` | end of stream               | close at the last event                     |
//!
//! Every other event is ignored by the scan and only counted when the segment
//! is finalized.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::event::{LogEvent, normalize_stage};
use crate::event_type::EventKind;
use crate::finalize::{Segment, finalize};

/// Configuration for segment finalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SegmentConfig {
    /// Count a grab that is never released before the window ends as one
    /// completed grab pair.
    /// Default: true.
    pub count_orphan_grabs: bool,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            count_orphan_grabs: true,
        }
    }
}

/// How a segment was closed.
///
/// Only [`CloseReason::Exited`] is a player decision; `Superseded` and
/// `EndOfStream` are artifacts of how the log was cut. All three count toward
/// `exit_cnt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    /// A matching `StageClear` was observed.
    Cleared,
    /// A `StageExit` was observed.
    Exited,
    /// A new `StageBegin` arrived while the segment was open.
    Superseded,
    /// The event stream ended while the segment was open.
    EndOfStream,
}

impl CloseReason {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Cleared => "cleared",
            Self::Exited => "exited",
            Self::Superseded => "superseded",
            Self::EndOfStream => "end_of_stream",
        }
    }

    #[must_use]
    pub const fn is_cleared(&self) -> bool {
        matches!(self, Self::Cleared)
    }
}

impl std::fmt::Display for CloseReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The currently open attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSegment {
    pub player_id: String,
    /// Normalized stage name.
    pub stage: String,
    /// Index of the opening `StageBegin`.
    pub start_idx: usize,
    pub t_begin: DateTime<Utc>,
    /// Index of the most recent `StageRetry`, if any.
    pub last_retry_idx: Option<usize>,
}

impl OpenSegment {
    fn open<E: LogEvent>(idx: usize, event: &E) -> Self {
        Self {
            player_id: event.player_id().to_string(),
            stage: normalize_stage(event.value()),
            start_idx: idx,
            t_begin: event.timestamp(),
            last_retry_idx: None,
        }
    }

    fn close(self, end_idx: usize, t_end: DateTime<Utc>, close: CloseReason) -> Boundary {
        Boundary {
            player_id: self.player_id,
            stage: self.stage,
            start_idx: self.start_idx,
            end_idx,
            t_begin: self.t_begin,
            t_end,
            close,
            last_retry_idx: self.last_retry_idx,
        }
    }
}

/// Scan state between two events.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScanState {
    /// No open segment.
    #[default]
    Idle,
    /// One open segment.
    Active(OpenSegment),
}

/// A closed segment before metrics are computed.
///
/// The window `[start_idx, end_idx]` indexes into the player's event slice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Boundary {
    pub player_id: String,
    pub stage: String,
    pub start_idx: usize,
    pub end_idx: usize,
    pub t_begin: DateTime<Utc>,
    pub t_end: DateTime<Utc>,
    pub close: CloseReason,
    pub last_retry_idx: Option<usize>,
}

impl Boundary {
    pub const fn cleared(&self) -> bool {
        self.close.is_cleared()
    }
}

/// Result of feeding one event to the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: ScanState,
    pub closed: Option<Boundary>,
}

impl Transition {
    const fn stay(next: ScanState) -> Self {
        Self { next, closed: None }
    }
}

/// Applies one event to the scan state.
pub fn transition<E: LogEvent>(state: ScanState, idx: usize, event: &E) -> Transition {
    match (state, event.kind()) {
        (ScanState::Idle, EventKind::StageBegin) => {
            Transition::stay(ScanState::Active(OpenSegment::open(idx, event)))
        }
        (ScanState::Idle, _) => Transition::stay(ScanState::Idle),
        (ScanState::Active(open), EventKind::StageBegin) => {
            // The superseded window stops before the new begin; only t_end reaches it.
            let end_idx = idx.saturating_sub(1).max(open.start_idx);
            let closed = open.close(end_idx, event.timestamp(), CloseReason::Superseded);
            Transition {
                next: ScanState::Active(OpenSegment::open(idx, event)),
                closed: Some(closed),
            }
        }
        (ScanState::Active(open), EventKind::StageClear)
            if normalize_stage(event.value()) == open.stage =>
        {
            Transition {
                next: ScanState::Idle,
                closed: Some(open.close(idx, event.timestamp(), CloseReason::Cleared)),
            }
        }
        (ScanState::Active(open), EventKind::StageExit) => Transition {
            next: ScanState::Idle,
            closed: Some(open.close(idx, event.timestamp(), CloseReason::Exited)),
        },
        (ScanState::Active(mut open), EventKind::StageRetry) => {
            open.last_retry_idx = Some(idx);
            Transition::stay(ScanState::Active(open))
        }
        (state @ ScanState::Active(_), _) => Transition::stay(state),
    }
}

/// Closes a segment still open when the stream ends.
pub fn finish<E: LogEvent>(state: ScanState, events: &[E]) -> Option<Boundary> {
    let ScanState::Active(open) = state else {
        return None;
    };
    let last = events.last()?;
    Some(open.close(
        events.len() - 1,
        last.timestamp(),
        CloseReason::EndOfStream,
    ))
}

/// Cuts one player's events into segment boundaries.
///
/// Events must be sorted by timestamp ascending.
pub fn segment_boundaries<E: LogEvent>(events: &[E]) -> Vec<Boundary> {
    let mut boundaries = Vec::new();
    let state = events
        .iter()
        .enumerate()
        .fold(ScanState::Idle, |state, (idx, event)| {
            let Transition { next, closed } = transition(state, idx, event);
            boundaries.extend(closed);
            next
        });
    boundaries.extend(finish(state, events));
    boundaries
}

/// Segments one player's events and computes every segment's metrics.
///
/// Events must be sorted by timestamp ascending.
pub fn segment<E: LogEvent>(events: &[E], config: &SegmentConfig) -> Vec<Segment> {
    let segments: Vec<Segment> = segment_boundaries(events)
        .iter()
        .map(|boundary| finalize(boundary, events, config))
        .collect();

    tracing::debug!(
        event_count = events.len(),
        segment_count = segments.len(),
        "segmented event stream"
    );
    segments
}

/// Segments a table holding events of several players.
///
/// Events are grouped by player, stable-sorted by timestamp and segmented per
/// player in parallel. Output is ordered by player, then by `t_begin`.
pub fn segment_all<E: LogEvent + Sync>(events: &[E], config: &SegmentConfig) -> Vec<Segment> {
    let mut by_player: BTreeMap<&str, Vec<&E>> = BTreeMap::new();
    for event in events {
        by_player.entry(event.player_id()).or_default().push(event);
    }

    let tables: Vec<Vec<&E>> = by_player
        .into_values()
        .map(|mut rows| {
            rows.sort_by_key(|e| e.timestamp());
            rows
        })
        .collect();

    let per_player: Vec<Vec<Segment>> = tables
        .par_iter()
        .map(|rows| segment(rows, config))
        .collect();

    per_player.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::Event;
    use crate::testing::{ev, ev_for, ts};

    fn run(events: &[Event]) -> Vec<Segment> {
        segment(events, &SegmentConfig::default())
    }

    #[test]
    fn empty_stream_has_no_segments() {
        assert!(run(&[]).is_empty());
        assert!(segment_boundaries::<Event>(&[]).is_empty());
    }

    #[test]
    fn events_before_any_begin_are_ignored() {
        let events = vec![
            ev(0, "StageClear", "A"),
            ev(1, "StageExit", ""),
            ev(2, "StageRetry", ""),
            ev(3, "InputGrab", "box"),
        ];
        assert!(run(&events).is_empty());
    }

    // Scenario: retry inside a cleared attempt
    #[test]
    fn cleared_attempt_with_retry() {
        let events = vec![
            ev(0, "StageBegin", "A"),
            ev(5, "StageRetry", ""),
            ev(10, "StageClear", "A"),
        ];

        let segments = run(&events);
        assert_eq!(segments.len(), 1);
        let seg = &segments[0];
        assert_eq!(seg.stage, "a");
        assert!(seg.cleared);
        assert_eq!(seg.close_reason, CloseReason::Cleared);
        assert!((seg.total_time - 10.0).abs() < f64::EPSILON);
        assert_eq!(seg.stage_play_time, Some(10.0));
        assert_eq!(seg.clear_time, Some(5.0));
        assert_eq!(seg.retry_cnt, 1);
        assert_eq!(seg.exit_cnt, 0);
    }

    // Scenario: explicit exit
    #[test]
    fn exited_attempt() {
        let events = vec![ev(0, "StageBegin", "A"), ev(3, "StageExit", "")];

        let segments = run(&events);
        assert_eq!(segments.len(), 1);
        let seg = &segments[0];
        assert!(!seg.cleared);
        assert_eq!(seg.close_reason, CloseReason::Exited);
        assert!((seg.total_time - 3.0).abs() < f64::EPSILON);
        assert_eq!(seg.stage_play_time, None);
        assert_eq!(seg.clear_time, None);
        assert_eq!(seg.exit_cnt, 1);
    }

    // Scenario: begin while another attempt is open, then end of stream
    #[test]
    fn begin_supersedes_open_attempt() {
        let events = vec![ev(0, "StageBegin", "A"), ev(4, "StageBegin", "B")];

        let boundaries = segment_boundaries(&events);
        assert_eq!(boundaries.len(), 2);
        assert_eq!(boundaries[0].close, CloseReason::Superseded);
        assert_eq!(boundaries[0].end_idx, 0);
        assert_eq!(boundaries[0].t_end, ts(4));
        assert_eq!(boundaries[1].close, CloseReason::EndOfStream);
        assert_eq!(boundaries[1].start_idx, 1);
        assert_eq!(boundaries[1].end_idx, 1);
        assert_eq!(boundaries[1].t_end, ts(4));

        let segments = run(&events);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].stage, "a");
        assert_eq!(segments[1].stage, "b");
        for seg in &segments {
            assert!(!seg.cleared);
            assert_eq!(seg.t_end, ts(4));
            assert_eq!(seg.exit_cnt, 1);
        }
    }

    #[test]
    fn superseded_window_excludes_new_begin_events() {
        let events = vec![
            ev(0, "StageBegin", "A"),
            ev(1, "CameraZoom", ""),
            ev(2, "StageBegin", "B"),
            ev(3, "CameraZoom", ""),
            ev(4, "CameraZoom", ""),
            ev(5, "StageClear", "B"),
        ];

        let segments = run(&events);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].cam_move_cnt, 1);
        assert_eq!(segments[1].cam_move_cnt, 2);
        assert!(segments[1].cleared);
    }

    #[test]
    fn clear_for_other_stage_is_ignored() {
        let events = vec![
            ev(0, "StageBegin", "Forest"),
            ev(2, "StageClear", "Desert"),
            ev(6, "StageClear", "\u{a0}FOREST "),
        ];

        let segments = run(&events);
        assert_eq!(segments.len(), 1);
        assert!(segments[0].cleared);
        assert_eq!(segments[0].t_end, ts(6));
    }

    #[test]
    fn mismatched_clear_leaves_segment_open_until_stream_end() {
        let events = vec![
            ev(0, "StageBegin", "A"),
            ev(2, "StageClear", "B"),
            ev(7, "CameraRotate", ""),
        ];

        let segments = run(&events);
        assert_eq!(segments.len(), 1);
        assert_eq!(segments[0].close_reason, CloseReason::EndOfStream);
        assert_eq!(segments[0].t_end, ts(7));
        assert_eq!(segments[0].cam_rotate_cnt, 1);
    }

    #[test]
    fn idle_between_attempts_drops_stray_events() {
        let events = vec![
            ev(0, "StageBegin", "A"),
            ev(1, "StageExit", ""),
            ev(2, "CameraZoom", ""),
            ev(3, "StageBegin", "A"),
            ev(4, "CameraZoom", ""),
            ev(5, "StageClear", "A"),
        ];

        let segments = run(&events);
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].cam_move_cnt, 0);
        assert_eq!(segments[1].cam_move_cnt, 1);
    }

    #[test]
    fn retry_updates_state_without_closing() {
        let state = ScanState::Active(OpenSegment {
            player_id: "p1".to_string(),
            stage: "a".to_string(),
            start_idx: 0,
            t_begin: ts(0),
            last_retry_idx: None,
        });

        let Transition { next, closed } = transition(state, 3, &ev(3, "StageRetry", ""));
        assert!(closed.is_none());
        let ScanState::Active(open) = next else {
            panic!("retry should keep the segment open");
        };
        assert_eq!(open.last_retry_idx, Some(3));
    }

    #[test]
    fn other_events_do_not_change_state() {
        let state = ScanState::Active(OpenSegment {
            player_id: "p1".to_string(),
            stage: "a".to_string(),
            start_idx: 0,
            t_begin: ts(0),
            last_retry_idx: Some(1),
        });

        let result = transition(state.clone(), 2, &ev(2, "Whatever", "x"));
        assert_eq!(result.next, state);
        assert!(result.closed.is_none());
    }

    #[test]
    fn finish_on_idle_is_none() {
        assert!(finish::<Event>(ScanState::Idle, &[ev(0, "StageExit", "")]).is_none());
    }

    #[test]
    fn windows_do_not_overlap_and_are_ordered() {
        let events = vec![
            ev(0, "StageBegin", "A"),
            ev(1, "InputGrab", "x"),
            ev(2, "StageBegin", "A"),
            ev(3, "StageRetry", ""),
            ev(4, "StageExit", ""),
            ev(5, "CameraZoom", ""),
            ev(6, "StageBegin", "B"),
            ev(7, "StageClear", "B"),
            ev(8, "StageBegin", "C"),
            ev(9, "InputGrabBreak", ""),
        ];

        let boundaries = segment_boundaries(&events);
        assert_eq!(boundaries.len(), 4);
        for pair in boundaries.windows(2) {
            assert!(pair[0].end_idx < pair[1].start_idx);
            assert!(pair[0].t_begin <= pair[1].t_begin);
        }
        for b in &boundaries {
            assert!(b.start_idx <= b.end_idx);
            assert!(b.t_end >= b.t_begin);
        }
    }

    #[test]
    fn timing_fields_follow_clear_state() {
        let events = vec![
            ev(0, "StageBegin", "A"),
            ev(2, "StageExit", ""),
            ev(3, "StageBegin", "A"),
            ev(9, "StageClear", "A"),
            ev(10, "StageBegin", "B"),
            ev(12, "StageBegin", "C"),
        ];

        for seg in run(&events) {
            assert!(seg.t_end >= seg.t_begin);
            if seg.cleared {
                assert!(seg.stage_play_time.is_some());
                assert!(seg.clear_time.is_some());
            } else {
                assert!(seg.stage_play_time.is_none());
                assert!(seg.clear_time.is_none());
            }
        }
    }

    #[test]
    fn player_id_comes_from_begin_event() {
        let events = vec![
            ev_for("alice", 0, "StageBegin", "A"),
            ev_for("alice", 1, "StageClear", "A"),
        ];
        assert_eq!(run(&events)[0].player_id, "alice");
    }

    #[test]
    fn segment_all_groups_and_sorts_by_player() {
        let events = vec![
            ev_for("bob", 5, "StageClear", "A"),
            ev_for("alice", 0, "StageBegin", "A"),
            ev_for("bob", 0, "StageBegin", "A"),
            ev_for("alice", 3, "StageExit", ""),
        ];

        let segments = segment_all(&events, &SegmentConfig::default());
        assert_eq!(segments.len(), 2);
        assert_eq!(segments[0].player_id, "alice");
        assert!(!segments[0].cleared);
        assert_eq!(segments[1].player_id, "bob");
        assert!(segments[1].cleared);
        assert!((segments[1].total_time - 5.0).abs() < f64::EPSILON);
    }

    #[test]
    fn segment_all_sort_is_stable_for_equal_timestamps() {
        // Same instant: begin precedes clear in input order and must stay so.
        let events = vec![
            ev_for("p1", 1, "StageBegin", "A"),
            ev_for("p1", 1, "StageClear", "A"),
        ];
        let segments = segment_all(&events, &SegmentConfig::default());
        assert_eq!(segments.len(), 1);
        assert!(segments[0].cleared);
        assert!(segments[0].total_time.abs() < f64::EPSILON);
    }

    #[test]
    fn close_reason_names() {
        assert_eq!(CloseReason::EndOfStream.to_string(), "end_of_stream");
        let json = serde_json::to_string(&CloseReason::Superseded).unwrap();
        assert_eq!(json, r#""superseded""#);
    }
}
