//! Core domain logic for playlog.
//!
//! This crate contains the fundamental types and logic for:
//! - Segmentation: cutting a player's event log into stage attempts
//! - Finalization: timing, retry, camera and grab metrics per attempt
//! - Selection: policy-driven choice of one attempt, first-grab rankings
//! - Aggregation: per-stage and per-player summaries
//!
//! Everything here is a pure computation over an in-memory event table.

mod aggregate;
pub mod event;
pub mod event_type;
mod finalize;
pub mod segment;
pub mod select;

#[cfg(test)]
mod testing;

pub use aggregate::{
    FirstClearStar, PlayerStageExitCount, StageExitCount, StageSummary, first_clear_stars,
    player_stage_exit_counts, stage_exit_counts, stage_means,
};
pub use event::{Event, LogEvent, ROOT_OBJECT, is_root_object, normalize_stage};
pub use event_type::EventKind;
pub use finalize::{Segment, count_grab_pairs, finalize};
pub use segment::{
    Boundary, CloseReason, SegmentConfig, segment, segment_all, segment_boundaries,
};
pub use select::{
    GrabRank, Policy, SegmentView, TOP_GRAB_COUNT, UnknownPolicy, dedup_by_stage,
    first_grabs_for_stage, player_selected, select, top_distinct_grabs,
};
