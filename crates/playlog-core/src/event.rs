//! Parsed log events, one row of a player's event table.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::event_type::EventKind;

/// Payload of a grab event that targets the scene root rather than an object.
pub const ROOT_OBJECT: &str = "root";

/// A single game log event, already parsed and normalized by ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// The event kind, parsed from the log's event name.
    pub kind: EventKind,
    /// Raw payload text (stage name, star value, object name, ...).
    #[serde(default)]
    pub value: String,
    /// The player whose log this event came from.
    pub player_id: String,
}

impl Event {
    pub fn new(
        timestamp: DateTime<Utc>,
        kind: impl Into<EventKind>,
        value: impl Into<String>,
        player_id: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            kind: kind.into(),
            value: value.into(),
            player_id: player_id.into(),
        }
    }
}

/// An event suitable for segmentation.
///
/// This trait allows the scan to work with different event representations
/// (e.g., rows loaded by playlog-ingest, or test fixtures).
pub trait LogEvent {
    /// Returns the event's timestamp.
    fn timestamp(&self) -> DateTime<Utc>;

    /// Returns the event's kind.
    fn kind(&self) -> &EventKind;

    /// Returns the raw payload.
    fn value(&self) -> &str;

    /// Returns the owning player.
    fn player_id(&self) -> &str;
}

impl LogEvent for Event {
    fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    fn kind(&self) -> &EventKind {
        &self.kind
    }

    fn value(&self) -> &str {
        &self.value
    }

    fn player_id(&self) -> &str {
        &self.player_id
    }
}

impl<T: LogEvent + ?Sized> LogEvent for &T {
    fn timestamp(&self) -> DateTime<Utc> {
        (**self).timestamp()
    }

    fn kind(&self) -> &EventKind {
        (**self).kind()
    }

    fn value(&self) -> &str {
        (**self).value()
    }

    fn player_id(&self) -> &str {
        (**self).player_id()
    }
}

/// Normalizes a stage label for comparison.
///
/// Every whitespace character (NBSP included) becomes a plain space, then the
/// result is trimmed and lower-cased.
pub fn normalize_stage(name: &str) -> String {
    let folded: String = name
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .collect();
    folded.trim().to_lowercase()
}

/// Returns true if a grab payload names the scene root.
pub fn is_root_object(value: &str) -> bool {
    value.trim().to_lowercase() == ROOT_OBJECT
}
