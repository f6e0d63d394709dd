//! Shared fixtures for unit tests.

use chrono::{DateTime, Duration, TimeZone, Utc};

use crate::event::Event;

/// Test timestamp `secs` seconds after a fixed origin.
pub fn ts(secs: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 10, 0, 0)
        .single()
        .expect("valid test timestamp")
        + Duration::seconds(secs)
}

/// Test timestamp with millisecond precision.
pub fn ts_ms(millis: i64) -> DateTime<Utc> {
    ts(0) + Duration::milliseconds(millis)
}

/// Event for the default test player.
pub fn ev(secs: i64, kind: &str, value: &str) -> Event {
    ev_for("p1", secs, kind, value)
}

pub fn ev_for(player: &str, secs: i64, kind: &str, value: &str) -> Event {
    Event::new(ts(secs), kind, value, player)
}
