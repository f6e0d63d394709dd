//! CSV log parsing with header aliasing and timestamp coercion.
//!
//! # Columns
//!
//! | Column    | Accepted headers (case-insensitive)                   | When missing           |
//! |-----------|-------------------------------------------------------|------------------------|
//! | Timestamp | `Timestamp`, `Time`, `시간`, `타임스탬프`, `ts`, `date`, `datetime` | row index seconds |
//! | Event     | `Event`, `이벤트`, `로깅 이벤트`, `로그 이벤트`       | `Key` column           |
//! | Level     | `Level`, `레벨`, `로그 레벨`                          | ignored                |
//! | Key       | `Key`, `키`, `항목`, `이벤트키`                       | empty                  |
//! | Value     | `Value`, `값`, `데이터`, `파라미터`                   | empty                  |
//!
//! # Timestamps
//!
//! Timestamps are read as UTC datetimes. If no row of the column parses as a
//! datetime, the column is read as Unix seconds instead, with unparsable
//! cells mapped to the epoch.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use csv::{Position, StringRecord};
use playlog_core::{Event, EventKind};

use crate::IngestError;

const TIMESTAMP_ALIASES: &[&str] = &["Timestamp", "Time", "시간", "타임스탬프", "ts", "date", "datetime"];
const EVENT_ALIASES: &[&str] = &["Event", "이벤트", "로깅 이벤트", "로그 이벤트"];
const KEY_ALIASES: &[&str] = &["Key", "키", "항목", "이벤트키"];
const VALUE_ALIASES: &[&str] = &["Value", "값", "데이터", "파라미터"];

/// Naive datetime layouts tried after RFC 3339, in order.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y/%m/%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Column positions resolved from the header row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Columns {
    timestamp: Option<usize>,
    event: Option<usize>,
    key: Option<usize>,
    value: Option<usize>,
}

impl Columns {
    fn resolve(headers: &StringRecord) -> Self {
        let names: Vec<&str> = headers.iter().map(clean_cell).collect();
        Self {
            timestamp: find_column(&names, TIMESTAMP_ALIASES),
            event: find_column(&names, EVENT_ALIASES),
            key: find_column(&names, KEY_ALIASES),
            value: find_column(&names, VALUE_ALIASES),
        }
    }
}

/// Finds the first alias present in `names`, exact match first, then case-insensitive.
fn find_column(names: &[&str], aliases: &[&str]) -> Option<usize> {
    aliases.iter().find_map(|alias| {
        names.iter().position(|name| name == alias).or_else(|| {
            let alias = alias.to_lowercase();
            names.iter().position(|name| name.to_lowercase() == alias)
        })
    })
}

/// Trims whitespace and stray quotes around a cell.
fn clean_cell(cell: &str) -> &str {
    cell.trim().trim_matches('"').trim_matches('\'')
}

/// A CSV row reduced to the fields the event table needs.
#[derive(Debug)]
struct RawRow {
    line: u64,
    timestamp: String,
    event: String,
    value: String,
}

/// Parses a datetime cell as UTC.
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
        .map(|naive| naive.and_utc())
}

/// Converts fractional Unix seconds to a UTC timestamp.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
fn from_unix_seconds(secs: f64) -> Option<DateTime<Utc>> {
    let whole = secs.floor();
    let nanos = (((secs - whole) * 1e9).round() as u32).min(999_999_999);
    DateTime::from_timestamp(whole as i64, nanos)
}

/// Resolves every row's timestamp.
///
/// Returns `None` for rows whose cell cannot be read in the column's format.
fn coerce_timestamps(rows: &[RawRow], has_column: bool) -> Vec<Option<DateTime<Utc>>> {
    if !has_column {
        return (0..rows.len())
            .map(|i| i64::try_from(i).ok().and_then(|s| DateTime::from_timestamp(s, 0)))
            .collect();
    }

    let parsed: Vec<_> = rows.iter().map(|r| parse_datetime(&r.timestamp)).collect();
    if parsed.iter().any(Option::is_some) {
        return parsed;
    }

    tracing::debug!("timestamp column is not datetime, reading as unix seconds");
    rows.iter()
        .map(|r| {
            let secs = r.timestamp.parse::<f64>().ok().filter(|s| s.is_finite());
            from_unix_seconds(secs.unwrap_or(0.0))
        })
        .collect()
}

/// Line a record starts on, 0 when the reader reports no position.
fn record_line(position: Option<&Position>) -> u64 {
    position.map_or(0, Position::line)
}

/// Reads the data rows of a CSV log.
///
/// Returns whether a timestamp column exists, and the rows in file order.
/// Malformed records are skipped with a warning.
fn read_rows<R: Read>(reader: R, player_id: &str) -> Result<(bool, Vec<RawRow>), csv::Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .from_reader(reader);

    let headers = rdr.headers()?.clone();
    let columns = Columns::resolve(&headers);
    let event_column = columns.event.or(columns.key);

    let cell = |record: &StringRecord, column: Option<usize>| {
        column
            .and_then(|i| record.get(i))
            .map(clean_cell)
            .unwrap_or_default()
            .to_string()
    };

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = match result {
            Ok(record) if record.len() > headers.len() => {
                let line = record_line(record.position());
                tracing::warn!(player_id, line, "skipping record with extra fields");
                continue;
            }
            Ok(record) => record,
            Err(err) => {
                let line = record_line(err.position());
                tracing::warn!(player_id, line, %err, "skipping malformed record");
                continue;
            }
        };
        rows.push(RawRow {
            line: record_line(record.position()),
            timestamp: cell(&record, columns.timestamp),
            event: cell(&record, event_column),
            value: cell(&record, columns.value),
        });
    }
    Ok((columns.timestamp.is_some(), rows))
}

/// Parses a CSV log into events for `player_id`, stable-sorted by timestamp.
///
/// Malformed records and rows with unreadable timestamps are skipped with a
/// warning; only an unreadable header is an error.
pub fn parse_log<R: Read>(reader: R, player_id: &str) -> Result<Vec<Event>, csv::Error> {
    let (has_timestamp, rows) = read_rows(reader, player_id)?;

    let timestamps = coerce_timestamps(&rows, has_timestamp);
    let mut events: Vec<Event> = rows
        .into_iter()
        .zip(timestamps)
        .filter_map(|(row, timestamp)| {
            let Some(timestamp) = timestamp else {
                tracing::warn!(
                    player_id,
                    line = row.line,
                    timestamp = %row.timestamp,
                    "skipping row with unreadable timestamp"
                );
                return None;
            };
            Some(Event {
                timestamp,
                kind: EventKind::from(row.event.as_str()),
                value: row.value,
                player_id: player_id.to_string(),
            })
        })
        .collect();

    events.sort_by_key(|e| e.timestamp);
    Ok(events)
}

/// Derives a player ID from a log file path (its file stem).
pub fn player_id_from_path(path: &Path) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// Loads one CSV log file.
///
/// Invalid UTF-8 is replaced and a leading byte-order mark is ignored.
/// `player_id` defaults to the file stem.
pub fn load_csv(path: &Path, player_id: Option<&str>) -> Result<Vec<Event>, IngestError> {
    let bytes = fs::read(path).map_err(|source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let text = String::from_utf8_lossy(&bytes);
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);

    let player_id = player_id.map_or_else(|| player_id_from_path(path), str::to_string);
    let events = parse_log(text.as_bytes(), &player_id).map_err(|source| IngestError::Csv {
        path: path.to_path_buf(),
        source,
    })?;

    tracing::debug!(
        path = %path.display(),
        %player_id,
        event_count = events.len(),
        "loaded log file"
    );
    Ok(events)
}

/// Lists log files in `dir` with the given extension, sorted by path.
pub fn log_files(dir: &Path, extension: &str) -> Result<Vec<PathBuf>, IngestError> {
    let entries = fs::read_dir(dir).map_err(|source| IngestError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext == extension)
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Loads every log file in `dir`, skipping files that fail to load.
pub fn load_dir(dir: &Path, extension: &str) -> Result<Vec<Event>, IngestError> {
    let mut events = Vec::new();
    for path in log_files(dir, extension)? {
        match load_csv(&path, None) {
            Ok(loaded) => events.extend(loaded),
            Err(err) => tracing::warn!(path = %path.display(), error = %err, "skipping log file"),
        }
    }
    Ok(events)
}
