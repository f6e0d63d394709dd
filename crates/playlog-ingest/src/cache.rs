//! Directory-backed event and segment cache with mtime-based reloads.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use playlog_core::{Event, Segment, SegmentConfig, segment};

use crate::IngestError;
use crate::csv_log::{load_csv, log_files, player_id_from_path};

/// Players whose data changed during a refresh.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshSummary {
    pub loaded: Vec<String>,
    pub removed: Vec<String>,
}

impl RefreshSummary {
    pub fn is_changed(&self) -> bool {
        !self.loaded.is_empty() || !self.removed.is_empty()
    }
}

/// Per-player events and segments for every log file in a directory.
///
/// Files are reloaded only when their modification time advances.
#[derive(Debug)]
pub struct LogCache {
    data_dir: PathBuf,
    extension: String,
    config: SegmentConfig,
    mtimes: HashMap<PathBuf, SystemTime>,
    events: BTreeMap<String, Vec<Event>>,
    segments: BTreeMap<String, Vec<Segment>>,
}

impl LogCache {
    pub fn new(
        data_dir: impl Into<PathBuf>,
        extension: impl Into<String>,
        config: SegmentConfig,
    ) -> Self {
        Self {
            data_dir: data_dir.into(),
            extension: extension.into(),
            config,
            mtimes: HashMap::new(),
            events: BTreeMap::new(),
            segments: BTreeMap::new(),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Loads every log file, discarding anything previously cached.
    ///
    /// Unlike [`refresh`](Self::refresh), a file that fails to load is an error.
    pub fn initial_load(&mut self) -> Result<RefreshSummary, IngestError> {
        self.mtimes.clear();
        self.events.clear();
        self.segments.clear();

        let mut summary = RefreshSummary::default();
        for path in log_files(&self.data_dir, &self.extension)? {
            let mtime = modified(&path)?;
            let events = load_csv(&path, None)?;
            summary.loaded.push(self.store(path, mtime, events));
        }

        tracing::info!(
            data_dir = %self.data_dir.display(),
            players = summary.loaded.len(),
            "loaded log directory"
        );
        Ok(summary)
    }

    /// Reloads new or modified files and drops players whose file disappeared.
    ///
    /// A file that fails to load is skipped with a warning and retried on the
    /// next refresh.
    pub fn refresh(&mut self) -> Result<RefreshSummary, IngestError> {
        let files = log_files(&self.data_dir, &self.extension)?;
        let mut summary = RefreshSummary::default();

        for path in &files {
            let mtime = match modified(path) {
                Ok(mtime) => mtime,
                Err(err) => {
                    tracing::warn!(error = %err, "skipping log file");
                    continue;
                }
            };
            if self.mtimes.get(path).is_some_and(|prev| mtime <= *prev) {
                continue;
            }
            match load_csv(path, None) {
                Ok(events) => summary.loaded.push(self.store(path.clone(), mtime, events)),
                Err(err) => tracing::warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to reload log file"
                ),
            }
        }

        let gone: Vec<PathBuf> = self
            .mtimes
            .keys()
            .filter(|path| !files.contains(path))
            .cloned()
            .collect();
        for path in gone {
            self.mtimes.remove(&path);
            let player_id = player_id_from_path(&path);
            self.events.remove(&player_id);
            self.segments.remove(&player_id);
            summary.removed.push(player_id);
        }
        summary.removed.sort();

        if summary.is_changed() {
            tracing::info!(
                loaded = ?summary.loaded,
                removed = ?summary.removed,
                "log directory changed"
            );
        }
        Ok(summary)
    }

    fn store(&mut self, path: PathBuf, mtime: SystemTime, events: Vec<Event>) -> String {
        let player_id = player_id_from_path(&path);
        let segments = segment(&events, &self.config);
        tracing::debug!(
            %player_id,
            event_count = events.len(),
            segment_count = segments.len(),
            "cached player log"
        );
        self.mtimes.insert(path, mtime);
        self.events.insert(player_id.clone(), events);
        self.segments.insert(player_id.clone(), segments);
        player_id
    }

    /// Player IDs with a loaded log, sorted.
    pub fn players(&self) -> Vec<&str> {
        self.events.keys().map(String::as_str).collect()
    }

    /// Every cached event, grouped by player in player order.
    pub fn all_events(&self) -> Vec<&Event> {
        self.events.values().flatten().collect()
    }

    /// Every cached segment, grouped by player in player order.
    pub fn all_segments(&self) -> Vec<Segment> {
        self.segments.values().flatten().cloned().collect()
    }

    pub fn player_events(&self, player_id: &str) -> Option<&[Event]> {
        self.events.get(player_id).map(Vec::as_slice)
    }

    pub fn player_segments(&self, player_id: &str) -> Option<&[Segment]> {
        self.segments.get(player_id).map(Vec::as_slice)
    }
}

fn modified(path: &Path) -> Result<SystemTime, IngestError> {
    fs::metadata(path)
        .and_then(|meta| meta.modified())
        .map_err(|source| IngestError::Io {
            path: path.to_path_buf(),
            source,
        })
}
