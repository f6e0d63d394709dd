//! Ingestion layer for playlog.
//!
//! Turns per-player CSV log files into the chronologically ordered event
//! tables consumed by `playlog-core`, and keeps a directory of such files
//! loaded and segmented across refreshes.
//!
//! # File Layout
//!
//! One CSV file per player; the player ID is the file stem
//! (`DATA/alice.csv` → `alice`). Header names are matched case-insensitively
//! against a set of aliases (see [`csv_log`]), so logs exported with localized
//! headers load without conversion.

mod cache;
pub mod csv_log;

use std::path::PathBuf;

use thiserror::Error;

pub use cache::{LogCache, RefreshSummary};
pub use csv_log::{load_csv, load_dir, log_files, parse_log, player_id_from_path};

/// Ingestion errors.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Reading a file or directory failed.
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The CSV header could not be read.
    #[error("invalid CSV in {path}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}
