//! Watch command regenerating the report when log files change.

use std::io::Write;
use std::path::Path;
use std::thread;
use std::time::Duration;

use anyhow::Result;
use playlog_ingest::{LogCache, RefreshSummary};

use super::report::{self, ReportOptions};

/// Polling state that remembers changes whose report has not been written yet.
#[derive(Debug, Default)]
pub struct Watcher {
    pending: RefreshSummary,
}

impl Watcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refreshes the cache once and regenerates the report if anything changed.
    ///
    /// Changes stay pending until a report is written, so a failed
    /// generation is retried on the next poll even if no file changed since.
    /// Returns whether the report was regenerated.
    pub fn poll_once<W: Write>(
        &mut self,
        writer: &mut W,
        cache: &mut LogCache,
        out_dir: &Path,
        options: &ReportOptions,
    ) -> Result<bool> {
        let summary = cache.refresh()?;
        merge(&mut self.pending.loaded, summary.loaded);
        merge(&mut self.pending.removed, summary.removed);
        if !self.pending.is_changed() {
            return Ok(false);
        }

        report::generate(cache, out_dir, options)?;
        let done = std::mem::take(&mut self.pending);
        writeln!(
            writer,
            "Report updated: {} reloaded, {} removed",
            done.loaded.len(),
            done.removed.len()
        )?;
        Ok(true)
    }
}

fn merge(pending: &mut Vec<String>, players: Vec<String>) {
    pending.extend(players);
    pending.sort();
    pending.dedup();
}

/// Writes the report, then polls for changes until interrupted.
pub fn run<W: Write>(
    writer: &mut W,
    cache: &mut LogCache,
    out_dir: &Path,
    options: &ReportOptions,
    interval: Duration,
) -> Result<()> {
    report::run(writer, cache, out_dir, options)?;
    writeln!(
        writer,
        "Watching {} every {}s (Ctrl-C to stop)",
        cache.data_dir().display(),
        interval.as_secs()
    )?;

    let mut watcher = Watcher::new();
    loop {
        thread::sleep(interval);
        if let Err(err) = watcher.poll_once(writer, cache, out_dir, options) {
            tracing::warn!(error = %err, "refresh failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    use playlog_core::Policy;

    use crate::commands::fixtures::{ALICE, loaded_cache};
    use crate::commands::report::GLOBAL_EXIT_COUNTS;

    fn options() -> ReportOptions {
        ReportOptions {
            players: Vec::new(),
            policy: Policy::Earliest,
            exclude_root_grabs: true,
        }
    }

    #[test]
    fn unchanged_directory_is_not_regenerated() {
        let temp = tempfile::tempdir().unwrap();
        let mut cache = loaded_cache(temp.path());
        let out = temp.path().join("out");

        let mut output = Vec::new();
        let mut watcher = Watcher::new();
        assert!(!watcher.poll_once(&mut output, &mut cache, &out, &options()).unwrap());
        assert!(output.is_empty());
        assert!(!out.exists());
    }

    #[test]
    fn changed_log_regenerates_report() {
        let temp = tempfile::tempdir().unwrap();
        let mut cache = loaded_cache(temp.path());
        let out = temp.path().join("out");

        fs::write(temp.path().join("carol.csv"), ALICE).unwrap();
        fs::remove_file(temp.path().join("bob.csv")).unwrap();

        let mut output = Vec::new();
        let mut watcher = Watcher::new();
        assert!(watcher.poll_once(&mut output, &mut cache, &out, &options()).unwrap());
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Report updated: 1 reloaded, 1 removed\n"
        );
        assert_eq!(
            fs::read_to_string(out.join(GLOBAL_EXIT_COUNTS)).unwrap(),
            "stage,exit_sum\nstage 1,0\nstage 2,2\n"
        );
    }

    #[test]
    fn failed_generation_is_retried_on_next_poll() {
        let temp = tempfile::tempdir().unwrap();
        let mut cache = loaded_cache(temp.path());
        let out = temp.path().join("out");
        fs::write(&out, "not a directory").unwrap();
        fs::write(temp.path().join("carol.csv"), ALICE).unwrap();

        let mut output = Vec::new();
        let mut watcher = Watcher::new();
        assert!(watcher.poll_once(&mut output, &mut cache, &out, &options()).is_err());
        assert!(output.is_empty());

        fs::remove_file(&out).unwrap();
        assert!(watcher.poll_once(&mut output, &mut cache, &out, &options()).unwrap());
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Report updated: 1 reloaded, 0 removed\n"
        );
        assert!(out.join(GLOBAL_EXIT_COUNTS).exists());

        let mut output = Vec::new();
        assert!(!watcher.poll_once(&mut output, &mut cache, &out, &options()).unwrap());
    }
}
