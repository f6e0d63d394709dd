//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use playlog_core::{Policy, SegmentView};

/// Stage attempt analytics for game play logs.
///
/// Cuts per-player event logs into stage attempts and reports timing,
/// retry, camera and grab metrics per stage and per player.
#[derive(Debug, Parser)]
#[command(name = "playlog", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Where to read logs from and whose logs to use.
#[derive(Debug, Clone, Args)]
pub struct SourceArgs {
    /// Directory of per-player CSV logs (defaults to the configured data_dir).
    #[arg(long = "data", value_name = "DIR")]
    pub data_dir: Option<PathBuf>,

    /// Players to include: `all` or a comma-separated list of player IDs.
    #[arg(long, default_value = "all")]
    pub players: String,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Write the per-stage and per-player report tables as CSV.
    Report {
        #[command(flatten)]
        source: SourceArgs,

        /// Output directory (defaults to the configured output_dir).
        #[arg(long = "out", value_name = "DIR")]
        out_dir: Option<PathBuf>,

        /// Selection policy for the first-grab rankings.
        #[arg(long)]
        policy: Option<Policy>,
    },

    /// Print finalized stage attempts.
    Segments {
        #[command(flatten)]
        source: SourceArgs,

        /// Which attempts to show per player and stage: all, latest, best, first.
        #[arg(long, default_value = "all")]
        view: SegmentView,

        /// Output as JSON lines.
        #[arg(long)]
        json: bool,
    },

    /// Print the first distinct objects grabbed in one attempt at a stage.
    Grabs {
        /// Stage name.
        #[arg(long)]
        stage: String,

        #[command(flatten)]
        source: SourceArgs,

        /// Selection policy: earliest, latest, shortest_clear.
        #[arg(long)]
        policy: Option<Policy>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List players with a log file.
    Players {
        /// Directory of per-player CSV logs (defaults to the configured data_dir).
        #[arg(long = "data", value_name = "DIR")]
        data_dir: Option<PathBuf>,
    },

    /// Regenerate the report whenever a log file changes.
    Watch {
        #[command(flatten)]
        source: SourceArgs,

        /// Output directory (defaults to the configured output_dir).
        #[arg(long = "out", value_name = "DIR")]
        out_dir: Option<PathBuf>,

        /// Selection policy for the first-grab rankings.
        #[arg(long)]
        policy: Option<Policy>,

        /// Polling interval in seconds.
        #[arg(long, value_name = "SECS")]
        interval: Option<u64>,
    },
}
