//! Configuration loading and management.

use std::path::{Path, PathBuf};

use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use playlog_core::{Policy, SegmentConfig};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Directory holding one CSV log per player.
    pub data_dir: PathBuf,
    /// Directory the `report` command writes its tables to.
    pub output_dir: PathBuf,
    /// Extension of log files inside `data_dir`.
    pub file_extension: String,
    /// Count a grab still unreleased at segment end as a completed pair.
    pub count_orphan_grabs: bool,
    /// Leave the scene root out of first-grab rankings.
    pub exclude_root_grabs: bool,
    /// Selection policy for first-grab rankings.
    pub default_policy: Policy,
    /// Polling interval of the `watch` command.
    pub watch_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./DATA"),
            output_dir: PathBuf::from("./outputs"),
            file_extension: "csv".to_string(),
            count_orphan_grabs: true,
            exclude_root_grabs: true,
            default_policy: Policy::Earliest,
            watch_interval_secs: 2,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // PLAYLOG_DATA_DIR, PLAYLOG_DEFAULT_POLICY, ...
        figment = figment.merge(Env::prefixed("PLAYLOG_"));

        figment.extract()
    }

    pub const fn segment_config(&self) -> SegmentConfig {
        SegmentConfig {
            count_orphan_grabs: self.count_orphan_grabs,
        }
    }
}

/// Returns the platform-specific config directory for playlog.
///
/// On Linux: `~/.config/playlog`
pub fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("playlog"))
}
