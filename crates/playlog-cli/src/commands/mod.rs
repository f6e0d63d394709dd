//! CLI subcommand implementations.

pub mod grabs;
pub mod players;
pub mod report;
pub mod segments;
pub mod util;
pub mod watch;
