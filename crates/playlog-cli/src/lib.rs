//! Playlog CLI library.
//!
//! This crate provides the CLI interface for stage attempt analytics.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, SourceArgs};
pub use config::Config;
