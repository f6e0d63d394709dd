//! Players command listing every player with a log file.

use std::io::Write;

use anyhow::Result;
use playlog_ingest::LogCache;

pub fn run<W: Write>(writer: &mut W, cache: &LogCache) -> Result<()> {
    let players = cache.players();
    if players.is_empty() {
        writeln!(
            writer,
            "No player logs found in {}.",
            cache.data_dir().display()
        )?;
        return Ok(());
    }

    for player in players {
        let count = cache.player_segments(player).map_or(0, <[_]>::len);
        writeln!(writer, "{player}\tsegments={count}")?;
    }
    Ok(())
}
