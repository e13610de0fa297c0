//! Status command for showing the database and the last ingestion.

use std::io::Write;
use std::path::Path;

use anyhow::Result;

use rr_core::{RaceEngine, RaceStore};

pub fn run<W: Write, S: RaceStore>(
    writer: &mut W,
    engine: &RaceEngine<S>,
    database_path: &Path,
) -> Result<()> {
    let last_run = engine
        .last_run()
        .map_err(|err| anyhow::anyhow!("failed to read last ingestion: {err}"))?;
    let standings = engine.standings();

    writeln!(writer, "Race report status")?;
    writeln!(writer, "Database: {}", database_path.display())?;

    let Some(run) = last_run else {
        writeln!(writer, "No ingestion recorded.")?;
        return Ok(());
    };

    let finished = run.finished_at.to_rfc3339();
    writeln!(writer, "Last ingestion: {finished} ({})", run.id)?;
    writeln!(
        writer,
        "  {} drivers, {} laps, {} skipped line(s)",
        run.drivers, run.laps, run.errors
    )?;
    writeln!(
        writer,
        "Current: {} drivers, {} ranked laps",
        standings.driver_count(),
        standings.lap_count()
    )?;

    Ok(())
}
