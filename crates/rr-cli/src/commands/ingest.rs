//! Ingest command: load the three race files and replace the stored laps.
//!
//! Concurrent `rr ingest` processes are serialized with an exclusive lock
//! file next to the database, so only one of them writes at a time.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use fs2::FileExt;

use rr_core::{IngestReport, RaceEngine, RaceSources, RaceStore};

/// Returns the lock file path for a database.
pub fn lock_path(database_path: &Path) -> PathBuf {
    database_path.with_extension("lock")
}

/// Formats an ingest report for humans.
pub fn format_ingest_report(report: &IngestReport) -> String {
    use std::fmt::Write as _;

    let stats = &report.stats;
    let mut output = String::new();
    writeln!(output, "Ingested run {}", report.run_id).unwrap();
    writeln!(output, "  Drivers:      {}", stats.drivers).unwrap();
    writeln!(output, "  Start events: {}", stats.start_events).unwrap();
    writeln!(output, "  End events:   {}", stats.end_events).unwrap();
    writeln!(output, "  Laps:         {}", stats.laps).unwrap();
    if stats.repaired > 0 {
        writeln!(output, "  Repaired:     {}", stats.repaired).unwrap();
    }
    if stats.duplicates > 0 {
        writeln!(output, "  Duplicates:   {}", stats.duplicates).unwrap();
    }

    if !report.is_clean() {
        writeln!(output).unwrap();
        writeln!(output, "Skipped {} line(s):", report.errors.len()).unwrap();
        for error in &report.errors {
            writeln!(output, "  {error}").unwrap();
        }
    }

    output
}

/// Runs the ingest command.
pub fn run<W: Write, S: RaceStore>(
    writer: &mut W,
    engine: &RaceEngine<S>,
    data_dir: &Path,
    lock: &Path,
    json: bool,
) -> Result<()> {
    let lock_file = File::create(lock).context("failed to create lock file")?;
    lock_file
        .lock_exclusive()
        .context("failed to acquire lock")?;

    tracing::debug!(data_dir = %data_dir.display(), "ingesting race data");
    let report = engine
        .ingest(&RaceSources::from_dir(data_dir))
        .with_context(|| format!("failed to ingest {}", data_dir.display()))?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        write!(writer, "{}", format_ingest_report(&report))?;
    }

    Ok(())
}
