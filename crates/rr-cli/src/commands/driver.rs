//! Driver command: one driver's lap result.

use std::io::Write;

use anyhow::Result;

use rr_core::{RaceEngine, RaceStore};

/// Runs the driver command.
///
/// Unknown codes and drivers without a lap are errors, reported with
/// different messages.
pub fn run<W: Write, S: RaceStore>(
    writer: &mut W,
    engine: &RaceEngine<S>,
    code: &str,
    json: bool,
) -> Result<()> {
    let standings = engine.standings();
    let result = standings.result(code)?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&result)?)?;
        return Ok(());
    }

    writeln!(writer, "{} ({})", result.name, result.code)?;
    writeln!(writer, "Team:     {}", result.team)?;
    writeln!(writer, "Lap time: {}", result.duration)?;
    if let Some(position) = standings.position(code) {
        writeln!(writer, "Position: {position} of {}", standings.lap_count())?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use insta::assert_snapshot;
    use rr_core::{MemorySource, MemoryStore, QueryError, RaceSources};

    fn engine() -> RaceEngine<MemoryStore> {
        let engine = RaceEngine::open(MemoryStore::new()).unwrap();
        let sources = RaceSources::new(
            MemorySource::new(
                "abbreviations.txt",
                "SVF_Sebastian Vettel_FERRARI\n\
                 LHM_Lewis Hamilton_MERCEDES\n\
                 NEW_New Driver_NEW TEAM\n",
            ),
            MemorySource::new(
                "start.log",
                "SVF2018-05-24_12:02:58.917\nLHM2018-05-24_12:18:20.125\n",
            ),
            MemorySource::new(
                "end.log",
                "SVF2018-05-24_12:04:03.332\nLHM2018-05-24_12:11:32.585\n",
            ),
        );
        engine.ingest(&sources).unwrap();
        engine
    }

    #[test]
    fn test_driver_shows_result_and_position() {
        let mut output = Vec::new();
        run(&mut output, &engine(), "LHM", false).unwrap();
        assert_snapshot!(String::from_utf8(output).unwrap(), @r"
        Lewis Hamilton (LHM)
        Team:     MERCEDES
        Lap time: 00:06:47.540000
        Position: 2 of 2
        ");
    }

    #[test]
    fn test_driver_json() {
        let mut output = Vec::new();
        run(&mut output, &engine(), "SVF", true).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(value["name"], "Sebastian Vettel");
        assert_eq!(value["duration"], "00:01:04.415000");
    }

    #[test]
    fn test_driver_not_found_and_not_ready_are_distinct() {
        let engine = engine();
        let mut output = Vec::new();

        let missing = run(&mut output, &engine, "XYZ", false).unwrap_err();
        assert!(matches!(
            missing.downcast_ref::<QueryError>(),
            Some(QueryError::DriverNotFound { .. })
        ));

        let pending = run(&mut output, &engine, "NEW", false).unwrap_err();
        assert!(matches!(
            pending.downcast_ref::<QueryError>(),
            Some(QueryError::ResultNotReady { .. })
        ));
        assert_eq!(pending.to_string(), "driver NEW has no lap result yet");
        assert!(output.is_empty());
    }
}
