//! Drivers command: every known driver ordered by code.

use std::io::Write;

use anyhow::Result;

use rr_core::{DriverView, RaceEngine, RaceStore};

/// Formats the driver list as aligned columns.
pub fn format_drivers(drivers: &[DriverView]) -> String {
    use std::fmt::Write as _;

    let mut output = String::new();
    if drivers.is_empty() {
        writeln!(output, "No drivers recorded.").unwrap();
        return output;
    }

    let name_width = drivers
        .iter()
        .map(|d| d.name.chars().count())
        .max()
        .unwrap_or(0);
    let team_width = drivers
        .iter()
        .map(|d| d.team.chars().count())
        .max()
        .unwrap_or(0);
    for driver in drivers {
        let duration = driver.duration.as_deref().unwrap_or("-");
        writeln!(
            output,
            "{}  {:<name_width$}  {:<team_width$}  {duration}",
            driver.code, driver.name, driver.team
        )
        .unwrap();
    }
    output
}

/// Runs the drivers command.
pub fn run<W: Write, S: RaceStore>(
    writer: &mut W,
    engine: &RaceEngine<S>,
    json: bool,
) -> Result<()> {
    let drivers = engine.list_drivers();
    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&drivers)?)?;
    } else {
        write!(writer, "{}", format_drivers(&drivers))?;
    }
    Ok(())
}
