//! Report command: lap results ranked by time.

use std::fmt::Write as _;
use std::io::Write;

use anyhow::Result;

use rr_core::{RaceEngine, RaceStore, SortOrder, Standings};

/// One line of the report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportRow {
    /// 1-based place in ascending order, regardless of display order.
    pub position: usize,
    pub code: String,
    pub name: String,
    pub team: String,
    pub duration: String,
}

/// Collects rows from one snapshot so positions and order agree.
pub fn report_rows(standings: &Standings, order: SortOrder) -> Vec<ReportRow> {
    standings
        .ranked(order)
        .into_iter()
        .filter_map(|view| {
            let position = standings.position(&view.code)?;
            Some(ReportRow {
                position,
                code: view.code,
                name: view.name,
                team: view.team,
                duration: view.duration,
            })
        })
        .collect()
}

/// Formats rows as an aligned table.
///
/// A dashed line separates place `top_n` from place `top_n + 1`, in either
/// display order.
pub fn format_report(rows: &[ReportRow], top_n: usize) -> String {
    let mut output = String::new();

    if rows.is_empty() {
        writeln!(output, "No results.").unwrap();
        writeln!(output, "Hint: Run 'rr ingest' to load race data.").unwrap();
        return output;
    }

    let name_width = rows
        .iter()
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(0);
    let team_width = rows
        .iter()
        .map(|r| r.team.chars().count())
        .max()
        .unwrap_or(0);
    let duration_width = rows.iter().map(|r| r.duration.len()).max().unwrap_or(0);
    let rule = "-".repeat(4 + name_width + 3 + team_width + 3 + duration_width);

    let mut previous: Option<usize> = None;
    for row in rows {
        if previous.is_some_and(|prev| (prev <= top_n) != (row.position <= top_n)) {
            writeln!(output, "{rule}").unwrap();
        }
        let place = format!("{}.", row.position);
        writeln!(
            output,
            "{place:<4}{:<name_width$} | {:<team_width$} | {}",
            row.name, row.team, row.duration
        )
        .unwrap();
        previous = Some(row.position);
    }

    output
}

/// Formats the ranked results as JSON.
pub fn format_report_json(standings: &Standings, order: SortOrder) -> Result<String> {
    Ok(serde_json::to_string_pretty(&standings.ranked(order))?)
}

/// Runs the report command.
pub fn run<W: Write, S: RaceStore>(
    writer: &mut W,
    engine: &RaceEngine<S>,
    order: &str,
    json: bool,
    top_n: usize,
) -> Result<()> {
    let order: SortOrder = order.parse()?;
    let standings = engine.standings();

    if json {
        writeln!(writer, "{}", format_report_json(&standings, order)?)?;
    } else {
        let rows = report_rows(&standings, order);
        write!(writer, "{}", format_report(&rows, top_n))?;
    }

    Ok(())
}
