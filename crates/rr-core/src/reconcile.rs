//! Pairing of start and end events into lap results.
//!
//! # Algorithm Summary
//!
//! 1. Abbreviation lines are upserted by code; the last line for a code wins.
//! 2. Start and end lines are parsed and kept in file order.
//! 3. Every event whose code has no abbreviation is reported against its own
//!    line. For known codes an exact duplicate is dropped and a conflicting
//!    duplicate keeps the first occurrence.
//! 4. For every known driver with both events, an inverted pair (start after
//!    end) is swapped, then `duration = end - start`.
//!
//! Every per-line problem lands in [`Reconciliation::errors`]; nothing aborts
//! the batch. The output depends only on the input lines, so reconciling the
//! same sources twice gives identical laps.

use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::driver::{Driver, parse_abbreviation};
use crate::error::{LineError, RecordError};
use crate::event::{EventKind, TimedEvent, parse_log_line};
use crate::reader::{Line, SourceKind};
use crate::types::{DriverCode, LapTime};

/// A reconciled lap for one driver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lap {
    pub driver: DriverCode,
    /// Start time after repair.
    pub start_time: NaiveDateTime,
    /// End time after repair; never earlier than `start_time`.
    pub end_time: NaiveDateTime,
    pub duration: LapTime,
    /// Whether the logged start and end were swapped.
    pub repaired: bool,
}

/// Counters describing one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileStats {
    pub drivers: usize,
    pub start_events: usize,
    pub end_events: usize,
    pub laps: usize,
    pub repaired: usize,
    pub duplicates: usize,
}

/// Output of a reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    /// Drivers from the abbreviations source, ordered by code.
    pub drivers: Vec<Driver>,
    /// One lap per driver with both events, ordered by code.
    pub laps: Vec<Lap>,
    /// Per-line problems, in source order.
    pub errors: Vec<LineError>,
    pub stats: ReconcileStats,
}

/// Where an accepted event came from.
#[derive(Debug, Clone, Copy)]
struct Logged {
    timestamp: NaiveDateTime,
    line: usize,
}

/// Accumulates source lines and produces a [`Reconciliation`].
#[derive(Debug, Default)]
pub struct Reconciler {
    drivers: BTreeMap<DriverCode, Driver>,
    starts: Vec<(String, Logged)>,
    ends: Vec<(String, Logged)>,
    errors: Vec<LineError>,
    duplicates: usize,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds one abbreviation line. Later lines for the same code replace earlier ones.
    pub fn add_abbreviation(&mut self, line: &Line) {
        match parse_abbreviation(&line.text) {
            Ok(driver) => {
                if let Some(previous) = self.drivers.insert(driver.code.clone(), driver) {
                    tracing::debug!(
                        code = %previous.code,
                        line = line.number,
                        "abbreviation overrides earlier entry"
                    );
                }
            }
            Err(error) => self.reject(SourceKind::Abbreviations, line.number, error),
        }
    }

    /// Adds one start or end log line.
    ///
    /// Events are kept in file order; known codes are only checked in
    /// [`finish`](Self::finish), once every abbreviation has been seen.
    pub fn add_event(&mut self, line: &Line, kind: EventKind) {
        let origin = source_of(kind);
        let event = match parse_log_line(&line.text, kind) {
            Ok(event) => event,
            Err(error) => return self.reject(origin, line.number, error),
        };
        let TimedEvent {
            driver_code,
            timestamp,
            ..
        } = event;

        let events = match kind {
            EventKind::Start => &mut self.starts,
            EventKind::End => &mut self.ends,
        };
        events.push((
            driver_code,
            Logged {
                timestamp,
                line: line.number,
            },
        ));
    }

    /// Resolves one log against the known drivers.
    ///
    /// Unknown codes become one error per line. For known codes the first
    /// event wins; exact repeats are dropped and conflicting ones counted.
    fn resolve(
        &mut self,
        kind: EventKind,
        events: Vec<(String, Logged)>,
    ) -> HashMap<String, Logged> {
        let mut accepted: HashMap<String, Logged> = HashMap::new();
        for (code, logged) in events {
            if !self.drivers.contains_key(code.as_str()) {
                tracing::warn!(%code, %kind, line = logged.line, "event for unknown driver");
                self.errors.push(LineError {
                    origin: source_of(kind),
                    line: logged.line,
                    error: RecordError::UnknownDriverCode { code, kind },
                });
                continue;
            }
            match accepted.entry(code) {
                Entry::Vacant(slot) => {
                    slot.insert(logged);
                }
                Entry::Occupied(first) if first.get().timestamp == logged.timestamp => {}
                Entry::Occupied(first) => {
                    tracing::warn!(
                        code = %first.key(),
                        %kind,
                        kept_line = first.get().line,
                        ignored_line = logged.line,
                        "conflicting duplicate event, keeping the first"
                    );
                    self.duplicates += 1;
                }
            }
        }
        accepted
    }

    /// Pairs events per driver and computes lap times.
    pub fn finish(mut self) -> Reconciliation {
        let starts = std::mem::take(&mut self.starts);
        let ends = std::mem::take(&mut self.ends);
        let starts = self.resolve(EventKind::Start, starts);
        let ends = self.resolve(EventKind::End, ends);

        let mut stats = ReconcileStats {
            drivers: self.drivers.len(),
            duplicates: self.duplicates,
            ..ReconcileStats::default()
        };

        let mut laps = Vec::new();
        for code in self.drivers.keys() {
            let start = starts.get(code.as_str());
            let end = ends.get(code.as_str());
            if start.is_some() {
                stats.start_events += 1;
            }
            if end.is_some() {
                stats.end_events += 1;
            }
            let (Some(start), Some(end)) = (start, end) else {
                tracing::debug!(
                    %code,
                    has_start = start.is_some(),
                    has_end = end.is_some(),
                    "no lap: missing event"
                );
                continue;
            };
            match build_lap(code, start.timestamp, end.timestamp) {
                Ok(lap) => {
                    if lap.repaired {
                        tracing::warn!(%code, "start logged after end, swapped");
                        stats.repaired += 1;
                    }
                    laps.push(lap);
                }
                Err(error) => self.errors.push(LineError {
                    origin: SourceKind::EndLog,
                    line: end.line,
                    error,
                }),
            }
        }
        stats.laps = laps.len();
        self.errors.sort_by_key(|e| (source_rank(e.origin), e.line));

        Reconciliation {
            drivers: self.drivers.into_values().collect(),
            laps,
            errors: self.errors,
            stats,
        }
    }

    fn reject(&mut self, origin: SourceKind, line: usize, error: RecordError) {
        tracing::warn!(%origin, line, %error, "skipping malformed line");
        self.errors.push(LineError {
            origin,
            line,
            error,
        });
    }
}

/// Orders a start/end pair so the end is never earlier than the start.
///
/// Returns `true` in the last position when the pair had to be swapped.
pub fn repair(
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> (NaiveDateTime, NaiveDateTime, bool) {
    if start > end {
        (end, start, true)
    } else {
        (start, end, false)
    }
}

/// Builds a lap from a possibly inverted start/end pair.
pub fn build_lap(
    code: &DriverCode,
    start: NaiveDateTime,
    end: NaiveDateTime,
) -> Result<Lap, RecordError> {
    let (start_time, end_time, repaired) = repair(start, end);
    let duration = (end_time - start_time)
        .num_microseconds()
        .and_then(|micros| LapTime::from_micros(micros).ok())
        .ok_or_else(|| RecordError::MalformedTimestamp {
            kind: EventKind::End,
            value: end.format(crate::event::TIMESTAMP_FORMAT).to_string(),
            reason: "lap duration is out of range".to_string(),
        })?;
    Ok(Lap {
        driver: code.clone(),
        start_time,
        end_time,
        duration,
        repaired,
    })
}

const fn source_of(kind: EventKind) -> SourceKind {
    match kind {
        EventKind::Start => SourceKind::StartLog,
        EventKind::End => SourceKind::EndLog,
    }
}

const fn source_rank(kind: SourceKind) -> u8 {
    match kind {
        SourceKind::Abbreviations => 0,
        SourceKind::StartLog => 1,
        SourceKind::EndLog => 2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::NaiveDate;

    fn line(number: usize, text: &str) -> Line {
        Line {
            number,
            text: text.to_string(),
        }
    }

    fn at(h: u32, m: u32, s: u32, micro: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2023, 1, 1)
            .unwrap()
            .and_hms_micro_opt(h, m, s, micro)
            .unwrap()
    }

    fn reconcile(abbr: &[&str], starts: &[&str], ends: &[&str]) -> Reconciliation {
        let mut reconciler = Reconciler::new();
        for (i, text) in abbr.iter().enumerate() {
            reconciler.add_abbreviation(&line(i + 1, text));
        }
        for (i, text) in starts.iter().enumerate() {
            reconciler.add_event(&line(i + 1, text), EventKind::Start);
        }
        for (i, text) in ends.iter().enumerate() {
            reconciler.add_event(&line(i + 1, text), EventKind::End);
        }
        reconciler.finish()
    }

    #[test]
    fn computes_lap_duration() {
        let result = reconcile(
            &["SVF_Sebastian Vettel_FERRARI"],
            &["SVF2023-01-01_12:00:00.000000"],
            &["SVF2023-01-01_12:01:30.500000"],
        );

        assert!(result.errors.is_empty());
        assert_eq!(result.laps.len(), 1);
        let lap = &result.laps[0];
        assert_eq!(lap.driver.as_str(), "SVF");
        assert_eq!(lap.duration.to_string(), "00:01:30.500000");
        assert!(!lap.repaired);
    }

    #[test]
    fn swaps_inverted_pair() {
        let result = reconcile(
            &["DR2_Driver Two_Team B"],
            &["DR22023-01-01_12:02:00.000000"],
            &["DR22023-01-01_12:00:00.000000"],
        );

        let lap = &result.laps[0];
        assert!(lap.repaired);
        assert_eq!(lap.start_time, at(12, 0, 0, 0));
        assert_eq!(lap.end_time, at(12, 2, 0, 0));
        assert_eq!(lap.duration.as_micros(), 120_000_000);
        assert_eq!(result.stats.repaired, 1);
    }

    #[test]
    fn repair_keeps_ordered_pair() {
        assert_eq!(
            repair(at(12, 0, 0, 0), at(12, 0, 0, 0)),
            (at(12, 0, 0, 0), at(12, 0, 0, 0), false)
        );
    }

    #[test]
    fn unknown_code_is_reported_and_skipped() {
        let result = reconcile(
            &["SVF_Sebastian Vettel_FERRARI"],
            &[
                "SVF2023-01-01_12:00:00.000000",
                "ZZZ2023-01-01_12:00:00.000000",
            ],
            &["SVF2023-01-01_12:01:00.000000"],
        );

        assert_eq!(result.laps.len(), 1);
        assert_eq!(
            result.errors,
            vec![LineError {
                origin: SourceKind::StartLog,
                line: 2,
                error: RecordError::UnknownDriverCode {
                    code: "ZZZ".to_string(),
                    kind: EventKind::Start,
                },
            }]
        );
    }

    #[test]
    fn every_unknown_line_is_reported() {
        let result = reconcile(
            &["SVF_Sebastian Vettel_FERRARI"],
            &[
                "ZZZ2023-01-01_12:00:00.000000",
                "ZZZ2023-01-01_12:05:00.000000",
                "ZZZ2023-01-01_12:00:00.000000",
            ],
            &["ZZZ2023-01-01_12:06:00.000000"],
        );

        let reported: Vec<_> = result.errors.iter().map(|e| (e.origin, e.line)).collect();
        assert_eq!(
            reported,
            vec![
                (SourceKind::StartLog, 1),
                (SourceKind::StartLog, 2),
                (SourceKind::StartLog, 3),
                (SourceKind::EndLog, 1),
            ]
        );
        for error in &result.errors {
            assert!(error.to_string().contains("unknown driver code ZZZ"));
        }
        assert_eq!(result.stats.duplicates, 0);
        assert!(result.laps.is_empty());
    }

    #[test]
    fn missing_event_yields_no_lap() {
        let result = reconcile(
            &["SVF_Sebastian Vettel_FERRARI", "NEW_New Driver_NOBODY"],
            &[
                "SVF2023-01-01_12:00:00.000000",
                "NEW2023-01-01_12:00:00.000000",
            ],
            &["SVF2023-01-01_12:01:00.000000"],
        );

        assert_eq!(result.drivers.len(), 2);
        assert_eq!(result.laps.len(), 1);
        assert_eq!(result.stats.start_events, 2);
        assert_eq!(result.stats.end_events, 1);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn malformed_lines_do_not_block_valid_drivers() {
        let result = reconcile(
            &[
                "SVF_Sebastian Vettel_FERRARI",
                "garbage",
                "LHM_Lewis Hamilton_MERCEDES",
            ],
            &[
                "SVF2023-01-01_12:00:00.000000",
                "LHM2023-01-01_12:00:00.000000",
            ],
            &[
                "SVFnot-a-timestamp",
                "LHM2023-01-01_12:01:12.460000",
            ],
        );

        assert_eq!(result.laps.len(), 1);
        assert_eq!(result.laps[0].driver.as_str(), "LHM");
        let origins: Vec<_> = result.errors.iter().map(|e| (e.origin, e.line)).collect();
        assert_eq!(
            origins,
            [(SourceKind::Abbreviations, 2), (SourceKind::EndLog, 1)]
        );
    }

    #[test]
    fn last_abbreviation_wins() {
        let result = reconcile(
            &[
                "SVF_Sebastian Vettel_FERRARI",
                "SVF_Sebastian Vettel_ASTON MARTIN",
            ],
            &[],
            &[],
        );

        assert_eq!(result.drivers.len(), 1);
        assert_eq!(result.drivers[0].team, "ASTON MARTIN");
    }

    #[test]
    fn duplicate_events_keep_first() {
        let result = reconcile(
            &["SVF_Sebastian Vettel_FERRARI"],
            &[
                "SVF2023-01-01_12:00:00.000000",
                "SVF2023-01-01_12:00:00.000000",
                "SVF2023-01-01_12:00:10.000000",
            ],
            &["SVF2023-01-01_12:01:00.000000"],
        );

        assert_eq!(result.stats.duplicates, 1);
        assert_eq!(result.laps[0].duration.as_micros(), 60_000_000);
        assert!(result.errors.is_empty());
    }

    #[test]
    fn lap_across_midnight() {
        let result = reconcile(
            &["SVF_Sebastian Vettel_FERRARI"],
            &["SVF2023-01-01_23:59:00.000000"],
            &["SVF2023-01-02_00:01:00.000000"],
        );

        assert_eq!(result.laps[0].duration.to_string(), "00:02:00.000000");
    }

    #[test]
    fn laps_are_ordered_by_code() {
        let result = reconcile(
            &["ZZA_Z A_T", "AAB_A B_T"],
            &["ZZA2023-01-01_12:00:00.000", "AAB2023-01-01_12:00:00.000"],
            &["ZZA2023-01-01_12:01:00.000", "AAB2023-01-01_12:02:00.000"],
        );

        let codes: Vec<_> = result.laps.iter().map(|l| l.driver.as_str()).collect();
        assert_eq!(codes, ["AAB", "ZZA"]);
    }

    #[test]
    fn reconciling_twice_is_identical() {
        let run = || {
            reconcile(
                &[
                    "SVF_Sebastian Vettel_FERRARI",
                    "LHM_Lewis Hamilton_MERCEDES",
                ],
                &["SVF2018-05-24_12:02:58.917", "LHM2018-05-24_12:18:20.125"],
                &["SVF2018-05-24_12:04:03.332", "LHM2018-05-24_12:11:32.585"],
            )
        };
        assert_eq!(run().laps, run().laps);
    }
}
