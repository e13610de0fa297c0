//! Start and end events from the race logs.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::RecordError;

/// Number of leading characters that hold the driver code in a log line.
const CODE_WIDTH: usize = 3;

/// Timestamp layout following the code, e.g. `2018-05-24_12:02:58.917`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H:%M:%S%.f";

/// Maximum number of fractional-second digits (microsecond precision).
const MAX_FRACTION_DIGITS: usize = 6;

/// Whether an event marks the start or the end of a lap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Start,
    End,
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Start => "start",
            Self::End => "end",
        };
        write!(f, "{s}")
    }
}

/// A timestamp logged for a driver.
///
/// The code is kept as raw text: whether it names a known driver is decided
/// during reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimedEvent {
    pub driver_code: String,
    pub timestamp: NaiveDateTime,
    pub kind: EventKind,
}

/// Parses a `<CODE><YYYY-MM-DD_HH:MM:SS.ffffff>` log line.
pub fn parse_log_line(line: &str, kind: EventKind) -> Result<TimedEvent, RecordError> {
    let malformed = |value: &str, reason: String| RecordError::MalformedTimestamp {
        kind,
        value: value.to_string(),
        reason,
    };

    let split = match line.char_indices().nth(CODE_WIDTH) {
        Some((idx, _)) => idx,
        None => {
            let reason = format!(
                "line is shorter than the {CODE_WIDTH}-character code plus timestamp"
            );
            return Err(malformed(line, reason));
        }
    };
    let (code, raw) = line.split_at(split);

    let timestamp = parse_timestamp(raw).map_err(|reason| malformed(raw, reason))?;

    Ok(TimedEvent {
        driver_code: code.to_string(),
        timestamp,
        kind,
    })
}

/// Parses the timestamp portion of a log line.
///
/// The fractional part is mandatory and holds 1 to 6 digits; shorter
/// fractions are decimal, so `.5` means half a second.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime, String> {
    let Some((_, fraction)) = raw.rsplit_once('.') else {
        return Err("missing fractional seconds".to_string());
    };
    if fraction.is_empty()
        || fraction.len() > MAX_FRACTION_DIGITS
        || !fraction.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(format!(
            "fractional seconds must be 1 to {MAX_FRACTION_DIGITS} digits"
        ));
    }
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).map_err(|err| err.to_string())
}
