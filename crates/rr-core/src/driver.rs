//! Driver identities from the abbreviations source.

use serde::{Deserialize, Serialize};

use crate::error::RecordError;
use crate::types::DriverCode;

/// Delimiter between code, name and team in an abbreviation line.
const DELIMITER: char = '_';

/// A race participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Driver {
    /// Unique short code, e.g. `SVF`.
    pub code: DriverCode,
    /// Full name, e.g. `Sebastian Vettel`.
    pub name: String,
    /// Team name, e.g. `FERRARI`.
    pub team: String,
}

/// Parses a `<code>_<name>_<team>` line.
///
/// The line is split at most twice, so any further delimiters stay in the team.
pub fn parse_abbreviation(line: &str) -> Result<Driver, RecordError> {
    let malformed = |reason| RecordError::MalformedAbbreviation {
        line: line.to_string(),
        reason,
    };

    let mut parts = line.splitn(3, DELIMITER);
    let (Some(code), Some(name), Some(team)) = (parts.next(), parts.next(), parts.next()) else {
        return Err(malformed("expected <code>_<name>_<team>"));
    };

    let code = DriverCode::new(code.trim()).map_err(|_| malformed("driver code is empty"))?;

    Ok(Driver {
        code,
        name: name.trim().to_string(),
        team: team.trim().to_string(),
    })
}
