//! Error types for ingestion and queries.
//!
//! Errors fall into three groups:
//! - [`RecordError`]: a single malformed or dangling line. Collected into the
//!   ingest report, never fatal.
//! - [`IngestError`]: the ingestion run as a whole could not complete. The
//!   previously committed standings stay in place.
//! - [`QueryError`]: a read against the current standings was rejected.

use std::io;

use thiserror::Error;

use crate::event::EventKind;
use crate::reader::SourceKind;

/// Boxed error returned by a [`RaceStore`](crate::RaceStore) implementation.
pub type StoreError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// A problem with a single record. The rest of the batch is unaffected.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RecordError {
    /// An abbreviation line did not split into code, name and team.
    #[error("malformed abbreviation {line:?}: {reason}")]
    MalformedAbbreviation { line: String, reason: &'static str },

    /// A log line did not carry a `YYYY-MM-DD_HH:MM:SS.ffffff` timestamp.
    #[error("malformed timestamp {value:?} in {kind} log: {reason}")]
    MalformedTimestamp {
        kind: EventKind,
        value: String,
        reason: String,
    },

    /// A log event referenced a code with no abbreviation entry.
    #[error("unknown driver code {code} in {kind} log")]
    UnknownDriverCode { code: String, kind: EventKind },
}

/// A [`RecordError`] located in its source.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{origin} line {line}: {error}")]
pub struct LineError {
    /// Which of the three sources the line came from.
    pub origin: SourceKind,
    /// 1-based line number within the source.
    pub line: usize,
    #[source]
    pub error: RecordError,
}

/// Failure of an ingestion run as a whole.
#[derive(Debug, Error)]
pub enum IngestError {
    /// A source could not be opened or read.
    #[error("{kind} source unavailable: {location}")]
    SourceUnavailable {
        kind: SourceKind,
        location: String,
        #[source]
        source: io::Error,
    },

    /// The run was cancelled before the new standings were committed.
    #[error("ingestion cancelled before commit")]
    Cancelled,

    /// The store rejected the commit.
    #[error("failed to commit race data")]
    Store(#[source] StoreError),
}

/// A rejected query against the current standings.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Sort order was neither ascending nor descending.
    #[error("invalid sort order {value:?}, use 'asc' or 'desc'")]
    InvalidSortOrder { value: String },

    /// No driver has this code.
    #[error("driver {code} not found")]
    DriverNotFound { code: String },

    /// The driver exists but has no complete start/end pair.
    #[error("driver {code} has no lap result yet")]
    ResultNotReady { code: String },
}
