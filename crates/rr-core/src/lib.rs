//! Core domain logic for race reports.
//!
//! This crate contains the fundamental types and logic for:
//! - Reading: trimmed, non-blank lines from the abbreviations and log sources
//! - Parsing: driver identities and start/end timestamps
//! - Reconciliation: pairing events per driver, repairing inverted pairs
//! - Ranking and lookup over an immutable, atomically swapped snapshot

mod driver;
mod engine;
mod error;
mod event;
mod ranking;
pub mod reader;
mod reconcile;
mod standings;
mod store;
mod types;

pub use driver::{Driver, parse_abbreviation};
pub use engine::{CancelToken, IngestReport, RaceEngine};
pub use error::{IngestError, LineError, QueryError, RecordError, StoreError};
pub use event::{EventKind, TIMESTAMP_FORMAT, TimedEvent, parse_log_line, parse_timestamp};
pub use ranking::SortOrder;
pub use reader::{FileSource, MemorySource, RaceSources, SourceKind, TextSource};
pub use reconcile::{Lap, ReconcileStats, Reconciler, Reconciliation, build_lap, repair};
pub use standings::{DriverView, ResultView, Standings};
pub use store::{CommitBatch, IngestRun, MemoryStore, RaceStore, StoredRace};
pub use types::{DriverCode, LapTime, ValidationError};
