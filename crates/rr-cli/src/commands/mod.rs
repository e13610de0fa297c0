//! CLI subcommand implementations.

pub mod driver;
pub mod drivers;
pub mod ingest;
pub mod report;
pub mod status;
