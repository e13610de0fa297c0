//! Persistence seam for drivers, laps and ingest runs.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::driver::Driver;
use crate::error::StoreError;
use crate::reconcile::Lap;
use crate::types::DriverCode;

/// Record of one committed ingestion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestRun {
    pub id: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub drivers: usize,
    pub laps: usize,
    pub errors: usize,
}

/// Everything an ingestion writes, committed as one unit.
#[derive(Debug, Clone, Copy)]
pub struct CommitBatch<'a> {
    pub run: &'a IngestRun,
    /// Upserted by code; existing drivers not in the batch are kept.
    pub drivers: &'a [Driver],
    /// Replaces every stored lap.
    pub laps: &'a [Lap],
}

/// Full contents of a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredRace {
    pub drivers: Vec<Driver>,
    pub laps: Vec<Lap>,
}

/// Durable storage for race data.
///
/// Implementations must apply a [`CommitBatch`] atomically: after an error,
/// the store holds exactly what it held before the call.
pub trait RaceStore: Send {
    /// Upserts drivers, replaces laps and records the run.
    fn commit(&mut self, batch: &CommitBatch<'_>) -> Result<(), StoreError>;

    /// Returns every driver and lap.
    fn scan(&self) -> Result<StoredRace, StoreError>;

    /// Returns the most recently committed run.
    fn last_run(&self) -> Result<Option<IngestRun>, StoreError>;
}

/// A store that keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    drivers: BTreeMap<DriverCode, Driver>,
    laps: Vec<Lap>,
    last_run: Option<IngestRun>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RaceStore for MemoryStore {
    fn commit(&mut self, batch: &CommitBatch<'_>) -> Result<(), StoreError> {
        for driver in batch.drivers {
            self.drivers.insert(driver.code.clone(), driver.clone());
        }
        self.laps = batch.laps.to_vec();
        self.last_run = Some(batch.run.clone());
        Ok(())
    }

    fn scan(&self) -> Result<StoredRace, StoreError> {
        Ok(StoredRace {
            drivers: self.drivers.values().cloned().collect(),
            laps: self.laps.clone(),
        })
    }

    fn last_run(&self) -> Result<Option<IngestRun>, StoreError> {
        Ok(self.last_run.clone())
    }
}
