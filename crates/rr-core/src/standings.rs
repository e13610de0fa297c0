//! Immutable snapshot of drivers and their ranked laps.
//!
//! A [`Standings`] value never changes after construction. The engine swaps
//! whole snapshots, so a reader holding one always sees a complete set.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use crate::driver::Driver;
use crate::error::QueryError;
use crate::ranking::SortOrder;
use crate::reconcile::Lap;
use crate::types::DriverCode;

/// A lap result as exposed to consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResultView {
    pub code: String,
    pub name: String,
    pub team: String,
    /// Lap time as `HH:MM:SS.ffffff`.
    pub duration: String,
}

/// A driver with their lap time, if one was reconciled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DriverView {
    pub code: String,
    pub name: String,
    pub team: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
}

/// Drivers and laps at one point in time.
#[derive(Debug, Clone, Default)]
pub struct Standings {
    drivers: BTreeMap<DriverCode, Driver>,
    /// Laps ordered by duration, then driver code.
    ranked: Vec<Lap>,
    positions: HashMap<DriverCode, usize>,
}

impl Standings {
    /// Builds standings, dropping any lap whose driver is unknown.
    pub fn new(drivers: impl IntoIterator<Item = Driver>, laps: Vec<Lap>) -> Self {
        let drivers: BTreeMap<_, _> = drivers
            .into_iter()
            .map(|driver| (driver.code.clone(), driver))
            .collect();

        let mut unique: BTreeMap<DriverCode, Lap> = BTreeMap::new();
        for lap in laps {
            if !drivers.contains_key(&lap.driver) {
                tracing::warn!(code = %lap.driver, "dropping lap without a driver record");
                continue;
            }
            unique.entry(lap.driver.clone()).or_insert(lap);
        }
        let mut ranked: Vec<Lap> = unique.into_values().collect();
        ranked.sort_by(|a, b| {
            a.duration
                .cmp(&b.duration)
                .then_with(|| a.driver.cmp(&b.driver))
        });

        let positions = ranked
            .iter()
            .enumerate()
            .map(|(idx, lap)| (lap.driver.clone(), idx))
            .collect();

        Self {
            drivers,
            ranked,
            positions,
        }
    }

    /// Standings after a new ingestion: drivers are upserted by code, laps replaced.
    pub fn upsert(&self, drivers: &[Driver], laps: Vec<Lap>) -> Self {
        let mut merged = self.drivers.clone();
        for driver in drivers {
            merged.insert(driver.code.clone(), driver.clone());
        }
        Self::new(merged.into_values(), laps)
    }

    pub fn driver_count(&self) -> usize {
        self.drivers.len()
    }

    pub fn lap_count(&self) -> usize {
        self.ranked.len()
    }

    /// Laps ordered fastest first.
    pub fn laps(&self) -> &[Lap] {
        &self.ranked
    }

    /// All laps in the requested order.
    ///
    /// Descending is exactly the reverse of ascending, ties included.
    pub fn ranked(&self, order: SortOrder) -> Vec<ResultView> {
        let views = self.ranked.iter().filter_map(|lap| self.view(lap));
        match order {
            SortOrder::Ascending => views.collect(),
            SortOrder::Descending => views.rev().collect(),
        }
    }

    /// Looks up one driver's result.
    pub fn result(&self, code: &str) -> Result<ResultView, QueryError> {
        if !self.drivers.contains_key(code) {
            return Err(QueryError::DriverNotFound {
                code: code.to_string(),
            });
        }
        self.positions
            .get(code)
            .and_then(|&idx| self.view(&self.ranked[idx]))
            .ok_or_else(|| QueryError::ResultNotReady {
                code: code.to_string(),
            })
    }

    /// 1-based position of a driver in ascending order.
    pub fn position(&self, code: &str) -> Option<usize> {
        self.positions.get(code).map(|idx| idx + 1)
    }

    /// Every known driver ordered by code.
    pub fn drivers(&self) -> Vec<DriverView> {
        self.drivers
            .values()
            .map(|driver| DriverView {
                code: driver.code.to_string(),
                name: driver.name.clone(),
                team: driver.team.clone(),
                duration: self
                    .positions
                    .get(&driver.code)
                    .map(|&idx| self.ranked[idx].duration.to_string()),
            })
            .collect()
    }

    fn view(&self, lap: &Lap) -> Option<ResultView> {
        let driver = self.drivers.get(&lap.driver)?;
        Some(ResultView {
            code: driver.code.to_string(),
            name: driver.name.clone(),
            team: driver.team.clone(),
            duration: lap.duration.to_string(),
        })
    }
}
