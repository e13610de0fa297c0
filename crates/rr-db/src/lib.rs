//! Storage layer for race reports.
//!
//! Provides persistence for drivers, reconciled laps and ingest runs using
//! `rusqlite`, exposed to the engine through [`rr_core::RaceStore`].
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! `rr_core::RaceEngine` keeps it behind a mutex, which is all the
//! synchronization it needs.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Lap timestamps come from the race logs and carry no timezone. They are
//! stored as TEXT like `2018-05-24T12:02:58.917000` (always six fractional
//! digits) so lexicographic order matches chronological order. Ingest run
//! timestamps are UTC and stored as RFC 3339 with microseconds.
//!
//! ## Durations
//!
//! `laps.duration_us` holds the lap time in whole microseconds. Rendering to
//! `HH:MM:SS.ffffff` happens in `rr-core`, never in SQL.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use rusqlite::{Connection, OptionalExtension, params};
use thiserror::Error;

use rr_core::{
    CommitBatch, Driver, DriverCode, IngestRun, Lap, LapTime, RaceStore, StoreError, StoredRace,
    ValidationError,
};

/// How long a statement waits on a locked database before failing.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

const LAP_TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored timestamp could not be parsed.
    #[error("invalid timestamp in {table}: {timestamp}")]
    TimestampParse {
        table: &'static str,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored row violates a domain invariant.
    #[error("invalid row in {table}: {source}")]
    InvalidRow {
        table: &'static str,
        #[source]
        source: ValidationError,
    },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        Self::open_with_timeout(path, DEFAULT_BUSY_TIMEOUT)
    }

    /// Opens a database with an explicit busy timeout.
    pub fn open_with_timeout(path: &Path, busy_timeout: Duration) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        let db = Self { conn };
        db.init()?;
        tracing::debug!(path = %path.display(), ?busy_timeout, "opened database");
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS drivers (
                code TEXT PRIMARY KEY,
                name TEXT NOT NULL,
                team TEXT NOT NULL
            );

            -- Laps table: one reconciled lap per driver, replaced on every ingest
            -- start_time/end_time: log time after repair, end_time >= start_time
            -- duration_us: lap time in microseconds
            CREATE TABLE IF NOT EXISTS laps (
                driver_code TEXT PRIMARY KEY,
                start_time TEXT NOT NULL,
                end_time TEXT NOT NULL,
                duration_us INTEGER NOT NULL CHECK (duration_us >= 0),
                repaired INTEGER NOT NULL DEFAULT 0,
                FOREIGN KEY (driver_code) REFERENCES drivers(code) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_laps_duration ON laps(duration_us);

            CREATE TABLE IF NOT EXISTS ingest_runs (
                id TEXT PRIMARY KEY,
                started_at TEXT NOT NULL,
                finished_at TEXT NOT NULL,
                drivers INTEGER NOT NULL,
                laps INTEGER NOT NULL,
                errors INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_ingest_runs_finished ON ingest_runs(finished_at);
            ",
        )?;
        Ok(())
    }

    /// Upserts drivers, replaces all laps and records the run in one transaction.
    pub fn commit_race(&mut self, batch: &CommitBatch<'_>) -> Result<(), DbError> {
        let tx = self.conn.transaction()?;
        {
            let mut driver_stmt = tx.prepare(
                "
                INSERT INTO drivers (code, name, team)
                VALUES (?, ?, ?)
                ON CONFLICT(code) DO UPDATE SET
                    name = excluded.name,
                    team = excluded.team
                ",
            )?;
            for driver in batch.drivers {
                driver_stmt.execute(params![driver.code.as_str(), driver.name, driver.team])?;
            }

            tx.execute("DELETE FROM laps", [])?;
            let mut lap_stmt = tx.prepare(
                "
                INSERT INTO laps (driver_code, start_time, end_time, duration_us, repaired)
                VALUES (?, ?, ?, ?, ?)
                ",
            )?;
            for lap in batch.laps {
                lap_stmt.execute(params![
                    lap.driver.as_str(),
                    format_lap_timestamp(lap.start_time),
                    format_lap_timestamp(lap.end_time),
                    lap.duration.as_micros(),
                    lap.repaired,
                ])?;
            }

            let run = batch.run;
            tx.execute(
                "
                INSERT INTO ingest_runs (id, started_at, finished_at, drivers, laps, errors)
                VALUES (?, ?, ?, ?, ?, ?)
                ",
                params![
                    run.id,
                    format_run_timestamp(run.started_at),
                    format_run_timestamp(run.finished_at),
                    run.drivers,
                    run.laps,
                    run.errors,
                ],
            )?;
        }
        tx.commit()?;
        tracing::debug!(
            drivers = batch.drivers.len(),
            laps = batch.laps.len(),
            run_id = %batch.run.id,
            "committed race data"
        );
        Ok(())
    }

    /// Lists drivers ordered by code.
    pub fn list_drivers(&self) -> Result<Vec<Driver>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT code, name, team FROM drivers ORDER BY code ASC")?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut drivers = Vec::new();
        for row in rows {
            let (code, name, team) = row?;
            drivers.push(Driver {
                code: parse_code(code, "drivers")?,
                name,
                team,
            });
        }
        Ok(drivers)
    }

    /// Lists laps ordered by driver code.
    pub fn list_laps(&self) -> Result<Vec<Lap>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT driver_code, start_time, end_time, duration_us, repaired
            FROM laps
            ORDER BY driver_code ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(LapRow {
                driver_code: row.get(0)?,
                start_time: row.get(1)?,
                end_time: row.get(2)?,
                duration_us: row.get(3)?,
                repaired: row.get(4)?,
            })
        })?;
        let mut laps = Vec::new();
        for row in rows {
            laps.push(row?.into_lap()?);
        }
        Ok(laps)
    }

    /// Returns the most recently finished ingest run.
    pub fn last_ingest_run(&self) -> Result<Option<IngestRun>, DbError> {
        let row = self
            .conn
            .query_row(
                "
                SELECT id, started_at, finished_at, drivers, laps, errors
                FROM ingest_runs
                ORDER BY finished_at DESC, rowid DESC
                LIMIT 1
                ",
                [],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, usize>(3)?,
                        row.get::<_, usize>(4)?,
                        row.get::<_, usize>(5)?,
                    ))
                },
            )
            .optional()?;
        let Some((id, started_at, finished_at, drivers, laps, errors)) = row else {
            return Ok(None);
        };
        Ok(Some(IngestRun {
            id,
            started_at: parse_run_timestamp(&started_at)?,
            finished_at: parse_run_timestamp(&finished_at)?,
            drivers,
            laps,
            errors,
        }))
    }
}

impl RaceStore for Database {
    fn commit(&mut self, batch: &CommitBatch<'_>) -> Result<(), StoreError> {
        self.commit_race(batch).map_err(Into::into)
    }

    fn scan(&self) -> Result<StoredRace, StoreError> {
        Ok(StoredRace {
            drivers: self.list_drivers()?,
            laps: self.list_laps()?,
        })
    }

    fn last_run(&self) -> Result<Option<IngestRun>, StoreError> {
        self.last_ingest_run().map_err(Into::into)
    }
}

struct LapRow {
    driver_code: String,
    start_time: String,
    end_time: String,
    duration_us: i64,
    repaired: bool,
}

impl LapRow {
    fn into_lap(self) -> Result<Lap, DbError> {
        let duration = LapTime::from_micros(self.duration_us)
            .map_err(|source| DbError::InvalidRow {
                table: "laps",
                source,
            })?;
        Ok(Lap {
            driver: parse_code(self.driver_code, "laps")?,
            start_time: parse_lap_timestamp(&self.start_time)?,
            end_time: parse_lap_timestamp(&self.end_time)?,
            duration,
            repaired: self.repaired,
        })
    }
}

fn parse_code(code: String, table: &'static str) -> Result<DriverCode, DbError> {
    DriverCode::new(code).map_err(|source| DbError::InvalidRow { table, source })
}

fn format_lap_timestamp(timestamp: NaiveDateTime) -> String {
    timestamp.format(LAP_TIMESTAMP_FORMAT).to_string()
}

fn parse_lap_timestamp(timestamp: &str) -> Result<NaiveDateTime, DbError> {
    NaiveDateTime::parse_from_str(timestamp, LAP_TIMESTAMP_FORMAT).map_err(|source| {
        DbError::TimestampParse {
            table: "laps",
            timestamp: timestamp.to_string(),
            source,
        }
    })
}

fn format_run_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_run_timestamp(timestamp: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            table: "ingest_runs",
            timestamp: timestamp.to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::{NaiveDate, TimeDelta, TimeZone};
    use rr_core::{MemorySource, RaceEngine, RaceSources, SortOrder};

    fn driver(code: &str, name: &str, team: &str) -> Driver {
        Driver {
            code: DriverCode::new(code).unwrap(),
            name: name.to_string(),
            team: team.to_string(),
        }
    }

    fn lap(code: &str, micros: i64) -> Lap {
        let start = NaiveDate::from_ymd_opt(2018, 5, 24)
            .unwrap()
            .and_hms_micro_opt(12, 2, 58, 917_000)
            .unwrap();
        Lap {
            driver: DriverCode::new(code).unwrap(),
            start_time: start,
            end_time: start + TimeDelta::microseconds(micros),
            duration: LapTime::from_micros(micros).unwrap(),
            repaired: false,
        }
    }

    fn run(id: &str, minute: u32) -> IngestRun {
        let at = Utc.with_ymd_and_hms(2025, 1, 1, 0, minute, 0).unwrap();
        IngestRun {
            id: id.to_string(),
            started_at: at,
            finished_at: at,
            drivers: 2,
            laps: 1,
            errors: 0,
        }
    }

    fn commit(
        db: &mut Database,
        run: &IngestRun,
        drivers: &[Driver],
        laps: &[Lap],
    ) -> Result<(), DbError> {
        db.commit_race(&CommitBatch { run, drivers, laps })
    }

    fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .expect("prepare table_info");
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query table_info");
        rows.map(|row| row.expect("table_info row")).collect()
    }

    #[test]
    fn open_in_memory_database() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn schema_matches_data_model() {
        let db = Database::open_in_memory().expect("open in-memory db");

        assert_eq!(
            table_columns(&db.conn, "drivers"),
            vec!["code", "name", "team"]
        );
        assert_eq!(
            table_columns(&db.conn, "laps"),
            vec![
                "driver_code",
                "start_time",
                "end_time",
                "duration_us",
                "repaired"
            ]
        );
        assert_eq!(
            table_columns(&db.conn, "ingest_runs"),
            vec![
                "id",
                "started_at",
                "finished_at",
                "drivers",
                "laps",
                "errors"
            ]
        );
    }

    #[test]
    fn commit_then_scan_returns_rows() {
        let mut db = Database::open_in_memory().unwrap();
        let drivers = [
            driver("SVF", "Sebastian Vettel", "FERRARI"),
            driver("LHM", "Lewis Hamilton", "MERCEDES"),
        ];
        let laps = [lap("SVF", 64_415_000)];
        commit(&mut db, &run("run-1", 0), &drivers, &laps).unwrap();

        let race = db.scan().unwrap();
        assert_eq!(race.drivers.len(), 2);
        assert_eq!(race.drivers[0].code.as_str(), "LHM");
        assert_eq!(race.laps, laps);
    }

    #[test]
    fn drivers_are_upserted_by_code() {
        let mut db = Database::open_in_memory().unwrap();
        commit(
            &mut db,
            &run("run-1", 0),
            &[driver("SVF", "Sebastian Vettel", "FERRARI")],
            &[],
        )
        .unwrap();
        commit(
            &mut db,
            &run("run-2", 1),
            &[driver("SVF", "Sebastian Vettel", "ASTON MARTIN")],
            &[],
        )
        .unwrap();

        let drivers = db.list_drivers().unwrap();
        assert_eq!(drivers.len(), 1);
        assert_eq!(drivers[0].team, "ASTON MARTIN");
    }

    #[test]
    fn commit_replaces_laps() {
        let mut db = Database::open_in_memory().unwrap();
        let drivers = [
            driver("SVF", "Sebastian Vettel", "FERRARI"),
            driver("LHM", "Lewis Hamilton", "MERCEDES"),
        ];
        let first = [lap("SVF", 1), lap("LHM", 2)];
        commit(&mut db, &run("run-1", 0), &drivers, &first).unwrap();
        commit(&mut db, &run("run-2", 1), &drivers, &[lap("LHM", 3)]).unwrap();

        let laps = db.list_laps().unwrap();
        assert_eq!(laps, vec![lap("LHM", 3)]);
    }

    #[test]
    fn failed_commit_rolls_back() {
        let mut db = Database::open_in_memory().unwrap();
        let drivers = [driver("SVF", "Sebastian Vettel", "FERRARI")];
        commit(&mut db, &run("run-1", 0), &drivers, &[lap("SVF", 1)]).unwrap();

        let result = commit(
            &mut db,
            &run("run-2", 1),
            &[driver("LHM", "Lewis Hamilton", "MERCEDES")],
            &[lap("ZZZ", 5)],
        );
        assert!(matches!(result, Err(DbError::Sqlite(_))));

        let race = db.scan().unwrap();
        assert_eq!(race.drivers, drivers);
        assert_eq!(race.laps, vec![lap("SVF", 1)]);
        assert_eq!(db.last_ingest_run().unwrap().unwrap().id, "run-1");
    }

    #[test]
    fn last_ingest_run_is_most_recent() {
        let mut db = Database::open_in_memory().unwrap();
        assert_eq!(db.last_ingest_run().unwrap(), None);

        commit(&mut db, &run("run-1", 0), &[], &[]).unwrap();
        commit(&mut db, &run("run-2", 5), &[], &[]).unwrap();

        let last = db.last_ingest_run().unwrap().unwrap();
        assert_eq!(last, run("run-2", 5));
    }

    #[test]
    fn lap_timestamps_keep_microseconds() {
        let stored = format_lap_timestamp(lap("SVF", 1).end_time);
        assert_eq!(stored, "2018-05-24T12:02:58.917001");
        let parsed = parse_lap_timestamp(&stored).unwrap();
        assert_eq!(parsed, lap("SVF", 1).end_time);
    }

    #[test]
    fn engine_state_survives_reopen() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("rr.db");
        let sources = RaceSources::new(
            MemorySource::new(
                "abbreviations",
                "SVF_Sebastian Vettel_FERRARI\nLHM_Lewis Hamilton_MERCEDES\n",
            ),
            MemorySource::new(
                "start",
                "SVF2018-05-24_12:02:58.917\nLHM2018-05-24_12:18:20.125\n",
            ),
            MemorySource::new(
                "end",
                "SVF2018-05-24_12:04:03.332\nLHM2018-05-24_12:11:32.585\n",
            ),
        );

        let expected = {
            let engine = RaceEngine::open(Database::open(&path).unwrap()).unwrap();
            engine.ingest(&sources).unwrap();
            engine.list_results(SortOrder::Ascending)
        };

        let engine = RaceEngine::open(Database::open(&path).unwrap()).unwrap();
        assert_eq!(engine.list_results(SortOrder::Ascending), expected);
        assert_eq!(expected[0].code, "SVF");
        assert_eq!(expected[0].duration, "00:01:04.415000");
        assert_eq!(expected[1].duration, "00:06:47.540000");
        assert_eq!(engine.last_run().unwrap().unwrap().laps, 2);
    }

    #[test]
    fn reingesting_is_idempotent_on_disk() {
        let temp = tempfile::tempdir().unwrap();
        let path = temp.path().join("rr.db");
        let sources = RaceSources::new(
            MemorySource::new("abbreviations", "SVF_Sebastian Vettel_FERRARI\n"),
            MemorySource::new("start", "SVF2023-01-01_12:00:00.000000\n"),
            MemorySource::new("end", "SVF2023-01-01_12:01:30.500000\n"),
        );

        let engine = RaceEngine::open(Database::open(&path).unwrap()).unwrap();
        engine.ingest(&sources).unwrap();
        let first = engine.standings();
        engine.ingest(&sources).unwrap();

        let db = engine.into_store();
        assert_eq!(db.list_laps().unwrap(), first.laps());
    }
}
