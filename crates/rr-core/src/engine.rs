//! Ingestion pipeline and query entry points.
//!
//! # Concurrency
//!
//! [`RaceEngine`] is `Sync` when its store is `Send`:
//! - Ingestion holds the store mutex from the first line read until the new
//!   standings are published, so overlapping calls run one after another.
//! - Queries clone the current `Arc<Standings>` under a short read lock and
//!   never wait for an ingestion to finish.
//! - Publishing replaces the `Arc` in one step. A reader sees the previous
//!   complete set or the next one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{IngestError, LineError, QueryError, StoreError};
use crate::event::EventKind;
use crate::ranking::SortOrder;
use crate::reader::{Line, RaceSources, SourceKind, read_lines};
use crate::reconcile::{ReconcileStats, Reconciler};
use crate::standings::{DriverView, ResultView, Standings};
use crate::store::{CommitBatch, IngestRun, RaceStore};

/// Cooperative cancellation flag for an ingestion run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Outcome of a committed ingestion.
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub run_id: String,
    pub stats: ReconcileStats,
    /// Lines that were skipped. Never fatal.
    #[serde(serialize_with = "serialize_errors")]
    pub errors: Vec<LineError>,
}

impl IngestReport {
    /// True when no line was skipped.
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

fn serialize_errors<S>(errors: &[LineError], serializer: S) -> Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.collect_seq(errors.iter().map(ToString::to_string))
}

/// Reconciliation engine bound to a store.
pub struct RaceEngine<S> {
    store: Mutex<S>,
    standings: RwLock<Arc<Standings>>,
}

impl<S: RaceStore> RaceEngine<S> {
    /// Creates an engine and loads the standings already in the store.
    pub fn open(store: S) -> Result<Self, StoreError> {
        let stored = store.scan()?;
        tracing::debug!(
            drivers = stored.drivers.len(),
            laps = stored.laps.len(),
            "loaded stored standings"
        );
        let standings = Standings::new(stored.drivers, stored.laps);
        Ok(Self {
            store: Mutex::new(store),
            standings: RwLock::new(Arc::new(standings)),
        })
    }

    /// Runs a full ingestion: read, parse, reconcile, commit, publish.
    pub fn ingest(&self, sources: &RaceSources) -> Result<IngestReport, IngestError> {
        self.ingest_with_cancel(sources, &CancelToken::new())
    }

    /// Like [`ingest`](Self::ingest), but stops before committing once `cancel` is set.
    ///
    /// A cancelled or failed run leaves the store and the published standings untouched.
    pub fn ingest_with_cancel(
        &self,
        sources: &RaceSources,
        cancel: &CancelToken,
    ) -> Result<IngestReport, IngestError> {
        let mut store = self.lock_store();
        let started_at = Utc::now();
        let run_id = Uuid::new_v4().to_string();
        let span = tracing::info_span!("ingest", run_id = %run_id);
        let _guard = span.enter();

        let mut reconciler = Reconciler::new();
        for_each_line(sources, SourceKind::Abbreviations, cancel, |line| {
            reconciler.add_abbreviation(line);
        })?;
        for_each_line(sources, SourceKind::StartLog, cancel, |line| {
            reconciler.add_event(line, EventKind::Start);
        })?;
        for_each_line(sources, SourceKind::EndLog, cancel, |line| {
            reconciler.add_event(line, EventKind::End);
        })?;
        let reconciliation = reconciler.finish();

        if cancel.is_cancelled() {
            tracing::info!("ingestion cancelled before commit");
            return Err(IngestError::Cancelled);
        }

        let run = IngestRun {
            id: run_id.clone(),
            started_at,
            finished_at: Utc::now(),
            drivers: reconciliation.drivers.len(),
            laps: reconciliation.laps.len(),
            errors: reconciliation.errors.len(),
        };
        store
            .commit(&CommitBatch {
                run: &run,
                drivers: &reconciliation.drivers,
                laps: &reconciliation.laps,
            })
            .map_err(IngestError::Store)?;

        let next = self
            .standings()
            .upsert(&reconciliation.drivers, reconciliation.laps);
        *self
            .standings
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Arc::new(next);

        tracing::info!(
            drivers = reconciliation.stats.drivers,
            laps = reconciliation.stats.laps,
            repaired = reconciliation.stats.repaired,
            errors = reconciliation.errors.len(),
            "ingestion committed"
        );

        Ok(IngestReport {
            run_id,
            stats: reconciliation.stats,
            errors: reconciliation.errors,
        })
    }

    /// The current snapshot.
    pub fn standings(&self) -> Arc<Standings> {
        Arc::clone(
            &self
                .standings
                .read()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }

    /// All results ranked by lap time.
    pub fn list_results(&self, order: SortOrder) -> Vec<ResultView> {
        self.standings().ranked(order)
    }

    /// All results ranked by lap time, with the order given as text.
    pub fn list_results_by(&self, order: &str) -> Result<Vec<ResultView>, QueryError> {
        let order: SortOrder = order.parse()?;
        Ok(self.list_results(order))
    }

    /// One driver's result.
    pub fn get_result(&self, code: &str) -> Result<ResultView, QueryError> {
        self.standings().result(code)
    }

    /// Every known driver, ordered by code.
    pub fn list_drivers(&self) -> Vec<DriverView> {
        self.standings().drivers()
    }

    /// The most recent committed ingestion, if any.
    pub fn last_run(&self) -> Result<Option<IngestRun>, StoreError> {
        self.lock_store().last_run()
    }

    /// Releases the engine and returns its store.
    pub fn into_store(self) -> S {
        self.store
            .into_inner()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_store(&self) -> MutexGuard<'_, S> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Feeds every line of one source to `f`, checking for cancellation first.
fn for_each_line(
    sources: &RaceSources,
    kind: SourceKind,
    cancel: &CancelToken,
    mut f: impl FnMut(&Line),
) -> Result<(), IngestError> {
    if cancel.is_cancelled() {
        return Err(IngestError::Cancelled);
    }
    let source = sources.get(kind);
    let unavailable = |source_err| IngestError::SourceUnavailable {
        kind,
        location: source.location(),
        source: source_err,
    };

    let mut count = 0_usize;
    for line in read_lines(source).map_err(unavailable)? {
        f(&line.map_err(unavailable)?);
        count += 1;
    }
    tracing::debug!(%kind, lines = count, "read source");
    Ok(())
}
