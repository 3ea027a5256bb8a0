//! The orchestrator.
//!
//! [`SchemaSync`] sequences a run: load the previous schema, run the
//! removal (or, for rollback, the added-table) pass, reconcile each desired
//! table, then persist a snapshot. Every failure, including a panic raised
//! inside a driver, passes through one funnel that logs it and returns a
//! single [`Error`]. Failures after the run has started are wrapped in
//! [`Error::Failed`] naming the phase and the operations already applied.
//!
//! Runs are not locked against each other; callers must not run two
//! synchronize or rollback calls against the same database concurrently.

use std::{any::Any, future::Future, panic::AssertUnwindSafe};

use futures::FutureExt;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::{
  Error, Result,
  database::Database,
  history::{DEFAULT_TRACKING_TABLE, HistoryStore, SchemaSnapshot, SnapshotSummary},
  operation::{Phase, SyncReport},
  reconcile::Reconciler,
  schema::{self, TableDefinition},
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOptions {
  /// Name of the table holding schema snapshots.
  pub tracking_table: String,
  /// Record operations without executing them or writing a snapshot.
  pub dry_run:        bool,
}

impl Default for SyncOptions {
  fn default() -> Self {
    Self {
      tracking_table: DEFAULT_TRACKING_TABLE.to_owned(),
      dry_run:        false,
    }
  }
}

/// Declarative schema synchronization over one injected connection.
pub struct SchemaSync<D> {
  db:      D,
  options: SyncOptions,
}

impl<D: Database> SchemaSync<D> {
  pub fn new(db: D) -> Self { Self::with_options(db, SyncOptions::default()) }

  pub fn with_options(db: D, options: SyncOptions) -> Self { Self { db, options } }

  pub fn database(&self) -> &D { &self.db }

  pub fn options(&self) -> &SyncOptions { &self.options }

  pub fn into_inner(self) -> D { self.db }

  fn store(&self) -> Result<HistoryStore<'_, D>> {
    HistoryStore::new(&self.db, self.options.tracking_table.as_str())
  }

  // ── Public operations ────────────────────────────────────────────────────

  /// Converge the live database onto `desired`.
  ///
  /// `previous` is the schema to diff against for table removals; pass an
  /// empty slice to use the latest stored snapshot.
  pub async fn synchronize(
    &self,
    desired: &[TableDefinition],
    previous: &[TableDefinition],
  ) -> Result<SyncReport> {
    let dry_run = self.options.dry_run;
    let report =
      funnel("synchronize", self.run_synchronize(desired, previous, dry_run)).await?;
    Ok(summarize("synchronize", report))
  }

  /// The operations [`synchronize`](Self::synchronize) would apply, without
  /// executing any DDL or writing a snapshot.
  pub async fn plan(
    &self,
    desired: &[TableDefinition],
    previous: &[TableDefinition],
  ) -> Result<SyncReport> {
    let report = funnel("plan", self.run_synchronize(desired, previous, true)).await?;
    Ok(summarize("plan", report))
  }

  /// Drop tables in `desired` that `previous` does not name, then record
  /// `previous` as the latest snapshot.
  ///
  /// With an empty `previous` the latest stored snapshot is the reference.
  pub async fn rollback(
    &self,
    desired: &[TableDefinition],
    previous: &[TableDefinition],
  ) -> Result<SyncReport> {
    let dry_run = self.options.dry_run;
    let report =
      funnel("rollback", self.run_rollback(desired, previous, dry_run)).await?;
    Ok(summarize("rollback", report))
  }

  /// The schema the next run would diff against.
  pub async fn previous_schema(
    &self,
    explicit: &[TableDefinition],
  ) -> Result<Vec<TableDefinition>> {
    funnel("previous_schema", async {
      self.store()?.previous_schema(explicit).await
    })
    .await
  }

  /// All stored snapshots, oldest first.
  pub async fn history(&self) -> Result<Vec<SnapshotSummary>> {
    funnel("history", async { self.store()?.list().await }).await
  }

  pub async fn snapshot(&self, id: i64) -> Result<Option<SchemaSnapshot>> {
    funnel("snapshot", async { self.store()?.snapshot(id).await }).await
  }

  // ── Runs ─────────────────────────────────────────────────────────────────

  async fn run_synchronize(
    &self,
    desired: &[TableDefinition],
    previous: &[TableDefinition],
    dry_run: bool,
  ) -> Result<SyncReport> {
    schema::validate(desired)?;
    let history = self.store()?;
    let mut reconciler = Reconciler::new(&self.db, dry_run)?;

    let loaded = load_previous(&history, previous, dry_run).await;
    let previous = loaded.map_err(|e| reconciler.fail(Phase::LoadPreviousSchema, e))?;

    let result = reconciler.drop_removed_tables(desired, &previous).await;
    result.map_err(|e| reconciler.fail(Phase::DropRemovedTables, e))?;

    for table in desired {
      let result = reconciler.reconcile_table(table).await;
      result.map_err(|e| reconciler.fail(Phase::PerTableReconciliation, e))?;
    }

    persist(&history, reconciler, desired, dry_run).await
  }

  async fn run_rollback(
    &self,
    desired: &[TableDefinition],
    previous: &[TableDefinition],
    dry_run: bool,
  ) -> Result<SyncReport> {
    schema::validate(desired)?;
    let history = self.store()?;
    let mut reconciler = Reconciler::new(&self.db, dry_run)?;

    let loaded = load_previous(&history, previous, dry_run).await;
    let previous = loaded.map_err(|e| reconciler.fail(Phase::LoadPreviousSchema, e))?;
    if previous.is_empty() {
      warn!("no previous schema recorded; rollback drops every desired table");
    }

    let result = reconciler.drop_added_tables(desired, &previous).await;
    result.map_err(|e| reconciler.fail(Phase::DropAddedTables, e))?;

    persist(&history, reconciler, &previous, dry_run).await
  }
}

async fn load_previous<D: Database>(
  history: &HistoryStore<'_, D>,
  explicit: &[TableDefinition],
  dry_run: bool,
) -> Result<Vec<TableDefinition>> {
  if dry_run {
    history.peek_previous_schema(explicit).await
  } else {
    history.previous_schema(explicit).await
  }
}

async fn persist<D: Database>(
  history: &HistoryStore<'_, D>,
  reconciler: Reconciler<'_, D>,
  schema: &[TableDefinition],
  dry_run: bool,
) -> Result<SyncReport> {
  let snapshot_id = if dry_run {
    None
  } else {
    let saved = history.save(schema).await;
    Some(saved.map_err(|e| reconciler.fail(Phase::PersistSnapshot, e))?)
  };

  Ok(SyncReport {
    operations: reconciler.into_applied(),
    snapshot_id,
    dry_run,
  })
}

// ─── Failure funnel ──────────────────────────────────────────────────────────

async fn funnel<T, F>(action: &'static str, run: F) -> Result<T>
where
  F: Future<Output = Result<T>>,
{
  let span = info_span!("schema", action);
  let outcome = AssertUnwindSafe(run).catch_unwind().instrument(span).await;

  match outcome {
    Ok(Ok(value)) => {
      debug!(action, "finished");
      Ok(value)
    }
    Ok(Err(error)) => {
      match &error {
        Error::Failed { phase, applied, .. } => error!(
          action,
          %phase,
          applied = applied.len(),
          %error,
          "schema run failed"
        ),
        _ => error!(action, %error, "schema run failed"),
      }
      Err(error)
    }
    Err(payload) => {
      let error = Error::Defect(panic_message(payload.as_ref()));
      error!(action, %error, "schema run panicked");
      Err(error)
    }
  }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
  if let Some(s) = payload.downcast_ref::<&str>() {
    (*s).to_owned()
  } else if let Some(s) = payload.downcast_ref::<String>() {
    s.clone()
  } else {
    "panic with non-string payload".to_owned()
  }
}

fn summarize(action: &str, report: SyncReport) -> SyncReport {
  info!(
    action,
    operations = report.operations.len(),
    snapshot_id = ?report.snapshot_id,
    dry_run = report.dry_run,
    "schema run complete"
  );
  report
}
