//! Diff & reconciliation: desired schema vs. live catalog.
//!
//! All work is strictly sequential: each catalog read and each DDL statement
//! is awaited before the next is issued, and the first failure aborts the
//! run. Within a table, additions are applied before removals (columns,
//! index adds, index drops, trigger adds, trigger drops).
//!
//! Columns are add-only. An existing column is never altered or dropped,
//! even when its definition changed; indexes and triggers are fully
//! add/drop diffed by name.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::{
  Error, Result,
  database::{Database, Dialect},
  ddl,
  introspect::Introspector,
  operation::{Operation, Phase},
  schema::{TableDefinition, table_names},
};

/// Executes (or, in a dry run, records) reconciliation operations against
/// one connection, keeping the ordered list of what has been applied.
pub struct Reconciler<'a, D> {
  db:         &'a D,
  introspect: Introspector<'a, D>,
  dry_run:    bool,
  applied:    Vec<Operation>,
}

impl<'a, D: Database> Reconciler<'a, D> {
  pub fn new(db: &'a D, dry_run: bool) -> Result<Self> {
    Ok(Self {
      db,
      introspect: Introspector::new(db)?,
      dry_run,
      applied: vec![],
    })
  }

  pub fn dialect(&self) -> Dialect { self.introspect.dialect() }

  /// Operations applied so far, in order.
  pub fn applied(&self) -> &[Operation] { &self.applied }

  pub fn into_applied(self) -> Vec<Operation> { self.applied }

  /// Wrap `source` with the phase it occurred in and the operations that
  /// had already been applied.
  pub fn fail(&self, phase: Phase, source: Error) -> Error {
    Error::Failed {
      phase,
      applied: self.applied.clone(),
      source: Box::new(source),
    }
  }

  pub(crate) async fn apply(&mut self, op: Operation, sql: String) -> Result<()> {
    self.apply_all(op, vec![sql]).await
  }

  /// Apply one operation that takes several statements. The operation is
  /// recorded only once all of them succeeded.
  pub(crate) async fn apply_all(
    &mut self,
    op: Operation,
    statements: Vec<String>,
  ) -> Result<()> {
    if self.dry_run {
      info!(operation = %op, "planned");
    } else {
      for sql in &statements {
        debug!(%sql, "executing");
        self.db.execute(sql, &[]).await.map_err(Error::sql)?;
      }
      info!(operation = %op, "applied");
    }
    self.applied.push(op);
    Ok(())
  }

  /// Drop `table` if it exists. Returns whether a drop was issued.
  pub(crate) async fn drop_table_if_exists(&mut self, table: &str) -> Result<bool> {
    if !self.introspect.table_exists(table).await? {
      return Ok(false);
    }
    let sql = ddl::drop_table(self.dialect(), table);
    self
      .apply(Operation::DropTable { table: table.to_owned() }, sql)
      .await?;
    Ok(true)
  }

  // ── Removed-table pass ────────────────────────────────────────────────────

  /// Drop every table named in `previous` but absent from `desired`.
  /// Tables already gone are skipped.
  pub async fn drop_removed_tables(
    &mut self,
    desired: &[TableDefinition],
    previous: &[TableDefinition],
  ) -> Result<()> {
    let wanted: HashSet<&str> = table_names(desired).into_iter().collect();

    for name in table_names(previous) {
      if wanted.contains(name) {
        continue;
      }
      if !self.drop_table_if_exists(name).await? {
        info!(table = name, "removed table already absent, skipping");
      }
    }
    Ok(())
  }

  // ── Per-table pass ────────────────────────────────────────────────────────

  /// Converge one desired table.
  pub async fn reconcile_table(&mut self, table: &TableDefinition) -> Result<()> {
    let exists = self.introspect.table_exists(&table.name).await?;

    if table.deprecated {
      if exists {
        let sql = ddl::drop_table(self.dialect(), &table.name);
        self
          .apply(Operation::DropTable { table: table.name.clone() }, sql)
          .await?;
      } else {
        debug!(table = %table.name, "deprecated table already absent");
      }
      return Ok(());
    }

    if !exists {
      return self.create_table(table).await;
    }

    self.add_missing_columns(table).await?;
    self.diff_indexes(table).await?;
    self.diff_triggers(table).await
  }

  async fn create_table(&mut self, table: &TableDefinition) -> Result<()> {
    let dialect = self.dialect();
    let name = &table.name;

    self
      .apply(
        Operation::CreateTable { table: name.clone() },
        ddl::create_table(dialect, table),
      )
      .await?;

    for index in &table.indexes {
      self
        .apply(
          Operation::CreateIndex {
            table: name.clone(),
            index: index.resolved_name(name),
          },
          ddl::create_index(dialect, name, index),
        )
        .await?;
    }

    for trigger in &table.triggers {
      self
        .apply(
          Operation::CreateTrigger {
            table:   name.clone(),
            trigger: trigger.name.clone(),
          },
          ddl::create_trigger(dialect, name, trigger),
        )
        .await?;
    }

    Ok(())
  }

  async fn add_missing_columns(&mut self, table: &TableDefinition) -> Result<()> {
    let live: HashSet<String> = self
      .introspect
      .table_columns(&table.name)
      .await?
      .into_iter()
      .map(|c| c.name)
      .collect();

    for column in table.columns.iter().filter(|c| !live.contains(&c.name)) {
      self
        .apply_all(
          Operation::AddColumn {
            table:  table.name.clone(),
            column: column.name.clone(),
          },
          ddl::add_column(self.dialect(), &table.name, column),
        )
        .await?;
    }
    Ok(())
  }

  async fn diff_indexes(&mut self, table: &TableDefinition) -> Result<()> {
    let name = &table.name;
    let live = self.introspect.table_indexes(name).await?;
    let live_names: HashSet<String> =
      live.iter().filter_map(|i| i.name.clone()).collect();
    let wanted: HashSet<String> =
      table.indexes.iter().map(|i| i.resolved_name(name)).collect();

    for index in &table.indexes {
      let index_name = index.resolved_name(name);
      if live_names.contains(&index_name) {
        continue;
      }
      self
        .apply(
          Operation::CreateIndex { table: name.clone(), index: index_name },
          ddl::create_index(self.dialect(), name, index),
        )
        .await?;
    }

    for index_name in live.into_iter().filter_map(|i| i.name) {
      if wanted.contains(&index_name) {
        continue;
      }
      let sql = ddl::drop_index(self.dialect(), name, &index_name);
      self
        .apply(Operation::DropIndex { table: name.clone(), index: index_name }, sql)
        .await?;
    }
    Ok(())
  }

  async fn diff_triggers(&mut self, table: &TableDefinition) -> Result<()> {
    let name = &table.name;
    let live = self.introspect.table_triggers(name).await?;
    let live_names: HashSet<&str> = live.iter().map(|t| t.name.as_str()).collect();
    let wanted: HashSet<&str> =
      table.triggers.iter().map(|t| t.name.as_str()).collect();

    for trigger in &table.triggers {
      if live_names.contains(trigger.name.as_str()) {
        continue;
      }
      self
        .apply(
          Operation::CreateTrigger {
            table:   name.clone(),
            trigger: trigger.name.clone(),
          },
          ddl::create_trigger(self.dialect(), name, trigger),
        )
        .await?;
    }

    for trigger in live.iter().filter(|t| !wanted.contains(t.name.as_str())) {
      self
        .apply(
          Operation::DropTrigger {
            table:   name.clone(),
            trigger: trigger.name.clone(),
          },
          ddl::drop_trigger(self.dialect(), name, &trigger.name),
        )
        .await?;
    }
    Ok(())
  }
}
