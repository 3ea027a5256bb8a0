//! Live catalog introspection.
//!
//! [`Introspector`] resolves the connection's dialect once, at construction,
//! and routes each read to that dialect's catalog queries. Indexes reported
//! here are the explicitly created ones only; primary-key and
//! constraint-backed indexes are filtered out where the catalog allows.

mod mysql;
mod postgres;
mod sqlite;

use tracing::debug;

use crate::{
  Error, Result,
  database::{Database, Dialect, Row, Value},
  schema::{
    ColumnDefinition, ForeignKey, IndexDefinition, ReferentialAction,
    TriggerDefinition, TriggerEvent, TriggerTiming,
  },
};

/// Dialect-aware catalog reader over a borrowed connection.
pub struct Introspector<'a, D> {
  db:      &'a D,
  dialect: Dialect,
}

impl<'a, D: Database> Introspector<'a, D> {
  /// Fails with [`Error::DialectDetermination`] if the connection declares a
  /// dialect we have no catalog queries for.
  pub fn new(db: &'a D) -> Result<Self> {
    let dialect = Dialect::determine(db.dialect_name())?;
    Ok(Self { db, dialect })
  }

  pub fn dialect(&self) -> Dialect { self.dialect }

  pub async fn table_exists(&self, table: &str) -> Result<bool> {
    let exists = match self.dialect {
      Dialect::Sqlite => sqlite::table_exists(self.db, table).await?,
      Dialect::Postgres => postgres::table_exists(self.db, table).await?,
      Dialect::MySql => mysql::table_exists(self.db, table).await?,
    };
    debug!(table, exists, "introspected table existence");
    Ok(exists)
  }

  pub async fn table_columns(&self, table: &str) -> Result<Vec<ColumnDefinition>> {
    let columns = match self.dialect {
      Dialect::Sqlite => sqlite::table_columns(self.db, table).await?,
      Dialect::Postgres => postgres::table_columns(self.db, table).await?,
      Dialect::MySql => mysql::table_columns(self.db, table).await?,
    };
    debug!(table, count = columns.len(), "introspected columns");
    Ok(columns)
  }

  pub async fn table_indexes(&self, table: &str) -> Result<Vec<IndexDefinition>> {
    let indexes = match self.dialect {
      Dialect::Sqlite => sqlite::table_indexes(self.db, table).await?,
      Dialect::Postgres => postgres::table_indexes(self.db, table).await?,
      Dialect::MySql => mysql::table_indexes(self.db, table).await?,
    };
    debug!(table, count = indexes.len(), "introspected indexes");
    Ok(indexes)
  }

  pub async fn table_triggers(
    &self,
    table: &str,
  ) -> Result<Vec<TriggerDefinition>> {
    let triggers = match self.dialect {
      Dialect::Sqlite => sqlite::table_triggers(self.db, table).await?,
      Dialect::Postgres => postgres::table_triggers(self.db, table).await?,
      Dialect::MySql => mysql::table_triggers(self.db, table).await?,
    };
    debug!(table, count = triggers.len(), "introspected triggers");
    Ok(triggers)
  }
}

// ─── Shared helpers ──────────────────────────────────────────────────────────

async fn fetch<D: Database>(
  db: &D,
  sql: &str,
  params: &[Value],
) -> Result<Vec<Row>> {
  db.query(sql, params).await.map_err(Error::sql)
}

/// Fold `(index_name, unique, column_name)` rows, ordered by index then
/// column position, into index definitions.
fn fold_indexes(
  rows: &[Row],
  unique_of: impl Fn(&Row) -> Result<bool>,
) -> Result<Vec<IndexDefinition>> {
  let mut indexes: Vec<IndexDefinition> = vec![];

  for row in rows {
    let name = row.text("index_name")?;
    let column = row.text("column_name")?;

    match indexes.last_mut() {
      Some(last) if last.name.as_deref() == Some(name.as_str()) => {
        last.columns.push(column);
      }
      _ => indexes.push(IndexDefinition {
        name:    Some(name),
        columns: vec![column],
        unique:  unique_of(row)?,
      }),
    }
  }

  Ok(indexes)
}

/// Attach foreign keys from `(column_name, foreign_table, foreign_column,
/// delete_rule)` rows to the matching columns.
fn attach_foreign_keys(columns: &mut [ColumnDefinition], rows: &[Row]) -> Result<()> {
  for row in rows {
    let name = row.text("column_name")?;
    if let Some(column) = columns.iter_mut().find(|c| c.name == name) {
      column.references = Some(ForeignKey {
        table:     row.text("foreign_table")?,
        column:    row.text("foreign_column")?,
        on_delete: row.opt_text("delete_rule").and_then(|r| parse_action(&r)),
      });
    }
  }
  Ok(())
}

/// `NO ACTION` is every dialect's default and is reported as no action.
fn parse_action(rule: &str) -> Option<ReferentialAction> {
  rule
    .trim()
    .to_ascii_uppercase()
    .parse::<ReferentialAction>()
    .ok()
    .filter(|a| *a != ReferentialAction::NoAction)
}

/// A trigger from an `information_schema.triggers` row.
fn trigger_from_row(row: &Row) -> Result<TriggerDefinition> {
  let timing = row.text("action_timing")?;
  let event = row.text("event_manipulation")?;

  Ok(TriggerDefinition {
    name:      row.text("trigger_name")?,
    timing:    timing
      .parse::<TriggerTiming>()
      .map_err(|_| Error::Catalog(format!("unknown trigger timing {timing:?}")))?,
    event:     event
      .parse::<TriggerEvent>()
      .map_err(|_| Error::Catalog(format!("unknown trigger event {event:?}")))?,
    statement: row.opt_text("action_statement").unwrap_or_default(),
  })
}

/// Collapse catalogs that report one row per (trigger, event) into one
/// definition per trigger name, keeping the first row seen.
fn dedup_triggers(triggers: Vec<TriggerDefinition>) -> Vec<TriggerDefinition> {
  let mut out: Vec<TriggerDefinition> = Vec::with_capacity(triggers.len());
  for trigger in triggers {
    if !out.iter().any(|t| t.name == trigger.name) {
      out.push(trigger);
    }
  }
  out
}
