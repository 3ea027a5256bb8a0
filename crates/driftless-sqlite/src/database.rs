//! [`SqliteDatabase`], the SQLite implementation of [`Database`].

use std::path::Path;

use driftless_core::{Database, Execution, Row, Value};
use rusqlite::params_from_iter;
use tracing::debug;

use crate::{
  Result,
  encode::{decode_value, encode_params},
  error::Error,
};

// ─── Connection ──────────────────────────────────────────────────────────────

/// A SQLite connection the engine can introspect and migrate.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteDatabase {
  conn: tokio_rusqlite::Connection,
}

impl SqliteDatabase {
  /// Open (or create) the database file at `path`.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let db = Self { conn };
    db.init().await?;
    Ok(db)
  }

  /// Open a private in-memory database, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let db = Self { conn };
    db.init().await?;
    Ok(db)
  }

  async fn init(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        Ok(())
      })
      .await?;
    debug!("opened sqlite connection");
    Ok(())
  }
}

impl Database for SqliteDatabase {
  type Error = Error;

  fn dialect_name(&self) -> &str { "sqlite" }

  async fn execute<'a>(&'a self, sql: &'a str, params: &'a [Value]) -> Result<Execution> {
    let sql = sql.to_owned();
    let params = encode_params(params);

    let execution = self
      .conn
      .call(move |conn| {
        // Parameterless statements go through the batch API so multi-clause
        // DDL such as `CREATE TRIGGER ... BEGIN ...; END` is accepted whole.
        let rows_affected = if params.is_empty() {
          conn.execute_batch(&sql)?;
          conn.changes() as u64
        } else {
          conn.execute(&sql, params_from_iter(params.iter()))? as u64
        };
        Ok(Execution {
          rows_affected,
          last_insert_id: Some(conn.last_insert_rowid()),
        })
      })
      .await?;

    Ok(execution)
  }

  async fn query<'a>(&'a self, sql: &'a str, params: &'a [Value]) -> Result<Vec<Row>> {
    let sql = sql.to_owned();
    let params = encode_params(params);

    let rows = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&sql)?;
        let columns: Vec<String> =
          stmt.column_names().into_iter().map(str::to_owned).collect();
        let width = columns.len();

        let values = stmt
          .query_map(params_from_iter(params.iter()), |row| {
            (0..width)
              .map(|i| row.get_ref(i).map(decode_value))
              .collect::<rusqlite::Result<Vec<_>>>()
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;

        Ok(
          values
            .into_iter()
            .map(|cells| Row::new(columns.clone(), cells))
            .collect::<Vec<_>>(),
        )
      })
      .await?;

    Ok(rows)
  }
}
