//! The `Database` trait: the live connection the engine reconciles.
//!
//! Backends (`driftless-sqlite`, `driftless-sqlx`) implement this trait over
//! their driver. The engine only ever issues plain SQL text with positional
//! parameters and reads rows back as loosely-typed [`Value`]s, so a backend
//! needs no knowledge of schemas or snapshots.

use std::{future::Future, str::FromStr};

use strum::{AsRefStr, Display, EnumString};

use crate::{Error, Result};

// ─── Dialect ─────────────────────────────────────────────────────────────────

/// The SQL dialects the engine knows how to introspect and emit DDL for.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, AsRefStr,
)]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Dialect {
  #[strum(to_string = "sqlite", serialize = "sqlite3")]
  Sqlite,
  #[strum(to_string = "postgres", serialize = "postgresql", serialize = "pg")]
  Postgres,
  #[strum(to_string = "mysql", serialize = "mariadb")]
  MySql,
}

impl Dialect {
  /// Resolve the dialect a connection declares, failing with
  /// [`Error::DialectDetermination`] for anything unrecognised.
  pub fn determine(declared: &str) -> Result<Self> {
    Self::from_str(declared.trim())
      .map_err(|_| Error::DialectDetermination(declared.to_owned()))
  }

  /// Positional parameter placeholder for the `n`th (1-based) parameter.
  pub fn placeholder(self, n: usize) -> String {
    match self {
      Self::Sqlite => format!("?{n}"),
      Self::Postgres => format!("${n}"),
      Self::MySql => "?".to_owned(),
    }
  }
}

// ─── Values and rows ─────────────────────────────────────────────────────────

/// A parameter or result cell.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  Null,
  Integer(i64),
  Real(f64),
  Text(String),
}

impl Value {
  pub fn is_null(&self) -> bool { matches!(self, Self::Null) }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Self::Text(s) => Some(s),
      _ => None,
    }
  }

  /// Integers, or text that parses as one (server backends return catalog
  /// numbers as text).
  pub fn as_i64(&self) -> Option<i64> {
    match self {
      Self::Integer(i) => Some(*i),
      Self::Text(s) => s.trim().parse().ok(),
      _ => None,
    }
  }

  /// Catalog booleans arrive as `1`/`0`, `t`/`f`, `YES`/`NO` or
  /// `true`/`false` depending on dialect.
  pub fn as_bool(&self) -> Option<bool> {
    match self {
      Self::Integer(i) => Some(*i != 0),
      Self::Text(s) => match s.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "y" => Some(true),
        "0" | "f" | "false" | "no" | "n" => Some(false),
        _ => None,
      },
      _ => None,
    }
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self { Self::Text(s.to_owned()) }
}

impl From<String> for Value {
  fn from(s: String) -> Self { Self::Text(s) }
}

impl From<i64> for Value {
  fn from(i: i64) -> Self { Self::Integer(i) }
}

/// One result row, with cells addressable by column name.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
  columns: Vec<String>,
  values:  Vec<Value>,
}

impl Row {
  pub fn new(columns: Vec<String>, values: Vec<Value>) -> Self {
    Self { columns, values }
  }

  /// The raw cell for `column`, matched case-insensitively (MySQL returns
  /// upper-case catalog column names).
  pub fn get(&self, column: &str) -> Option<&Value> {
    self
      .columns
      .iter()
      .position(|c| c.eq_ignore_ascii_case(column))
      .and_then(|i| self.values.get(i))
  }

  /// A required text cell.
  pub fn text(&self, column: &str) -> Result<String> {
    match self.get(column) {
      Some(Value::Text(s)) => Ok(s.clone()),
      Some(Value::Integer(i)) => Ok(i.to_string()),
      Some(Value::Real(r)) => Ok(r.to_string()),
      Some(Value::Null) | None => {
        Err(Error::Catalog(format!("missing text column {column:?}")))
      }
    }
  }

  /// An optional text cell; `NULL` and absent columns are `None`.
  pub fn opt_text(&self, column: &str) -> Option<String> {
    match self.get(column)? {
      Value::Null => None,
      Value::Text(s) => Some(s.clone()),
      Value::Integer(i) => Some(i.to_string()),
      Value::Real(r) => Some(r.to_string()),
    }
  }

  pub fn int(&self, column: &str) -> Result<i64> {
    self
      .get(column)
      .and_then(Value::as_i64)
      .ok_or_else(|| Error::Catalog(format!("missing integer column {column:?}")))
  }

  pub fn bool(&self, column: &str) -> Result<bool> {
    self
      .get(column)
      .and_then(Value::as_bool)
      .ok_or_else(|| Error::Catalog(format!("missing boolean column {column:?}")))
  }
}

/// Outcome of a statement that returns no rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Execution {
  pub rows_affected:  u64,
  /// Row id generated by an `INSERT`, where the driver reports one.
  pub last_insert_id: Option<i64>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// A live SQL connection (or pool) bound to one dialect.
///
/// Statements are issued one at a time and awaited to completion; the engine
/// never runs two concurrently against the same `Database`.
pub trait Database: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The dialect this connection speaks, as a name such as `"sqlite"`,
  /// `"postgres"` or `"mysql"`. Resolved via [`Dialect::determine`].
  fn dialect_name(&self) -> &str;

  /// Execute a statement that returns no rows. With no `params` the
  /// statement is sent as-is (DDL such as `CREATE TRIGGER` is not always
  /// accepted as a prepared statement).
  fn execute<'a>(
    &'a self,
    sql: &'a str,
    params: &'a [Value],
  ) -> impl Future<Output = Result<Execution, Self::Error>> + Send + 'a;

  /// Run a query and collect every row.
  fn query<'a>(
    &'a self,
    sql: &'a str,
    params: &'a [Value],
  ) -> impl Future<Output = Result<Vec<Row>, Self::Error>> + Send + 'a;
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn determines_known_dialects() {
    assert_eq!(Dialect::determine("sqlite").unwrap(), Dialect::Sqlite);
    assert_eq!(Dialect::determine("PostgreSQL").unwrap(), Dialect::Postgres);
    assert_eq!(Dialect::determine(" mysql ").unwrap(), Dialect::MySql);
  }

  #[test]
  fn unknown_dialect_is_a_determination_error() {
    let err = Dialect::determine("oracle").unwrap_err();
    assert!(matches!(err, Error::DialectDetermination(d) if d == "oracle"));
  }

  #[test]
  fn row_lookup_is_case_insensitive() {
    let row = Row::new(
      vec!["COLUMN_NAME".into(), "NON_UNIQUE".into()],
      vec![Value::Text("email".into()), Value::Text("0".into())],
    );
    assert_eq!(row.text("column_name").unwrap(), "email");
    assert!(!row.bool("non_unique").unwrap());
    assert!(row.opt_text("missing").is_none());
    assert!(matches!(row.int("missing"), Err(Error::Catalog(_))));
  }

  #[test]
  fn catalog_booleans_parse_across_dialects() {
    assert_eq!(Value::Integer(1).as_bool(), Some(true));
    assert_eq!(Value::Text("t".into()).as_bool(), Some(true));
    assert_eq!(Value::Text("NO".into()).as_bool(), Some(false));
    assert_eq!(Value::Real(1.0).as_bool(), None);
  }
}
