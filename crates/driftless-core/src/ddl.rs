//! DDL statement rendering per dialect.
//!
//! Statements carry no trailing semicolon. Every function returns a single
//! statement except [`add_column`].
//! Identifiers are always quoted, so definitions may use reserved words as
//! table or column names.

use crate::{
  database::Dialect,
  schema::{
    ColumnDefinition, DataType, DefaultValue, IndexDefinition,
    TableDefinition, TriggerDefinition,
  },
};

// ─── Identifiers and literals ────────────────────────────────────────────────

pub fn quote_ident(dialect: Dialect, name: &str) -> String {
  match dialect {
    Dialect::MySql => format!("`{}`", name.replace('`', "``")),
    Dialect::Sqlite | Dialect::Postgres => {
      format!("\"{}\"", name.replace('"', "\"\""))
    }
  }
}

pub fn quote_literal(value: &str) -> String {
  format!("'{}'", value.replace('\'', "''"))
}

fn quote_list(dialect: Dialect, names: &[String]) -> String {
  names
    .iter()
    .map(|n| quote_ident(dialect, n))
    .collect::<Vec<_>>()
    .join(", ")
}

// ─── Types ───────────────────────────────────────────────────────────────────

/// Concrete column type for `data_type`.
pub fn column_type(dialect: Dialect, data_type: DataType) -> &'static str {
  use DataType::*;
  match dialect {
    Dialect::Sqlite => match data_type {
      Integer | BigInt => "INTEGER",
      Real => "REAL",
      Decimal => "NUMERIC",
      Text | Json | Uuid => "TEXT",
      Boolean => "BOOLEAN",
      Timestamp => "TIMESTAMP",
      Date => "DATE",
      Blob => "BLOB",
    },
    Dialect::Postgres => match data_type {
      Integer => "INTEGER",
      BigInt => "BIGINT",
      Real => "DOUBLE PRECISION",
      Decimal => "NUMERIC",
      Text => "TEXT",
      Boolean => "BOOLEAN",
      Timestamp => "TIMESTAMPTZ",
      Date => "DATE",
      Blob => "BYTEA",
      Json => "JSONB",
      Uuid => "UUID",
    },
    // MySQL cannot index or key a bare TEXT column, so text is bounded.
    Dialect::MySql => match data_type {
      Integer => "INT",
      BigInt => "BIGINT",
      Real => "DOUBLE",
      Decimal => "DECIMAL(38, 10)",
      Text => "VARCHAR(255)",
      Boolean => "BOOLEAN",
      Timestamp => "DATETIME(6)",
      Date => "DATE",
      Blob => "LONGBLOB",
      Json => "JSON",
      Uuid => "CHAR(36)",
    },
  }
}

fn default_literal(value: &DefaultValue) -> String {
  match value {
    DefaultValue::Boolean(true) => "TRUE".to_owned(),
    DefaultValue::Boolean(false) => "FALSE".to_owned(),
    DefaultValue::Integer(i) => i.to_string(),
    DefaultValue::Real(r) => r.to_string(),
    DefaultValue::Text(s) => quote_literal(s),
    DefaultValue::Expression { sql } => sql.clone(),
  }
}

// ─── Columns and tables ──────────────────────────────────────────────────────

/// A column clause. `inline_primary_key` is false when the key is declared
/// as a table constraint instead (composite keys).
pub fn column_clause(
  dialect: Dialect,
  column: &ColumnDefinition,
  inline_primary_key: bool,
) -> String {
  let mut clause = format!(
    "{} {}",
    quote_ident(dialect, &column.name),
    column_type(dialect, column.data_type)
  );

  let primary_key = column.primary_key && inline_primary_key;
  if primary_key {
    clause.push_str(" PRIMARY KEY");
  }

  if column.auto_increment {
    match dialect {
      // Only valid on an INTEGER PRIMARY KEY; SQLite rejects it elsewhere.
      Dialect::Sqlite if primary_key => clause.push_str(" AUTOINCREMENT"),
      Dialect::Sqlite => {}
      Dialect::Postgres => clause.push_str(" GENERATED BY DEFAULT AS IDENTITY"),
      Dialect::MySql => clause.push_str(" AUTO_INCREMENT"),
    }
  }

  if !column.nullable && !primary_key {
    clause.push_str(" NOT NULL");
  }
  if column.unique && !primary_key {
    clause.push_str(" UNIQUE");
  }
  if let Some(default) = &column.default_value {
    clause.push_str(" DEFAULT ");
    clause.push_str(&default_literal(default));
  }
  if let Some(fk) = &column.references {
    clause.push_str(&format!(
      " REFERENCES {} ({})",
      quote_ident(dialect, &fk.table),
      quote_ident(dialect, &fk.column)
    ));
    if let Some(action) = fk.on_delete {
      clause.push_str(&format!(" ON DELETE {action}"));
    }
  }

  clause
}

/// `CREATE TABLE` with every column of `table`. Indexes and triggers are
/// separate statements.
pub fn create_table(dialect: Dialect, table: &TableDefinition) -> String {
  let pk = table.primary_key_columns();
  let inline = pk.len() <= 1;

  let mut parts: Vec<String> = table
    .columns
    .iter()
    .map(|c| column_clause(dialect, c, inline))
    .collect();

  if !inline {
    let pk: Vec<String> = pk.into_iter().map(str::to_owned).collect();
    parts.push(format!("PRIMARY KEY ({})", quote_list(dialect, &pk)));
  }

  format!(
    "CREATE TABLE {} ({})",
    quote_ident(dialect, &table.name),
    parts.join(", ")
  )
}

pub fn drop_table(dialect: Dialect, table: &str) -> String {
  format!("DROP TABLE {}", quote_ident(dialect, table))
}

/// Statements adding `column` to an existing table.
///
/// SQLite refuses `ADD COLUMN ... UNIQUE`, so there the column is added
/// plain and the constraint becomes a unique index named by
/// [`unique_column_index`].
pub fn add_column(
  dialect: Dialect,
  table: &str,
  column: &ColumnDefinition,
) -> Vec<String> {
  let split_unique = dialect == Dialect::Sqlite && column.unique;
  let clause = if split_unique {
    let plain = ColumnDefinition { unique: false, ..column.clone() };
    column_clause(dialect, &plain, true)
  } else {
    column_clause(dialect, column, true)
  };

  let mut statements = vec![format!(
    "ALTER TABLE {} ADD COLUMN {}",
    quote_ident(dialect, table),
    clause
  )];
  if split_unique {
    statements.push(format!(
      "CREATE UNIQUE INDEX {} ON {} ({})",
      quote_ident(dialect, &unique_column_index(table, &column.name)),
      quote_ident(dialect, table),
      quote_ident(dialect, &column.name)
    ));
  }
  statements
}

/// Name of the index standing in for a column-level `UNIQUE` added to an
/// existing SQLite table. Introspection treats it as the column's
/// constraint, not as an explicit index.
pub fn unique_column_index(table: &str, column: &str) -> String {
  format!("uq_{table}_{column}")
}

// ─── Indexes ─────────────────────────────────────────────────────────────────

pub fn create_index(
  dialect: Dialect,
  table: &str,
  index: &IndexDefinition,
) -> String {
  format!(
    "CREATE {}INDEX {} ON {} ({})",
    if index.unique { "UNIQUE " } else { "" },
    quote_ident(dialect, &index.resolved_name(table)),
    quote_ident(dialect, table),
    quote_list(dialect, &index.columns)
  )
}

/// MySQL scopes index names to their table; the others to the schema.
pub fn drop_index(dialect: Dialect, table: &str, index: &str) -> String {
  match dialect {
    Dialect::MySql => format!(
      "DROP INDEX {} ON {}",
      quote_ident(dialect, index),
      quote_ident(dialect, table)
    ),
    Dialect::Sqlite | Dialect::Postgres => {
      format!("DROP INDEX {}", quote_ident(dialect, index))
    }
  }
}

// ─── Triggers ────────────────────────────────────────────────────────────────

pub fn create_trigger(
  dialect: Dialect,
  table: &str,
  trigger: &TriggerDefinition,
) -> String {
  let head = format!(
    "CREATE TRIGGER {} {} {} ON {} FOR EACH ROW",
    quote_ident(dialect, &trigger.name),
    trigger.timing,
    trigger.event,
    quote_ident(dialect, table)
  );
  let body = trigger.statement.trim().trim_end_matches(';').trim_end();

  match dialect {
    Dialect::Sqlite => format!("{head} BEGIN {body}; END"),
    Dialect::Postgres | Dialect::MySql => format!("{head} {body}"),
  }
}

/// Postgres scopes trigger names to their table.
pub fn drop_trigger(dialect: Dialect, table: &str, trigger: &str) -> String {
  match dialect {
    Dialect::Postgres => format!(
      "DROP TRIGGER {} ON {}",
      quote_ident(dialect, trigger),
      quote_ident(dialect, table)
    ),
    Dialect::Sqlite | Dialect::MySql => {
      format!("DROP TRIGGER {}", quote_ident(dialect, trigger))
    }
  }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
