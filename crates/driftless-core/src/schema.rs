//! Schema definition model: the desired shape of a database.
//!
//! Definitions are pure data. They are authored by the calling system,
//! supplied fresh on every run, and persisted verbatim (as JSON) in the
//! tracking table after each successful run. The JSON form uses camelCase
//! keys (`dataType`, `primaryKey`, ...) so snapshots written by other
//! tooling against the same tracking table remain readable.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::{Error, Result};

// ─── Column types ────────────────────────────────────────────────────────────

/// Semantic column type, rendered to a concrete type per dialect by
/// [`crate::ddl`].
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum DataType {
  Integer,
  #[serde(alias = "biginteger")]
  #[strum(to_string = "bigint", serialize = "biginteger")]
  BigInt,
  Real,
  Decimal,
  Text,
  Boolean,
  Timestamp,
  Date,
  Blob,
  Json,
  Uuid,
}

impl DataType {
  /// Best-effort mapping of a native catalog type name back to a semantic
  /// type. Unknown names map to [`DataType::Text`].
  pub fn from_native(native: &str) -> Self {
    let lower = native.trim().to_ascii_lowercase();
    let base = lower.split(['(', ' ']).next().unwrap_or_default();

    match base {
      "bigint" | "int8" | "bigserial" => Self::BigInt,
      "int" | "integer" | "int4" | "int2" | "smallint" | "mediumint"
      | "serial" => Self::Integer,
      // MySQL reports booleans as tinyint(1).
      "tinyint" if lower.starts_with("tinyint(1)") => Self::Boolean,
      "tinyint" => Self::Integer,
      "real" | "float" | "float4" | "float8" | "double" => Self::Real,
      "decimal" | "numeric" => Self::Decimal,
      "bool" | "boolean" => Self::Boolean,
      "timestamp" | "timestamptz" | "datetime" => Self::Timestamp,
      "date" => Self::Date,
      "blob" | "bytea" | "longblob" | "binary" | "varbinary" => Self::Blob,
      "json" | "jsonb" => Self::Json,
      "uuid" => Self::Uuid,
      _ => Self::Text,
    }
  }
}

// ─── Defaults and references ─────────────────────────────────────────────────

/// A column default.
///
/// Scalars are rendered as SQL literals; [`DefaultValue::Expression`] is
/// emitted verbatim (e.g. `CURRENT_TIMESTAMP`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DefaultValue {
  Boolean(bool),
  Integer(i64),
  Real(f64),
  Text(String),
  Expression { sql: String },
}

/// What happens to referencing rows when the referenced row is deleted.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display,
  EnumString,
)]
#[serde(rename_all = "camelCase")]
pub enum ReferentialAction {
  #[strum(serialize = "CASCADE")]
  Cascade,
  #[strum(serialize = "SET NULL")]
  SetNull,
  #[strum(serialize = "RESTRICT")]
  Restrict,
  #[strum(serialize = "NO ACTION")]
  NoAction,
}

/// A foreign-key target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForeignKey {
  pub table:     String,
  pub column:    String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub on_delete: Option<ReferentialAction>,
}

// ─── Columns ─────────────────────────────────────────────────────────────────

fn default_true() -> bool { true }

fn is_false(b: &bool) -> bool { !*b }

/// A single column of a table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDefinition {
  pub name:           String,
  pub data_type:      DataType,
  #[serde(default = "default_true")]
  pub nullable:       bool,
  #[serde(default, skip_serializing_if = "is_false")]
  pub primary_key:    bool,
  #[serde(default, skip_serializing_if = "is_false")]
  pub auto_increment: bool,
  #[serde(default, skip_serializing_if = "is_false")]
  pub unique:         bool,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub default_value:  Option<DefaultValue>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub references:     Option<ForeignKey>,
}

impl ColumnDefinition {
  /// A nullable column with no constraints.
  pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
    Self {
      name: name.into(),
      data_type,
      nullable: true,
      primary_key: false,
      auto_increment: false,
      unique: false,
      default_value: None,
      references: None,
    }
  }

  pub fn primary_key(mut self) -> Self {
    self.primary_key = true;
    self.nullable = false;
    self
  }

  pub fn auto_increment(mut self) -> Self {
    self.auto_increment = true;
    self
  }

  pub fn not_null(mut self) -> Self {
    self.nullable = false;
    self
  }

  pub fn unique(mut self) -> Self {
    self.unique = true;
    self
  }

  pub fn default_value(mut self, value: DefaultValue) -> Self {
    self.default_value = Some(value);
    self
  }

  pub fn references(
    mut self,
    table: impl Into<String>,
    column: impl Into<String>,
  ) -> Self {
    self.references = Some(ForeignKey {
      table:     table.into(),
      column:    column.into(),
      on_delete: None,
    });
    self
  }

  /// Set the `ON DELETE` action of the foreign key. No-op without one.
  pub fn on_delete(mut self, action: ReferentialAction) -> Self {
    if let Some(fk) = self.references.as_mut() {
      fk.on_delete = Some(action);
    }
    self
  }
}

// ─── Indexes ─────────────────────────────────────────────────────────────────

/// A secondary index. The name may be omitted, in which case it is derived
/// from the table and column names (see [`IndexDefinition::resolved_name`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexDefinition {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub name:    Option<String>,
  pub columns: Vec<String>,
  #[serde(default, skip_serializing_if = "is_false")]
  pub unique:  bool,
}

impl IndexDefinition {
  pub fn new<I, S>(columns: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    Self {
      name:    None,
      columns: columns.into_iter().map(Into::into).collect(),
      unique:  false,
    }
  }

  pub fn named(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  pub fn unique(mut self) -> Self {
    self.unique = true;
    self
  }

  /// The explicit name, or `idx_<table>_<col1>_<col2>...`.
  pub fn resolved_name(&self, table: &str) -> String {
    match &self.name {
      Some(name) => name.clone(),
      None => format!("idx_{}_{}", table, self.columns.join("_")),
    }
  }
}

// ─── Triggers ────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum TriggerTiming {
  Before,
  After,
}

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display,
  EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "UPPERCASE", ascii_case_insensitive)]
pub enum TriggerEvent {
  Insert,
  Update,
  Delete,
}

/// A row-level trigger. `statement` is raw, dialect-specific SQL: the body
/// for SQLite and MySQL, the `EXECUTE FUNCTION ...` clause for Postgres.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerDefinition {
  pub name:      String,
  pub timing:    TriggerTiming,
  pub event:     TriggerEvent,
  pub statement: String,
}

// ─── Tables ──────────────────────────────────────────────────────────────────

/// The desired shape of one table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDefinition {
  pub name:       String,
  #[serde(default)]
  pub columns:    Vec<ColumnDefinition>,
  #[serde(default)]
  pub indexes:    Vec<IndexDefinition>,
  #[serde(default)]
  pub triggers:   Vec<TriggerDefinition>,
  /// Drop this table if it exists, whatever the previous snapshot says.
  #[serde(default, skip_serializing_if = "is_false")]
  pub deprecated: bool,
}

impl TableDefinition {
  pub fn new(name: impl Into<String>) -> Self {
    Self {
      name:       name.into(),
      columns:    vec![],
      indexes:    vec![],
      triggers:   vec![],
      deprecated: false,
    }
  }

  pub fn column(mut self, column: ColumnDefinition) -> Self {
    self.columns.push(column);
    self
  }

  pub fn index(mut self, index: IndexDefinition) -> Self {
    self.indexes.push(index);
    self
  }

  pub fn trigger(mut self, trigger: TriggerDefinition) -> Self {
    self.triggers.push(trigger);
    self
  }

  pub fn deprecated(mut self) -> Self {
    self.deprecated = true;
    self
  }

  /// Names of the columns making up the primary key, in definition order.
  pub fn primary_key_columns(&self) -> Vec<&str> {
    self
      .columns
      .iter()
      .filter(|c| c.primary_key)
      .map(|c| c.name.as_str())
      .collect()
  }
}

/// Table names of `tables`, in definition order.
pub fn table_names(tables: &[TableDefinition]) -> Vec<&str> {
  tables.iter().map(|t| t.name.as_str()).collect()
}

// ─── Validation ──────────────────────────────────────────────────────────────

/// Check the structural invariants of a desired schema before any DDL is
/// issued against it.
pub fn validate(tables: &[TableDefinition]) -> Result<()> {
  let mut seen_tables = HashSet::new();

  for table in tables {
    if table.name.trim().is_empty() {
      return Err(Error::InvalidSchema("table with an empty name".into()));
    }
    if !seen_tables.insert(table.name.as_str()) {
      return Err(Error::InvalidSchema(format!(
        "duplicate table name {:?}",
        table.name
      )));
    }

    let mut seen_columns = HashSet::new();
    for column in &table.columns {
      if column.name.trim().is_empty() {
        return Err(Error::InvalidSchema(format!(
          "table {:?} has a column with an empty name",
          table.name
        )));
      }
      if !seen_columns.insert(column.name.as_str()) {
        return Err(Error::InvalidSchema(format!(
          "duplicate column {:?} in table {:?}",
          column.name, table.name
        )));
      }
    }

    let mut seen_indexes = HashSet::new();
    for index in &table.indexes {
      let name = index.resolved_name(&table.name);
      if index.columns.is_empty() {
        return Err(Error::InvalidSchema(format!(
          "index {name:?} on {:?} has no columns",
          table.name
        )));
      }
      if !seen_indexes.insert(name.clone()) {
        return Err(Error::InvalidSchema(format!(
          "duplicate index {name:?} on {:?}",
          table.name
        )));
      }
    }

    let mut seen_triggers = HashSet::new();
    for trigger in &table.triggers {
      if !seen_triggers.insert(trigger.name.as_str()) {
        return Err(Error::InvalidSchema(format!(
          "duplicate trigger {:?} on {:?}",
          trigger.name, table.name
        )));
      }
    }
  }

  Ok(())
}

// ─── Tests ───────────────────────────────────────────────────────────────────
