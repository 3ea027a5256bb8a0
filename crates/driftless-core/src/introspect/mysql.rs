//! MySQL catalog queries, scoped to `DATABASE()`.

use super::{
  attach_foreign_keys, dedup_triggers, fetch, fold_indexes, trigger_from_row,
};
use crate::{
  Result,
  database::{Database, Value},
  schema::{
    ColumnDefinition, DataType, DefaultValue, IndexDefinition,
    TriggerDefinition,
  },
};

pub(super) async fn table_exists<D: Database>(db: &D, table: &str) -> Result<bool> {
  let rows = fetch(
    db,
    "SELECT TABLE_NAME AS table_name
     FROM information_schema.TABLES
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?",
    &[Value::from(table)],
  )
  .await?;
  Ok(!rows.is_empty())
}

pub(super) async fn table_columns<D: Database>(
  db: &D,
  table: &str,
) -> Result<Vec<ColumnDefinition>> {
  let params = [Value::from(table)];

  let info = fetch(
    db,
    "SELECT COLUMN_NAME AS column_name, COLUMN_TYPE AS column_type,
            IS_NULLABLE AS is_nullable, COLUMN_DEFAULT AS column_default,
            COLUMN_KEY AS column_key, EXTRA AS extra
     FROM information_schema.COLUMNS
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
     ORDER BY ORDINAL_POSITION",
    &params,
  )
  .await?;

  let mut columns = info
    .iter()
    .map(|row| {
      // COLUMN_KEY is PRI, UNI or MUL; UNI only for single-column uniques.
      let key = row.opt_text("column_key").unwrap_or_default();
      let extra = row.opt_text("extra").unwrap_or_default();

      Ok(ColumnDefinition {
        name:           row.text("column_name")?,
        data_type:      DataType::from_native(&row.text("column_type")?),
        nullable:       row.bool("is_nullable")?,
        primary_key:    key == "PRI",
        auto_increment: extra.to_ascii_lowercase().contains("auto_increment"),
        unique:         key == "UNI",
        default_value:  row
          .opt_text("column_default")
          .map(|sql| DefaultValue::Expression { sql }),
        references:     None,
      })
    })
    .collect::<Result<Vec<_>>>()?;

  let fk_rows = fetch(
    db,
    "SELECT k.COLUMN_NAME AS column_name,
            k.REFERENCED_TABLE_NAME AS foreign_table,
            k.REFERENCED_COLUMN_NAME AS foreign_column,
            r.DELETE_RULE AS delete_rule
     FROM information_schema.KEY_COLUMN_USAGE k
     JOIN information_schema.REFERENTIAL_CONSTRAINTS r
       ON r.CONSTRAINT_SCHEMA = k.CONSTRAINT_SCHEMA
      AND r.CONSTRAINT_NAME = k.CONSTRAINT_NAME
     WHERE k.TABLE_SCHEMA = DATABASE() AND k.TABLE_NAME = ?
       AND k.REFERENCED_TABLE_NAME IS NOT NULL",
    &params,
  )
  .await?;
  attach_foreign_keys(&mut columns, &fk_rows)?;

  Ok(columns)
}

/// MySQL reports the implicit indexes behind foreign keys and column-level
/// `UNIQUE` as ordinary indexes. Those sharing a foreign-key constraint's
/// name are excluded in SQL; single-column unique indexes named after their
/// own column are dropped afterwards.
pub(super) async fn table_indexes<D: Database>(
  db: &D,
  table: &str,
) -> Result<Vec<IndexDefinition>> {
  let rows = fetch(
    db,
    "SELECT INDEX_NAME AS index_name,
            CAST(NON_UNIQUE AS CHAR) AS non_unique,
            COLUMN_NAME AS column_name
     FROM information_schema.STATISTICS
     WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
       AND INDEX_NAME <> 'PRIMARY'
       AND INDEX_NAME NOT IN (
         SELECT CONSTRAINT_NAME FROM information_schema.TABLE_CONSTRAINTS
         WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
           AND CONSTRAINT_TYPE = 'FOREIGN KEY'
       )
     ORDER BY INDEX_NAME, SEQ_IN_INDEX",
    &[Value::from(table), Value::from(table)],
  )
  .await?;

  let indexes = fold_indexes(&rows, |row| Ok(!row.bool("non_unique")?))?;
  Ok(indexes.into_iter().filter(|i| !backs_unique_column(i)).collect())
}

/// A column-level `UNIQUE` leaves an index named after its column.
///
/// MySQL records every unique index as a `UNIQUE` row in
/// `TABLE_CONSTRAINTS`, so an explicit single-column unique index that is
/// itself named after its column looks the same and is hidden too. Such an
/// index is re-created by every run; name explicit indexes differently.
fn backs_unique_column(index: &IndexDefinition) -> bool {
  index.unique
    && matches!(
      (index.name.as_deref(), index.columns.as_slice()),
      (Some(name), [column]) if name == column
    )
}

pub(super) async fn table_triggers<D: Database>(
  db: &D,
  table: &str,
) -> Result<Vec<TriggerDefinition>> {
  let rows = fetch(
    db,
    "SELECT TRIGGER_NAME AS trigger_name, ACTION_TIMING AS action_timing,
            EVENT_MANIPULATION AS event_manipulation,
            ACTION_STATEMENT AS action_statement
     FROM information_schema.TRIGGERS
     WHERE TRIGGER_SCHEMA = DATABASE() AND EVENT_OBJECT_TABLE = ?
     ORDER BY TRIGGER_NAME",
    &[Value::from(table)],
  )
  .await?;

  let triggers = rows
    .iter()
    .map(trigger_from_row)
    .collect::<Result<Vec<_>>>()?;

  Ok(dedup_triggers(triggers))
}
