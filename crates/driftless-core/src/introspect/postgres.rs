//! Postgres catalog queries, scoped to `current_schema()`.
//!
//! Every selected value is cast to `text` so backends can decode catalog
//! domains (`sql_identifier`, `yes_or_no`, ...) uniformly.

use std::collections::HashMap;

use super::{
  attach_foreign_keys, dedup_triggers, fetch, fold_indexes, trigger_from_row,
};
use crate::{
  Error, Result,
  database::{Database, Value},
  schema::{
    ColumnDefinition, DataType, DefaultValue, IndexDefinition,
    TriggerDefinition,
  },
};

pub(super) async fn table_exists<D: Database>(db: &D, table: &str) -> Result<bool> {
  let rows = fetch(
    db,
    "SELECT table_name::text AS table_name
     FROM information_schema.tables
     WHERE table_schema = current_schema() AND table_name = $1",
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
    "SELECT column_name::text AS column_name,
            data_type::text AS data_type,
            is_nullable::text AS is_nullable,
            column_default::text AS column_default,
            is_identity::text AS is_identity
     FROM information_schema.columns
     WHERE table_schema = current_schema() AND table_name = $1
     ORDER BY ordinal_position",
    &params,
  )
  .await?;

  let key_rows = fetch(
    db,
    "SELECT kcu.column_name::text AS column_name,
            tc.constraint_name::text AS constraint_name,
            tc.constraint_type::text AS constraint_type
     FROM information_schema.table_constraints tc
     JOIN information_schema.key_column_usage kcu
       ON kcu.constraint_name = tc.constraint_name
      AND kcu.table_schema = tc.table_schema
      AND kcu.table_name = tc.table_name
     WHERE tc.table_schema = current_schema() AND tc.table_name = $1
       AND tc.constraint_type IN ('PRIMARY KEY', 'UNIQUE')",
    &params,
  )
  .await?;

  let mut primary: Vec<String> = vec![];
  let mut unique_members: HashMap<String, Vec<String>> = HashMap::new();
  for row in &key_rows {
    let column = row.text("column_name")?;
    match row.text("constraint_type")?.as_str() {
      "PRIMARY KEY" => primary.push(column),
      "UNIQUE" => unique_members
        .entry(row.text("constraint_name")?)
        .or_default()
        .push(column),
      other => {
        return Err(Error::Catalog(format!("unexpected constraint type {other:?}")));
      }
    }
  }
  let unique_columns: Vec<String> = unique_members
    .into_values()
    .filter(|cols| cols.len() == 1)
    .flatten()
    .collect();

  let mut columns = info
    .iter()
    .map(|row| {
      let name = row.text("column_name")?;
      let default = row.opt_text("column_default");
      let serial = default.as_deref().is_some_and(|d| d.starts_with("nextval("));
      let identity = row.opt_text("is_identity").is_some_and(|v| v == "YES");

      Ok(ColumnDefinition {
        data_type: DataType::from_native(&row.text("data_type")?),
        nullable: row.bool("is_nullable")?,
        primary_key: primary.contains(&name),
        auto_increment: serial || identity,
        unique: unique_columns.contains(&name),
        default_value: default
          .filter(|_| !serial)
          .map(|sql| DefaultValue::Expression { sql }),
        references: None,
        name,
      })
    })
    .collect::<Result<Vec<_>>>()?;

  let fk_rows = fetch(
    db,
    "SELECT kcu.column_name::text AS column_name,
            ccu.table_name::text AS foreign_table,
            ccu.column_name::text AS foreign_column,
            rc.delete_rule::text AS delete_rule
     FROM information_schema.table_constraints tc
     JOIN information_schema.key_column_usage kcu
       ON kcu.constraint_name = tc.constraint_name
      AND kcu.table_schema = tc.table_schema
     JOIN information_schema.constraint_column_usage ccu
       ON ccu.constraint_name = tc.constraint_name
      AND ccu.constraint_schema = tc.constraint_schema
     JOIN information_schema.referential_constraints rc
       ON rc.constraint_name = tc.constraint_name
      AND rc.constraint_schema = tc.constraint_schema
     WHERE tc.constraint_type = 'FOREIGN KEY'
       AND tc.table_schema = current_schema() AND tc.table_name = $1",
    &params,
  )
  .await?;
  attach_foreign_keys(&mut columns, &fk_rows)?;

  Ok(columns)
}

pub(super) async fn table_indexes<D: Database>(
  db: &D,
  table: &str,
) -> Result<Vec<IndexDefinition>> {
  // Foreign keys elsewhere also record the referenced index in `conindid`;
  // only constraints of this table make an index implicit.
  let rows = fetch(
    db,
    "SELECT i.relname::text AS index_name,
            ix.indisunique::text AS is_unique,
            a.attname::text AS column_name
     FROM pg_class t
     JOIN pg_namespace n ON n.oid = t.relnamespace
     JOIN pg_index ix ON ix.indrelid = t.oid
     JOIN pg_class i ON i.oid = ix.indexrelid
     JOIN LATERAL unnest(ix.indkey) WITH ORDINALITY AS k(attnum, ord) ON true
     JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = k.attnum
     WHERE n.nspname = current_schema() AND t.relname = $1
       AND NOT ix.indisprimary
       AND NOT EXISTS (
         SELECT 1 FROM pg_constraint c
         WHERE c.conindid = ix.indexrelid
           AND c.conrelid = t.oid AND c.contype IN ('p', 'u', 'x')
       )
     ORDER BY i.relname, k.ord",
    &[Value::from(table)],
  )
  .await?;

  fold_indexes(&rows, |row| row.bool("is_unique"))
}

pub(super) async fn table_triggers<D: Database>(
  db: &D,
  table: &str,
) -> Result<Vec<TriggerDefinition>> {
  let rows = fetch(
    db,
    "SELECT trigger_name::text AS trigger_name,
            action_timing::text AS action_timing,
            event_manipulation::text AS event_manipulation,
            action_statement::text AS action_statement
     FROM information_schema.triggers
     WHERE event_object_schema = current_schema() AND event_object_table = $1
     ORDER BY trigger_name",
    &[Value::from(table)],
  )
  .await?;

  let triggers = rows
    .iter()
    .map(trigger_from_row)
    .collect::<Result<Vec<_>>>()?;

  Ok(dedup_triggers(triggers))
}
