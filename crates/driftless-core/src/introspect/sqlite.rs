//! SQLite catalog queries (`sqlite_master` and the pragma table functions).

use std::collections::HashMap;

use super::{attach_foreign_keys, dedup_triggers, fetch, fold_indexes};
use crate::{
  Result,
  database::{Database, Value},
  ddl::unique_column_index,
  schema::{
    ColumnDefinition, DataType, DefaultValue, IndexDefinition,
    TriggerDefinition, TriggerEvent, TriggerTiming,
  },
};

pub(super) async fn table_exists<D: Database>(db: &D, table: &str) -> Result<bool> {
  let rows = fetch(
    db,
    "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
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
    "SELECT name, type, \"notnull\" AS not_null, dflt_value, pk
     FROM pragma_table_info(?1) ORDER BY cid",
    &params,
  )
  .await?;

  let create_sql = fetch(
    db,
    "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
    &params,
  )
  .await?
  .first()
  .and_then(|r| r.opt_text("sql"))
  .unwrap_or_default();
  let autoincrement = create_sql.to_ascii_uppercase().contains("AUTOINCREMENT");

  // Single-column UNIQUE constraints (origin 'u') and the indexes that stand
  // in for them on added columns; composite ones are not a column property.
  let unique_rows = fetch(
    db,
    "SELECT il.name AS index_name, il.origin AS origin, ii.name AS column_name
     FROM pragma_index_list(?1) AS il, pragma_index_info(il.name) AS ii
     WHERE il.\"unique\" = 1 AND il.origin IN ('u', 'c')",
    &params,
  )
  .await?;
  let mut unique_members: HashMap<String, (String, Vec<String>)> = HashMap::new();
  for row in &unique_rows {
    unique_members
      .entry(row.text("index_name")?)
      .or_insert_with(|| (row.opt_text("origin").unwrap_or_default(), vec![]))
      .1
      .push(row.text("column_name")?);
  }
  let unique_columns: Vec<String> = unique_members
    .into_iter()
    .filter_map(|(index, (origin, cols))| match cols.as_slice() {
      [column] if origin == "u" || index == unique_column_index(table, column) => {
        Some(column.clone())
      }
      _ => None,
    })
    .collect();

  let mut columns = info
    .iter()
    .map(|row| {
      let name = row.text("name")?;
      let native = row.opt_text("type").unwrap_or_default();
      let primary_key = row.int("pk")? > 0;
      let data_type = DataType::from_native(&native);

      Ok(ColumnDefinition {
        unique: unique_columns.contains(&name),
        name,
        data_type,
        nullable: !row.bool("not_null")? && !primary_key,
        primary_key,
        auto_increment: primary_key
          && autoincrement
          && data_type == DataType::Integer,
        default_value: row
          .opt_text("dflt_value")
          .map(|sql| DefaultValue::Expression { sql }),
        references: None,
      })
    })
    .collect::<Result<Vec<_>>>()?;

  let fk_rows = fetch(
    db,
    "SELECT \"from\" AS column_name, \"table\" AS foreign_table,
            \"to\" AS foreign_column, on_delete AS delete_rule
     FROM pragma_foreign_key_list(?1)",
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
  // origin 'c' = created by CREATE INDEX; 'u'/'pk' back constraints.
  let rows = fetch(
    db,
    "SELECT il.name AS index_name, il.\"unique\" AS is_unique,
            ii.name AS column_name
     FROM pragma_index_list(?1) AS il, pragma_index_info(il.name) AS ii
     WHERE il.origin = 'c'
     ORDER BY il.name, ii.seqno",
    &[Value::from(table)],
  )
  .await?;

  let indexes = fold_indexes(&rows, |row| row.bool("is_unique"))?;
  Ok(indexes.into_iter().filter(|i| !backs_added_unique_column(table, i)).collect())
}

fn backs_added_unique_column(table: &str, index: &IndexDefinition) -> bool {
  index.unique
    && matches!(
      (index.name.as_deref(), index.columns.as_slice()),
      (Some(name), [column]) if name == unique_column_index(table, column)
    )
}

pub(super) async fn table_triggers<D: Database>(
  db: &D,
  table: &str,
) -> Result<Vec<TriggerDefinition>> {
  let rows = fetch(
    db,
    "SELECT name, sql FROM sqlite_master
     WHERE type = 'trigger' AND tbl_name = ?1
     ORDER BY name",
    &[Value::from(table)],
  )
  .await?;

  let triggers = rows
    .iter()
    .map(|row| {
      let name = row.text("name")?;
      let sql = row.opt_text("sql").unwrap_or_default();
      Ok(parse_trigger_sql(name, &sql))
    })
    .collect::<Result<Vec<_>>>()?;

  Ok(dedup_triggers(triggers))
}

/// SQLite keeps only the original `CREATE TRIGGER` text, so timing, event
/// and body are recovered from it. SQLite's default timing is `BEFORE`.
pub(super) fn parse_trigger_sql(name: String, sql: &str) -> TriggerDefinition {
  let upper = sql.to_ascii_uppercase();
  let begin = find_keyword(&upper, "BEGIN");
  let header = &upper[..begin.unwrap_or(upper.len())];

  let mut timing = TriggerTiming::Before;
  let mut event = TriggerEvent::Insert;
  for word in header.split(|c: char| !c.is_ascii_alphanumeric() && c != '_') {
    match word {
      "BEFORE" => timing = TriggerTiming::Before,
      "AFTER" => timing = TriggerTiming::After,
      "INSERT" => {
        event = TriggerEvent::Insert;
        break;
      }
      "UPDATE" => {
        event = TriggerEvent::Update;
        break;
      }
      "DELETE" => {
        event = TriggerEvent::Delete;
        break;
      }
      _ => {}
    }
  }

  let statement = match (begin, upper.rfind("END")) {
    (Some(b), Some(e)) if e > b + 5 => sql[b + 5..e]
      .trim()
      .trim_end_matches(';')
      .trim_end()
      .to_owned(),
    _ => String::new(),
  };

  TriggerDefinition { name, timing, event, statement }
}

/// Byte offset of `keyword` as a whole word in `haystack`.
fn find_keyword(haystack: &str, keyword: &str) -> Option<usize> {
  let bytes = haystack.as_bytes();
  let is_word = |b: u8| b.is_ascii_alphanumeric() || b == b'_';

  haystack.match_indices(keyword).map(|(i, _)| i).find(|&i| {
    let before = i == 0 || !is_word(bytes[i - 1]);
    let end = i + keyword.len();
    let after = end >= bytes.len() || !is_word(bytes[end]);
    before && after
  })
}
