//! Schema history: append-only snapshots in a tracking table.
//!
//! Each successful synchronize or rollback appends exactly one row holding
//! the JSON-serialised schema it converged to. Rows are never updated; the
//! row with the highest id is the latest snapshot. The tracking table is
//! created by the first load of the previous schema or the first save;
//! listings never create it.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::{
  Error, Result,
  database::{Database, Dialect, Row, Value},
  ddl::quote_ident,
  introspect::Introspector,
  schema::TableDefinition,
};

/// Name of the tracking table unless configured otherwise.
pub const DEFAULT_TRACKING_TABLE: &str = "kysely_schema";

/// One stored schema version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaSnapshot {
  pub id:         i64,
  pub definition: Vec<TableDefinition>,
}

/// A snapshot reduced to its id and table names, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotSummary {
  pub id:     i64,
  pub tables: Vec<String>,
}

impl From<&SchemaSnapshot> for SnapshotSummary {
  fn from(snapshot: &SchemaSnapshot) -> Self {
    Self {
      id:     snapshot.id,
      tables: snapshot.definition.iter().map(|t| t.name.clone()).collect(),
    }
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Reads and appends snapshots in the tracking table of one connection.
pub struct HistoryStore<'a, D> {
  db:         &'a D,
  introspect: Introspector<'a, D>,
  table:      String,
}

impl<'a, D: Database> HistoryStore<'a, D> {
  pub fn new(db: &'a D, table: impl Into<String>) -> Result<Self> {
    Ok(Self {
      db,
      introspect: Introspector::new(db)?,
      table: table.into(),
    })
  }

  fn dialect(&self) -> Dialect { self.introspect.dialect() }

  fn quoted_table(&self) -> String { quote_ident(self.dialect(), &self.table) }

  /// The schema to diff against.
  ///
  /// A non-empty `explicit` schema is returned unchanged without touching
  /// the database. Otherwise the latest snapshot is loaded; a missing
  /// tracking table is created and yields an empty schema.
  pub async fn previous_schema(
    &self,
    explicit: &[TableDefinition],
  ) -> Result<Vec<TableDefinition>> {
    if !explicit.is_empty() {
      debug!(tables = explicit.len(), "using caller-supplied previous schema");
      return Ok(explicit.to_vec());
    }

    if !self.introspect.table_exists(&self.table).await? {
      self.create_table().await?;
      return Ok(vec![]);
    }

    Ok(self.latest().await?.map(|s| s.definition).unwrap_or_default())
  }

  /// Like [`previous_schema`](Self::previous_schema) but never creates the
  /// tracking table. Used for dry runs.
  pub async fn peek_previous_schema(
    &self,
    explicit: &[TableDefinition],
  ) -> Result<Vec<TableDefinition>> {
    if !explicit.is_empty() {
      return Ok(explicit.to_vec());
    }
    if !self.introspect.table_exists(&self.table).await? {
      return Ok(vec![]);
    }
    Ok(self.latest().await?.map(|s| s.definition).unwrap_or_default())
  }

  /// Append `schema` as the newest snapshot and return its id.
  pub async fn save(&self, schema: &[TableDefinition]) -> Result<i64> {
    let definition = serde_json::to_string(schema)?;
    // Callers that pass an explicit previous schema never triggered the
    // lazy creation in `previous_schema`.
    self.create_table().await?;

    let id = match self.dialect() {
      Dialect::Postgres => {
        let sql = format!(
          "INSERT INTO {} (definition) VALUES ($1) RETURNING id",
          self.quoted_table()
        );
        let rows = self
          .db
          .query(&sql, &[Value::Text(definition)])
          .await
          .map_err(Error::sql)?;
        rows
          .first()
          .ok_or_else(|| Error::Catalog("INSERT ... RETURNING yielded no row".into()))?
          .int("id")?
      }
      dialect @ (Dialect::Sqlite | Dialect::MySql) => {
        let sql = format!(
          "INSERT INTO {} (definition) VALUES ({})",
          self.quoted_table(),
          dialect.placeholder(1)
        );
        self
          .db
          .execute(&sql, &[Value::Text(definition)])
          .await
          .map_err(Error::sql)?
          .last_insert_id
          .ok_or_else(|| Error::Catalog("driver reported no insert id".into()))?
      }
    };

    info!(snapshot_id = id, tables = schema.len(), "saved schema snapshot");
    Ok(id)
  }

  /// The highest-id snapshot, if any.
  pub async fn latest(&self) -> Result<Option<SchemaSnapshot>> {
    let sql = format!(
      "SELECT id, definition FROM {} ORDER BY id DESC LIMIT 1",
      self.quoted_table()
    );
    let rows = self.db.query(&sql, &[]).await.map_err(Error::sql)?;
    rows.first().map(parse_snapshot).transpose()
  }

  /// A snapshot by id. Read-only: a missing tracking table yields `None`.
  pub async fn snapshot(&self, id: i64) -> Result<Option<SchemaSnapshot>> {
    if !self.introspect.table_exists(&self.table).await? {
      return Ok(None);
    }

    let sql = format!(
      "SELECT id, definition FROM {} WHERE id = {}",
      self.quoted_table(),
      self.dialect().placeholder(1)
    );
    let rows = self
      .db
      .query(&sql, &[Value::Integer(id)])
      .await
      .map_err(Error::sql)?;
    rows.first().map(parse_snapshot).transpose()
  }

  /// Every snapshot, oldest first. Read-only like [`snapshot`](Self::snapshot).
  pub async fn list(&self) -> Result<Vec<SnapshotSummary>> {
    if !self.introspect.table_exists(&self.table).await? {
      return Ok(vec![]);
    }

    let sql = format!(
      "SELECT id, definition FROM {} ORDER BY id",
      self.quoted_table()
    );
    let rows = self.db.query(&sql, &[]).await.map_err(Error::sql)?;
    rows
      .iter()
      .map(|row| parse_snapshot(row).map(|s| SnapshotSummary::from(&s)))
      .collect()
  }

  async fn create_table(&self) -> Result<()> {
    let table = self.quoted_table();
    let sql = match self.dialect() {
      Dialect::Sqlite => format!(
        "CREATE TABLE IF NOT EXISTS {table} (
           id INTEGER PRIMARY KEY AUTOINCREMENT,
           definition TEXT NOT NULL
         )"
      ),
      Dialect::Postgres => format!(
        "CREATE TABLE IF NOT EXISTS {table} (
           id SERIAL PRIMARY KEY,
           definition TEXT NOT NULL
         )"
      ),
      Dialect::MySql => format!(
        "CREATE TABLE IF NOT EXISTS {table} (
           id INTEGER PRIMARY KEY AUTO_INCREMENT,
           definition LONGTEXT NOT NULL
         )"
      ),
    };

    self.db.execute(&sql, &[]).await.map_err(Error::sql)?;
    debug!(table = %self.table, "ensured tracking table");
    Ok(())
  }
}

fn parse_snapshot(row: &Row) -> Result<SchemaSnapshot> {
  let id = row.int("id")?;
  let text = row.text("definition")?;
  let definition = serde_json::from_str(&text)
    .map_err(|source| Error::SchemaParse { id, source })?;
  Ok(SchemaSnapshot { id, definition })
}
