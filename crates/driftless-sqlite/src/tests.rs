//! Engine tests against in-memory SQLite databases.

use driftless_core::{
  ColumnDefinition, DataType, Database, DefaultValue, Error, IndexDefinition,
  Operation, Phase, ReferentialAction, SchemaSync, SyncOptions, TableDefinition,
  TriggerDefinition, TriggerEvent, TriggerTiming, Value, introspect::Introspector,
};

use crate::SqliteDatabase;

async fn engine() -> SchemaSync<SqliteDatabase> {
  let db = SqliteDatabase::open_in_memory()
    .await
    .expect("in-memory database");
  SchemaSync::new(db)
}

async fn column_names(sync: &SchemaSync<SqliteDatabase>, table: &str) -> Vec<String> {
  Introspector::new(sync.database())
    .unwrap()
    .table_columns(table)
    .await
    .unwrap()
    .into_iter()
    .map(|c| c.name)
    .collect()
}

async fn exists(sync: &SchemaSync<SqliteDatabase>, table: &str) -> bool {
  Introspector::new(sync.database())
    .unwrap()
    .table_exists(table)
    .await
    .unwrap()
}

fn id() -> ColumnDefinition {
  ColumnDefinition::new("id", DataType::Integer)
    .primary_key()
    .auto_increment()
}

fn touch_trigger() -> TriggerDefinition {
  TriggerDefinition {
    name:      "users_touch".into(),
    timing:    TriggerTiming::After,
    event:     TriggerEvent::Update,
    statement: "UPDATE users SET touched = touched + 1 WHERE id = NEW.id".into(),
  }
}

fn users() -> TableDefinition {
  TableDefinition::new("users")
    .column(id())
    .column(ColumnDefinition::new("email", DataType::Text).not_null().unique())
    .column(
      ColumnDefinition::new("touched", DataType::Integer)
        .not_null()
        .default_value(DefaultValue::Integer(0)),
    )
    .index(IndexDefinition::new(["email", "touched"]))
    .trigger(touch_trigger())
}

// ─── Convergence ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn synchronize_is_idempotent() {
  let s = engine().await;
  let schema = [users()];

  let first = s.synchronize(&schema, &schema).await.unwrap();
  assert_eq!(
    first.operations,
    [
      Operation::CreateTable { table: "users".into() },
      Operation::CreateIndex {
        table: "users".into(),
        index: "idx_users_email_touched".into(),
      },
      Operation::CreateTrigger {
        table:   "users".into(),
        trigger: "users_touch".into(),
      },
    ]
  );

  let second = s.synchronize(&schema, &schema).await.unwrap();
  assert!(second.is_noop(), "{:?}", second.operations);

  let (a, b) = (first.snapshot_id.unwrap(), second.snapshot_id.unwrap());
  assert!(b > a);
}

#[tokio::test]
async fn additive_convergence() {
  let s = engine().await;
  let t = |extra: bool| {
    let mut t = TableDefinition::new("t")
      .column(ColumnDefinition::new("a", DataType::Integer))
      .column(ColumnDefinition::new("b", DataType::Text));
    if extra {
      t = t.column(ColumnDefinition::new("c", DataType::Boolean));
    }
    t
  };
  let (s1, s2) = ([t(false)], [t(true)]);

  s.synchronize(&s1, &[]).await.unwrap();
  let report = s.synchronize(&s2, &s1).await.unwrap();

  assert_eq!(
    report.operations,
    [Operation::AddColumn { table: "t".into(), column: "c".into() }]
  );
  assert_eq!(column_names(&s, "t").await, ["a", "b", "c"]);
}

#[tokio::test]
async fn added_unique_column_keeps_its_constraint() {
  let s = engine().await;
  let plain = TableDefinition::new("t").column(id());
  let slugged = plain
    .clone()
    .column(ColumnDefinition::new("slug", DataType::Text).unique());

  s.synchronize(&[plain], &[]).await.unwrap();
  let report = s.synchronize(&[slugged.clone()], &[]).await.unwrap();
  assert_eq!(
    report.operations,
    [Operation::AddColumn { table: "t".into(), column: "slug".into() }]
  );

  let i = Introspector::new(s.database()).unwrap();
  let slug = &i.table_columns("t").await.unwrap()[1];
  assert!(slug.unique);
  assert!(i.table_indexes("t").await.unwrap().is_empty());

  // The stand-in index is not diffed away on the next run.
  let again = s.synchronize(&[slugged], &[]).await.unwrap();
  assert!(again.is_noop(), "{:?}", again.operations);

  let insert = "INSERT INTO t (slug) VALUES ('a')";
  s.database().execute(insert, &[]).await.unwrap();
  assert!(s.database().execute(insert, &[]).await.is_err());
}

#[tokio::test]
async fn existing_columns_are_never_altered_or_dropped() {
  let s = engine().await;
  let wide = TableDefinition::new("t")
    .column(ColumnDefinition::new("a", DataType::Integer))
    .column(ColumnDefinition::new("b", DataType::Text));
  let narrow = TableDefinition::new("t")
    .column(ColumnDefinition::new("a", DataType::Text).not_null());

  s.synchronize(&[wide], &[]).await.unwrap();
  let report = s.synchronize(&[narrow], &[]).await.unwrap();

  assert!(report.is_noop());
  assert_eq!(column_names(&s, "t").await, ["a", "b"]);
}

#[tokio::test]
async fn removed_tables_are_dropped() {
  let s = engine().await;
  let a = TableDefinition::new("a").column(id());
  let b = TableDefinition::new("b").column(id());

  s.synchronize(&[a.clone(), b.clone()], &[]).await.unwrap();
  let report = s.synchronize(&[a.clone()], &[a.clone(), b]).await.unwrap();

  assert_eq!(report.operations, [Operation::DropTable { table: "b".into() }]);
  assert!(exists(&s, "a").await);
  assert!(!exists(&s, "b").await);
}

#[tokio::test]
async fn removal_uses_stored_history() {
  let s = engine().await;
  let a = TableDefinition::new("a").column(id());
  let b = TableDefinition::new("b").column(id());

  s.synchronize(&[a.clone(), b], &[]).await.unwrap();
  s.synchronize(&[a], &[]).await.unwrap();

  assert!(!exists(&s, "b").await);
}

#[tokio::test]
async fn removed_table_already_absent_is_skipped() {
  let s = engine().await;
  let a = TableDefinition::new("a").column(id());
  let ghost = TableDefinition::new("ghost").column(id());

  let report = s.synchronize(&[a.clone()], &[a, ghost]).await.unwrap();

  assert_eq!(report.operations, [Operation::CreateTable { table: "a".into() }]);
}

#[tokio::test]
async fn deprecated_tables_are_dropped_if_present() {
  let s = engine().await;
  let legacy = TableDefinition::new("legacy").column(id());

  s.synchronize(&[legacy.clone()], &[]).await.unwrap();
  let report = s
    .synchronize(&[legacy.clone().deprecated()], &[])
    .await
    .unwrap();
  assert_eq!(report.operations, [Operation::DropTable { table: "legacy".into() }]);
  assert!(!exists(&s, "legacy").await);

  let again = s.synchronize(&[legacy.deprecated()], &[]).await.unwrap();
  assert!(again.is_noop());
  assert!(!exists(&s, "legacy").await);
}

#[tokio::test]
async fn indexes_and_triggers_are_diffed_by_name() {
  let s = engine().await;
  let bare = TableDefinition::new("users")
    .column(id())
    .column(ColumnDefinition::new("email", DataType::Text).not_null().unique())
    .column(ColumnDefinition::new("touched", DataType::Integer));

  s.synchronize(&[bare.clone()], &[]).await.unwrap();

  let decorated = bare
    .clone()
    .index(IndexDefinition::new(["touched"]).named("users_by_touch"))
    .trigger(touch_trigger());
  let added = s.synchronize(&[decorated], &[]).await.unwrap();
  assert_eq!(
    added.operations,
    [
      Operation::CreateIndex {
        table: "users".into(),
        index: "users_by_touch".into(),
      },
      Operation::CreateTrigger {
        table:   "users".into(),
        trigger: "users_touch".into(),
      },
    ]
  );

  let removed = s.synchronize(&[bare], &[]).await.unwrap();
  assert_eq!(
    removed.operations,
    [
      Operation::DropIndex {
        table: "users".into(),
        index: "users_by_touch".into(),
      },
      Operation::DropTrigger {
        table:   "users".into(),
        trigger: "users_touch".into(),
      },
    ]
  );

  let i = Introspector::new(s.database()).unwrap();
  assert!(i.table_indexes("users").await.unwrap().is_empty());
  assert!(i.table_triggers("users").await.unwrap().is_empty());
}

#[tokio::test]
async fn introspection_reads_back_created_tables() {
  let s = engine().await;
  let orgs = TableDefinition::new("orgs").column(id());
  let members = TableDefinition::new("members")
    .column(
      ColumnDefinition::new("org_id", DataType::Integer)
        .primary_key()
        .references("orgs", "id")
        .on_delete(ReferentialAction::Cascade),
    )
    .column(ColumnDefinition::new("user_id", DataType::Integer).primary_key())
    .column(ColumnDefinition::new("role", DataType::Text).unique());

  s.synchronize(&[orgs, members], &[]).await.unwrap();

  let i = Introspector::new(s.database()).unwrap();
  let cols = i.table_columns("members").await.unwrap();
  assert!(cols[0].primary_key && cols[1].primary_key);
  assert!(!cols[0].auto_increment);
  let fk = cols[0].references.as_ref().expect("foreign key");
  assert_eq!((fk.table.as_str(), fk.column.as_str()), ("orgs", "id"));
  assert_eq!(fk.on_delete, Some(ReferentialAction::Cascade));
  assert!(cols[2].unique && cols[2].nullable);
  // Constraint-backed indexes are not reported.
  assert!(i.table_indexes("members").await.unwrap().is_empty());

  let orgs_id = &i.table_columns("orgs").await.unwrap()[0];
  assert!(orgs_id.primary_key && orgs_id.auto_increment);
}

// ─── Rollback and history ────────────────────────────────────────────────────

fn scenario() -> (Vec<TableDefinition>, Vec<TableDefinition>) {
  let s1 = serde_json::from_str(
    r#"[{"name":"users","columns":[{"name":"id","dataType":"integer","primaryKey":true}]}]"#,
  )
  .unwrap();
  let s2 = serde_json::from_str(
    r#"[
      {"name":"users","columns":[
        {"name":"id","dataType":"integer","primaryKey":true},
        {"name":"email","dataType":"text"}
      ]},
      {"name":"sessions","columns":[{"name":"id","dataType":"text","primaryKey":true}]}
    ]"#,
  )
  .unwrap();
  (s1, s2)
}

#[tokio::test]
async fn users_and_sessions_scenario() {
  let s = engine().await;
  let (s1, s2) = scenario();
  s.synchronize(&s1, &[]).await.unwrap();

  let forward = s.synchronize(&s2, &s1).await.unwrap();
  assert_eq!(
    forward.operations,
    [
      Operation::AddColumn { table: "users".into(), column: "email".into() },
      Operation::CreateTable { table: "sessions".into() },
    ]
  );
  assert_eq!(column_names(&s, "users").await, ["id", "email"]);
  assert!(exists(&s, "sessions").await);
  assert_eq!(s.previous_schema(&[]).await.unwrap(), s2);

  let back = s.rollback(&s2, &s1).await.unwrap();
  assert_eq!(back.operations, [Operation::DropTable { table: "sessions".into() }]);
  assert!(!exists(&s, "sessions").await);
  assert_eq!(s.previous_schema(&[]).await.unwrap(), s1);
  // Rollback only removes added tables.
  assert_eq!(column_names(&s, "users").await, ["id", "email"]);
}

#[tokio::test]
async fn rollback_to_a_stored_snapshot() {
  let s = engine().await;
  let (s1, s2) = scenario();

  let first = s.synchronize(&s1, &[]).await.unwrap();
  s.synchronize(&s2, &[]).await.unwrap();

  let target = s
    .snapshot(first.snapshot_id.unwrap())
    .await
    .unwrap()
    .expect("first snapshot");
  let back = s.rollback(&s2, &target.definition).await.unwrap();

  assert_eq!(back.operations, [Operation::DropTable { table: "sessions".into() }]);
  assert_eq!(s.previous_schema(&[]).await.unwrap(), s1);
}

#[tokio::test]
async fn rollback_without_override_uses_latest_snapshot() {
  let s = engine().await;
  let (s1, s2) = scenario();
  s.synchronize(&s1, &[]).await.unwrap();
  s.synchronize(&s2, &[]).await.unwrap();

  let back = s.rollback(&s2, &[]).await.unwrap();

  // The latest snapshot already lists every desired table.
  assert!(back.is_noop(), "{:?}", back.operations);
  assert!(exists(&s, "sessions").await);
  assert_eq!(s.history().await.unwrap().len(), 3);
  assert_eq!(s.previous_schema(&[]).await.unwrap(), s2);
}

#[tokio::test]
async fn rollback_with_empty_history_drops_every_desired_table() {
  let s = engine().await;
  let (_, s2) = scenario();
  s.database()
    .execute("CREATE TABLE users (id INTEGER PRIMARY KEY)", &[])
    .await
    .unwrap();

  let back = s.rollback(&s2, &[]).await.unwrap();

  assert_eq!(back.operations, [Operation::DropTable { table: "users".into() }]);
  assert!(!exists(&s, "users").await);
  assert!(s.previous_schema(&[]).await.unwrap().is_empty());
  assert_eq!(s.history().await.unwrap().len(), 1);
}

#[tokio::test]
async fn history_is_listed_oldest_first() {
  let s = engine().await;
  assert!(s.history().await.unwrap().is_empty());

  let (s1, s2) = scenario();
  s.synchronize(&s1, &[]).await.unwrap();
  s.synchronize(&s2, &[]).await.unwrap();

  let history = s.history().await.unwrap();
  assert_eq!(history.len(), 2);
  assert!(history[0].id < history[1].id);
  assert_eq!(history[0].tables, ["users"]);
  assert_eq!(history[1].tables, ["users", "sessions"]);
  assert_eq!(s.snapshot(9999).await.unwrap(), None);
}

#[tokio::test]
async fn previous_schema_creates_tracking_table() {
  let s = engine().await;

  assert!(s.previous_schema(&[]).await.unwrap().is_empty());
  assert!(exists(&s, "kysely_schema").await);
}

#[tokio::test]
async fn reading_history_does_not_create_tracking_table() {
  let s = engine().await;

  assert!(s.history().await.unwrap().is_empty());
  assert_eq!(s.snapshot(1).await.unwrap(), None);
  assert!(!exists(&s, "kysely_schema").await);
}

#[tokio::test]
async fn explicit_previous_schema_is_returned_unchanged() {
  let s = engine().await;
  let (s1, _) = scenario();

  assert_eq!(s.previous_schema(&s1).await.unwrap(), s1);
  assert!(!exists(&s, "kysely_schema").await);
}

#[tokio::test]
async fn corrupt_snapshot_fails_loudly() {
  let s = engine().await;
  let (s1, s2) = scenario();
  s.synchronize(&s1, &[]).await.unwrap();
  s.database()
    .execute(
      "INSERT INTO kysely_schema (definition) VALUES (?1)",
      &[Value::from("{not json")],
    )
    .await
    .unwrap();

  let err = s.previous_schema(&[]).await.unwrap_err();
  assert!(matches!(err, Error::SchemaParse { .. }), "{err}");

  let err = s.synchronize(&s2, &[]).await.unwrap_err();
  assert!(matches!(
    err,
    Error::Failed { phase: Phase::LoadPreviousSchema, .. }
  ));
  assert!(matches!(err.root(), Error::SchemaParse { .. }));
  assert!(!exists(&s, "sessions").await);
}

// ─── Failures and planning ───────────────────────────────────────────────────

#[tokio::test]
async fn failing_ddl_reports_applied_operations() {
  let s = engine().await;
  let broken = TableDefinition::new("t").column(id()).trigger(TriggerDefinition {
    name:      "t_bad".into(),
    timing:    TriggerTiming::Before,
    event:     TriggerEvent::Insert,
    statement: "THIS IS NOT SQL".into(),
  });

  let err = s.synchronize(&[broken], &[]).await.unwrap_err();

  let Error::Failed { phase, applied, source } = err else {
    panic!("expected a phase failure");
  };
  assert_eq!(phase, Phase::PerTableReconciliation);
  assert_eq!(applied, [Operation::CreateTable { table: "t".into() }]);
  assert!(matches!(*source, Error::Sql(_)));
  // No transaction spans the run.
  assert!(exists(&s, "t").await);
  assert!(s.history().await.unwrap().is_empty());
}

#[tokio::test]
async fn dry_run_plans_without_touching_the_database() {
  let db = SqliteDatabase::open_in_memory().await.unwrap();
  let options = SyncOptions { dry_run: true, ..SyncOptions::default() };
  let s = SchemaSync::with_options(db, options);

  let report = s.synchronize(&[users()], &[]).await.unwrap();

  assert!(report.dry_run);
  assert_eq!(report.snapshot_id, None);
  assert_eq!(report.operations.len(), 3);
  assert!(!exists(&s, "users").await);
  assert!(!exists(&s, "kysely_schema").await);
}

#[tokio::test]
async fn plan_matches_the_following_synchronize() {
  let s = engine().await;
  let (s1, s2) = scenario();
  s.synchronize(&s1, &[]).await.unwrap();

  let plan = s.plan(&s2, &[]).await.unwrap();
  let applied = s.synchronize(&s2, &[]).await.unwrap();

  assert_eq!(plan.operations, applied.operations);
}
