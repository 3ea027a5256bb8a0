//! Core types and the reconciliation engine for driftless.
//!
//! Callers describe the schema they want as a list of
//! [`TableDefinition`](schema::TableDefinition)s and hand the engine a live
//! connection implementing [`Database`](database::Database). The engine
//! introspects the live catalog, applies the add/drop operations needed to
//! converge, and appends a snapshot of the result to a tracking table.
//!
//! This crate has no driver dependencies; concrete connections live in
//! `driftless-sqlite` and `driftless-sqlx`.

pub mod database;
pub mod ddl;
pub mod error;
pub mod history;
pub mod introspect;
pub mod operation;
pub mod reconcile;
pub mod rollback;
pub mod schema;
pub mod sync;

pub use database::{Database, Dialect, Execution, Row, Value};
pub use error::{Error, Result};
pub use history::{DEFAULT_TRACKING_TABLE, HistoryStore, SchemaSnapshot, SnapshotSummary};
pub use operation::{Operation, Phase, SyncReport};
pub use schema::{
  ColumnDefinition, DataType, DefaultValue, ForeignKey, IndexDefinition,
  ReferentialAction, TableDefinition, TriggerDefinition, TriggerEvent,
  TriggerTiming,
};
pub use sync::{SchemaSync, SyncOptions};

#[cfg(test)]
mod fake;
