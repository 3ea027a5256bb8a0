//! Reconciliation operations and run reports.
//!
//! Every DDL statement the engine issues corresponds to exactly one
//! [`Operation`]. Operations are collected in the order they were applied so
//! a caller can see how far a run got, on success or failure.

use std::fmt;

use serde::{Deserialize, Serialize};
use strum::Display;

/// One schema change applied (or, in a dry run, planned) against the live
/// database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
  CreateTable { table: String },
  DropTable { table: String },
  AddColumn { table: String, column: String },
  CreateIndex { table: String, index: String },
  DropIndex { table: String, index: String },
  CreateTrigger { table: String, trigger: String },
  DropTrigger { table: String, trigger: String },
}

impl Operation {
  /// The table the operation targets.
  pub fn table(&self) -> &str {
    match self {
      Self::CreateTable { table }
      | Self::DropTable { table }
      | Self::AddColumn { table, .. }
      | Self::CreateIndex { table, .. }
      | Self::DropIndex { table, .. }
      | Self::CreateTrigger { table, .. }
      | Self::DropTrigger { table, .. } => table,
    }
  }

  /// Whether the operation removes something from the database.
  pub fn is_destructive(&self) -> bool {
    matches!(
      self,
      Self::DropTable { .. } | Self::DropIndex { .. } | Self::DropTrigger { .. }
    )
  }
}

impl fmt::Display for Operation {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::CreateTable { table } => write!(f, "create table {table}"),
      Self::DropTable { table } => write!(f, "drop table {table}"),
      Self::AddColumn { table, column } => {
        write!(f, "add column {table}.{column}")
      }
      Self::CreateIndex { table, index } => {
        write!(f, "create index {index} on {table}")
      }
      Self::DropIndex { table, index } => {
        write!(f, "drop index {index} on {table}")
      }
      Self::CreateTrigger { table, trigger } => {
        write!(f, "create trigger {trigger} on {table}")
      }
      Self::DropTrigger { table, trigger } => {
        write!(f, "drop trigger {trigger} on {table}")
      }
    }
  }
}

/// The step of a synchronize or rollback run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "snake_case")]
pub enum Phase {
  LoadPreviousSchema,
  DropRemovedTables,
  DropAddedTables,
  PerTableReconciliation,
  PersistSnapshot,
}

/// The outcome of a successful run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
  /// Operations in the order they were applied (or would be, for a plan).
  pub operations:  Vec<Operation>,
  /// Id of the snapshot row written; `None` for dry runs.
  pub snapshot_id: Option<i64>,
  pub dry_run:     bool,
}

impl SyncReport {
  pub fn is_noop(&self) -> bool { self.operations.is_empty() }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn display_and_table() {
    let op = Operation::AddColumn { table: "users".into(), column: "email".into() };
    assert_eq!(op.to_string(), "add column users.email");
    assert_eq!(op.table(), "users");
    assert!(!op.is_destructive());
    assert!(Operation::DropTable { table: "x".into() }.is_destructive());
  }

  #[test]
  fn phase_names_are_snake_case() {
    assert_eq!(Phase::PerTableReconciliation.to_string(), "per_table_reconciliation");
  }
}
