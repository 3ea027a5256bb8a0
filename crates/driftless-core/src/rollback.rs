//! Rollback: undo table additions.
//!
//! Rollback is a partial inverse of synchronize. Tables present in the
//! desired schema but absent from the previous one are dropped; nothing
//! else is restored. Removed tables are not re-created, and column, index
//! and trigger changes are not reverted.

use std::collections::HashSet;

use tracing::info;

use crate::{
  Result,
  database::Database,
  reconcile::Reconciler,
  schema::{TableDefinition, table_names},
};

impl<D: Database> Reconciler<'_, D> {
  /// Drop every table named in `desired` but absent from `previous`.
  /// Tables already gone are skipped.
  pub async fn drop_added_tables(
    &mut self,
    desired: &[TableDefinition],
    previous: &[TableDefinition],
  ) -> Result<()> {
    let known: HashSet<&str> = table_names(previous).into_iter().collect();

    for name in table_names(desired) {
      if known.contains(name) {
        continue;
      }
      if !self.drop_table_if_exists(name).await? {
        info!(table = name, "added table already absent, skipping");
      }
    }
    Ok(())
  }
}
