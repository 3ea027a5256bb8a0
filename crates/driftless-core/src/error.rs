//! Error types for `driftless-core`.

use thiserror::Error;

use crate::operation::{Operation, Phase};

#[derive(Debug, Error)]
pub enum Error {
  /// A statement executed against the live connection failed.
  #[error("sql error: {0}")]
  Sql(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("cannot determine SQL dialect from connection (declared {0:?})")]
  DialectDetermination(String),

  /// A stored snapshot's definition is not a valid schema.
  #[error("snapshot {id} is not a valid schema definition: {source}")]
  SchemaParse {
    id:     i64,
    #[source]
    source: serde_json::Error,
  },

  #[error("invalid schema: {0}")]
  InvalidSchema(String),

  #[error("unexpected catalog data: {0}")]
  Catalog(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),

  /// A run aborted part-way. `applied` lists the operations that completed
  /// before the failure; they are not undone.
  #[error("{phase} failed after {} applied operation(s): {source}", .applied.len())]
  Failed {
    phase:   Phase,
    applied: Vec<Operation>,
    #[source]
    source:  Box<Error>,
  },

  /// A panic raised while the run was in progress.
  #[error("defect during schema run: {0}")]
  Defect(String),
}

impl Error {
  /// Wrap a driver error.
  pub fn sql(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Sql(Box::new(e))
  }

  /// The underlying cause, looking through [`Error::Failed`].
  pub fn root(&self) -> &Error {
    match self {
      Self::Failed { source, .. } => source.root(),
      other => other,
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
