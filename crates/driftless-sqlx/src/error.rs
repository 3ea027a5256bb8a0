//! Error type for `driftless-sqlx`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("cannot decode column {column:?} of type {type_name}")]
  Decode { column: String, type_name: String },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
