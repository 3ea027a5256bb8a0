//! SQLite backend for driftless.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated
//! thread without blocking the async runtime.

mod database;
mod encode;

pub mod error;

pub use database::SqliteDatabase;
pub use error::{Error, Result};

#[cfg(test)]
mod tests;
