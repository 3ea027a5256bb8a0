//! Postgres and MySQL backends for driftless, over `sqlx` connection pools.
//!
//! Catalog reads arrive as whatever column types the server reports; cells
//! are decoded into driftless [`Value`](driftless_core::Value)s by trying
//! text, then integer, float, boolean and raw bytes.

mod mysql;
mod postgres;
mod values;

pub mod error;

pub use error::{Error, Result};
pub use mysql::MySqlDatabase;
pub use postgres::PostgresDatabase;
