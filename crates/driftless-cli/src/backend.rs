//! Backend selection from a database URL.

use std::path::PathBuf;

use anyhow::{Context as _, bail};
use driftless_core::Dialect;

/// Where to connect, as decided by the URL scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
  SqliteMemory,
  SqliteFile(PathBuf),
  Postgres(String),
  MySql(String),
}

impl Target {
  /// `sqlite::memory:`, `sqlite:PATH` (or `sqlite://PATH`), `postgres://...`
  /// and `mysql://...`; scheme aliases such as `postgresql` and `mariadb`
  /// are accepted.
  pub fn parse(url: &str) -> anyhow::Result<Self> {
    let (scheme, rest) = url
      .split_once(':')
      .with_context(|| format!("database url {url:?} has no scheme"))?;
    let dialect = Dialect::determine(scheme)
      .with_context(|| format!("unsupported database url {url:?}"))?;

    Ok(match dialect {
      Dialect::Sqlite => {
        let path = rest.strip_prefix("//").unwrap_or(rest);
        match path {
          "" => bail!("sqlite url {url:?} names no file"),
          ":memory:" => Self::SqliteMemory,
          path => Self::SqliteFile(PathBuf::from(path)),
        }
      }
      Dialect::Postgres => Self::Postgres(url.to_owned()),
      Dialect::MySql => Self::MySql(url.to_owned()),
    })
  }
}
