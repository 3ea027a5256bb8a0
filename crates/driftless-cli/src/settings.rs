//! Settings layered from an optional TOML file and `DRIFTLESS_*` variables.

use std::path::Path;

use anyhow::Context as _;
use driftless_core::DEFAULT_TRACKING_TABLE;
use serde::Deserialize;

/// File used when `--config` is not given. Missing is fine.
pub const DEFAULT_CONFIG_FILE: &str = "driftless.toml";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CliConfig {
  /// `sqlite:PATH`, `postgres://...` or `mysql://...`.
  #[serde(default)]
  pub database_url:   Option<String>,
  #[serde(default = "default_tracking_table")]
  pub tracking_table: String,
}

fn default_tracking_table() -> String { DEFAULT_TRACKING_TABLE.to_owned() }

impl CliConfig {
  pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
    let file = match path {
      Some(path) => config::File::from(path).required(true),
      None => config::File::with_name(DEFAULT_CONFIG_FILE).required(false),
    };

    config::Config::builder()
      .add_source(file)
      .add_source(config::Environment::with_prefix("DRIFTLESS"))
      .build()
      .context("failed to read configuration")?
      .try_deserialize()
      .context("failed to deserialise configuration")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn file_values_and_defaults() {
    let dir = std::env::temp_dir().join(format!("driftless-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("driftless.toml");
    std::fs::write(&path, "database_url = \"sqlite:app.db\"\n").unwrap();

    let config = CliConfig::load(Some(&path)).unwrap();

    assert_eq!(config.database_url.as_deref(), Some("sqlite:app.db"));
    assert_eq!(config.tracking_table, "kysely_schema");
    std::fs::remove_dir_all(&dir).ok();
  }

  #[test]
  fn explicit_missing_file_is_an_error() {
    let missing = std::env::temp_dir().join("driftless-definitely-missing.toml");
    assert!(CliConfig::load(Some(&missing)).is_err());
  }
}
