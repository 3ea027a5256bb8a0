//! `driftless`: converge a live database onto a declarative JSON schema.
//!
//! # Usage
//!
//! ```text
//! driftless --database sqlite:app.db sync --schema schema.json
//! driftless --database postgres://localhost/app sync --schema schema.json --dry-run
//! driftless rollback --schema schema.json --to 4
//! driftless history
//! driftless show 4
//! ```
//!
//! Settings come from `driftless.toml` (or `--config`) and `DRIFTLESS_*`
//! environment variables; flags override both.

mod backend;
mod report;
mod settings;

use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use backend::Target;
use clap::{Parser, Subcommand};
use driftless_core::{Database, SchemaSync, SyncOptions, TableDefinition};
use driftless_sqlite::SqliteDatabase;
use driftless_sqlx::{MySqlDatabase, PostgresDatabase};
use settings::CliConfig;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "driftless", version, about = "Declarative database schema synchronization")]
struct Args {
  /// Path to a TOML config file (database_url, tracking_table).
  #[arg(short, long, value_name = "FILE")]
  config: Option<PathBuf>,

  /// Database URL; overrides the config file.
  #[arg(short, long, value_name = "URL")]
  database: Option<String>,

  /// Name of the schema history table; overrides the config file.
  #[arg(long, value_name = "TABLE")]
  tracking_table: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Converge the database onto a schema file.
  Sync {
    /// Desired schema (JSON array of table definitions).
    #[arg(long, value_name = "FILE")]
    schema:   PathBuf,
    /// Schema to diff removals against instead of the latest snapshot.
    #[arg(long, value_name = "FILE")]
    previous: Option<PathBuf>,
    /// Print the operations without applying them.
    #[arg(long)]
    dry_run:  bool,
  },
  /// Drop the tables a schema added since a previous one.
  Rollback {
    #[arg(long, value_name = "FILE")]
    schema:   PathBuf,
    #[arg(long, value_name = "FILE", conflicts_with = "to")]
    previous: Option<PathBuf>,
    /// Use stored snapshot ID as the previous schema.
    #[arg(long, value_name = "ID")]
    to:       Option<i64>,
  },
  /// List stored schema snapshots.
  History,
  /// Print a stored snapshot as JSON.
  Show { id: i64 },
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .with_writer(std::io::stderr)
    .init();

  let args = Args::parse();
  let mut config = CliConfig::load(args.config.as_deref())?;
  if let Some(url) = args.database {
    config.database_url = Some(url);
  }
  if let Some(table) = args.tracking_table {
    config.tracking_table = table;
  }

  let url = config
    .database_url
    .clone()
    .context("no database url; pass --database or set DRIFTLESS_DATABASE_URL")?;

  match Target::parse(&url)? {
    Target::SqliteMemory => {
      let db = SqliteDatabase::open_in_memory()
        .await
        .context("failed to open in-memory sqlite database")?;
      run(db, &config, args.command).await
    }
    Target::SqliteFile(path) => {
      let db = SqliteDatabase::open(&path)
        .await
        .with_context(|| format!("failed to open sqlite database at {path:?}"))?;
      run(db, &config, args.command).await
    }
    Target::Postgres(url) => {
      let db = PostgresDatabase::connect(&url)
        .await
        .context("failed to connect to postgres")?;
      run(db, &config, args.command).await
    }
    Target::MySql(url) => {
      let db = MySqlDatabase::connect(&url)
        .await
        .context("failed to connect to mysql")?;
      run(db, &config, args.command).await
    }
  }
}

async fn run<D: Database>(db: D, config: &CliConfig, command: Command) -> Result<()> {
  let dry_run = matches!(command, Command::Sync { dry_run: true, .. });
  let sync = SchemaSync::with_options(db, SyncOptions {
    tracking_table: config.tracking_table.clone(),
    dry_run,
  });

  match command {
    Command::Sync { schema, previous, .. } => {
      let desired = load_schema(&schema)?;
      let previous = previous
        .as_deref()
        .map(load_schema)
        .transpose()?
        .unwrap_or_default();

      let report = sync
        .synchronize(&desired, &previous)
        .await
        .context("synchronize failed")?;
      print!("{}", report::render_report(&report));
    }
    Command::Rollback { schema, previous, to } => {
      let desired = load_schema(&schema)?;
      let previous = match (previous, to) {
        (Some(path), _) => load_schema(&path)?,
        (None, Some(id)) => {
          sync
            .snapshot(id)
            .await?
            .with_context(|| format!("no snapshot with id {id}"))?
            .definition
        }
        (None, None) => vec![],
      };

      let report = sync
        .rollback(&desired, &previous)
        .await
        .context("rollback failed")?;
      print!("{}", report::render_report(&report));
    }
    Command::History => {
      let history = sync.history().await?;
      print!("{}", report::render_history(&history));
    }
    Command::Show { id } => {
      let snapshot = sync
        .snapshot(id)
        .await?
        .with_context(|| format!("no snapshot with id {id}"))?;
      println!("{}", serde_json::to_string_pretty(&snapshot.definition)?);
    }
  }

  Ok(())
}

fn load_schema(path: &Path) -> Result<Vec<TableDefinition>> {
  let raw = std::fs::read_to_string(path)
    .with_context(|| format!("reading schema file {}", path.display()))?;
  serde_json::from_str(&raw)
    .with_context(|| format!("parsing schema file {}", path.display()))
}
