//! Plain-text rendering of run results for the terminal.

use std::fmt::Write as _;

use driftless_core::{SnapshotSummary, SyncReport};

pub fn render_report(report: &SyncReport) -> String {
  let mut out = String::new();
  let verb = if report.dry_run { "planned" } else { "applied" };

  if report.is_noop() {
    let _ = writeln!(out, "schema is up to date; nothing {verb}");
  } else {
    let _ = writeln!(out, "{verb} {} operation(s):", report.operations.len());
    for op in &report.operations {
      let marker = if op.is_destructive() { '-' } else { '+' };
      let _ = writeln!(out, "  {marker} {op}");
    }
  }
  if let Some(id) = report.snapshot_id {
    let _ = writeln!(out, "recorded snapshot {id}");
  }
  out
}

pub fn render_history(history: &[SnapshotSummary]) -> String {
  if history.is_empty() {
    return "no snapshots recorded\n".to_owned();
  }
  history.iter().fold(String::new(), |mut out, s| {
    let _ = writeln!(out, "{:>6}  {}", s.id, s.tables.join(", "));
    out
  })
}
