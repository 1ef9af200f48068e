//! Recompute the burner-hour split of every stay.
//!
//! Repairs values left stale when a cascade could not update a stay.

use std::fmt::{self, Write as _};
use std::io::Write;

use anyhow::{Context, Result};
use hut_core::{RecomputeReport, recalculate_all};
use hut_db::Database;

use super::util::format_hours;

pub fn run<W: Write>(writer: &mut W, db: &mut Database) -> Result<()> {
    let report = recalculate_all(db).context("failed to load stays")?;
    tracing::debug!(
        checked = report.checked,
        changed = report.changed.len(),
        failed = report.failed.len(),
        "recompute finished"
    );
    write!(writer, "{}", format_report(&report)?)?;
    if !report.failed.is_empty() {
        anyhow::bail!("{} stay(s) could not be updated", report.failed.len());
    }
    Ok(())
}

pub fn format_report(report: &RecomputeReport) -> Result<String, fmt::Error> {
    let mut output = String::new();
    writeln!(
        output,
        "Checked {} stay(s), {} changed.",
        report.checked,
        report.changed.len()
    )?;
    for change in &report.changed {
        let shared = if change.has_overlaps { " (shared)" } else { "" };
        writeln!(
            output,
            "  {}: {} h -> {} h{shared}",
            change.stay_id.short(),
            format_hours(change.previous_hours),
            format_hours(change.adjusted_hours)
        )?;
    }
    for failure in &report.failed {
        writeln!(
            output,
            "Warning: could not update stay {}: {}",
            failure.stay_id, failure.error
        )?;
    }
    Ok(output)
}
