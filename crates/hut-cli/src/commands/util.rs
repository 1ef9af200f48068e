//! Shared utilities for CLI commands.

use std::fmt::{self, Write};

use anyhow::Context;
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use hut_core::{CascadeReport, MemberId, StayId};

/// Parse a datetime string as either RFC 3339 or a bare date.
///
/// Supports:
/// - RFC 3339: "2025-06-01T14:00:00Z", "2025-06-01T16:00:00+02:00"
/// - Date: "2025-06-01" (midnight UTC)
pub fn parse_datetime(s: &str) -> anyhow::Result<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| {
        format!("Invalid datetime: {s}. Use RFC 3339 (e.g., 2025-06-01T14:00:00Z) or a date (e.g., 2025-06-01)")
    })?;
    Ok(date.and_time(chrono::NaiveTime::MIN).and_utc())
}

/// Parse a bare `YYYY-MM-DD` date.
pub fn parse_date(s: &str) -> anyhow::Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .with_context(|| format!("Invalid date: {s}. Use YYYY-MM-DD (e.g., 2025-03-01)"))
}

/// Formats a timestamp the way it is stored.
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Formats burner hours with two decimals.
pub fn format_hours(hours: f64) -> String {
    format!("{hours:.2}")
}

pub fn parse_member(s: &str) -> anyhow::Result<MemberId> {
    MemberId::new(s).context("invalid member")
}

pub fn parse_stay_id(s: &str) -> anyhow::Result<StayId> {
    StayId::new(s).context("invalid stay ID")
}

/// One line per outcome of a cascade.
pub fn format_cascade(report: &CascadeReport) -> Result<String, fmt::Error> {
    let mut output = String::new();
    if !report.updated.is_empty() {
        writeln!(output, "Recalculated {} other stay(s).", report.updated.len())?;
    }
    for failure in &report.failed {
        writeln!(
            output,
            "Warning: could not update stay {}: {}",
            failure.stay_id, failure.error
        )?;
    }
    if !report.failed.is_empty() {
        writeln!(output, "  Run 'hut recompute' to repair.")?;
    }
    Ok(output)
}
