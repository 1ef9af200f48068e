//! Burner usage of a year next to the year before.

use std::fmt::{self, Write as _};
use std::io::Write;

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use hut_core::{MemberId, YearlyStatistics};
use hut_db::Database;
use serde::Serialize;

use super::util::{format_hours, parse_member};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

#[derive(Debug, Serialize)]
pub struct StatsReport {
    pub current: YearlyStatistics,
    pub previous: YearlyStatistics,
}

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    year: Option<i32>,
    member: Option<&str>,
    json: bool,
) -> Result<()> {
    let member_id = member.map(parse_member).transpose()?;
    let year = year.unwrap_or_else(|| Utc::now().year());
    let report = StatsReport {
        current: load(db, year, member_id.as_ref())?,
        previous: load(db, year - 1, member_id.as_ref())?,
    };

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        write!(writer, "{}", format_report(&report)?)?;
    }
    Ok(())
}

fn load(db: &Database, year: i32, member: Option<&MemberId>) -> Result<YearlyStatistics> {
    let stays = db
        .list_stays(None, Some(year))
        .context("failed to load stays")?;
    let fillings = db
        .list_tank_fillings(Some(year))
        .context("failed to load tank fillings")?;
    let prices = db.prices_for_year(year)?;
    Ok(YearlyStatistics::build(
        year,
        &stays,
        &fillings,
        prices.as_ref(),
        member,
    ))
}

pub fn format_report(report: &StatsReport) -> Result<String, fmt::Error> {
    let current = &report.current;
    let previous = &report.previous;
    let mut output = String::new();

    writeln!(output, "STATISTICS: {}", current.year)?;
    writeln!(output)?;
    writeln!(output, "Stays:          {}", current.stays)?;
    writeln!(output, "Burner hours:   {}", format_hours(current.burner_hours))?;
    writeln!(output, "Idle hours:     {}", format_hours(current.idle_hours))?;
    writeln!(output, "Member nights:  {}", current.member_nights)?;
    writeln!(output, "Guest nights:   {}", current.guest_nights)?;
    match current.oil_liters {
        Some(liters) => writeln!(output, "Oil burnt:      {liters:.2} liters")?,
        None => writeln!(output, "Oil burnt:      unknown (no prices for {})", current.year)?,
    }
    if current.fillings > 0 {
        writeln!(
            output,
            "Oil delivered:  {:.2} liters for {:.2} ({} filling(s))",
            current.filled_liters, current.filling_cost, current.fillings
        )?;
    }

    if let Some(usage) = &current.usage {
        writeln!(output)?;
        writeln!(output, "USAGE: {}", usage.member_id)?;
        writeln!(output, "Own:            {}", format_hours(usage.own_hours))?;
        writeln!(output, "Others:         {}", format_hours(usage.others_hours))?;
        writeln!(output, "Idle:           {}", format_hours(usage.idle_hours))?;
    }

    writeln!(output)?;
    writeln!(output, "{:<5}  {:>9}  {:>9}", "MONTH", current.year, previous.year)?;
    let months = current.monthly_hours.iter().zip(&previous.monthly_hours);
    for (name, (now, before)) in MONTHS.iter().zip(months) {
        writeln!(
            output,
            "{:<5}  {:>9}  {:>9}",
            name,
            format_hours(*now),
            format_hours(*before)
        )?;
    }
    writeln!(
        output,
        "{:<5}  {:>9}  {:>9}",
        "TOTAL",
        format_hours(current.burner_hours),
        format_hours(previous.burner_hours)
    )?;
    Ok(output)
}
