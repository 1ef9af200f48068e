//! Yearly bill for one member.

use std::fmt::{self, Write as _};
use std::io::Write;

use anyhow::{Context, Result};
use chrono::{Datelike, Utc};
use hut_core::Statement;
use hut_db::Database;

use super::util::parse_member;

pub fn run<W: Write>(
    writer: &mut W,
    db: &Database,
    member: &str,
    year: Option<i32>,
    json: bool,
) -> Result<()> {
    let member_id = parse_member(member)?;
    let year = year.unwrap_or_else(|| Utc::now().year());
    let prices = db.prices_for_year(year)?.with_context(|| {
        format!("no prices configured for {year}. Run 'hut prices add-year {year}' first")
    })?;
    let stays = db
        .stays_for_member_year(&member_id, year)
        .context("failed to load stays")?;
    let statement = Statement::build(&member_id, &stays, &prices)?;

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&statement)?)?;
    } else {
        write!(writer, "{}", format_statement(&statement)?)?;
    }
    Ok(())
}

pub fn format_statement(statement: &Statement) -> Result<String, fmt::Error> {
    let mut output = String::new();
    writeln!(output, "BILL: {} ({})", statement.member_id, statement.year)?;

    if statement.stays.is_empty() {
        writeln!(output)?;
        writeln!(output, "No stays this year.")?;
        return Ok(output);
    }

    writeln!(output)?;
    writeln!(
        output,
        "{:<8}  {:>8}  {:>9}  {:>7}  {:>9}  {:>6}  {:>9}  {:>9}",
        "STAY", "HOURS", "OIL", "MEMBERS", "", "GUESTS", "", "TOTAL"
    )?;
    for charges in &statement.stays {
        writeln!(
            output,
            "{:<8}  {:>8}  {:>9}  {:>7}  {:>9}  {:>6}  {:>9}  {:>9}",
            charges.stay_id.short(),
            format!("{:.2}", charges.hours),
            format!("{:.2}", charges.oil),
            charges.member_nights,
            format!("{:.2}", charges.members),
            charges.guest_nights,
            format!("{:.2}", charges.guests),
            format!("{:.2}", charges.total),
        )?;
    }
    writeln!(
        output,
        "{:<8}  {:>8}  {:>9}  {:>7}  {:>9}  {:>6}  {:>9}  {:>9}",
        "TOTAL",
        format!("{:.2}", statement.hours),
        format!("{:.2}", statement.oil),
        statement.member_nights,
        format!("{:.2}", statement.members),
        statement.guest_nights,
        format!("{:.2}", statement.guests),
        format!("{:.2}", statement.total),
    )?;
    writeln!(output)?;
    writeln!(output, "Oil burnt: {:.2} liters", statement.oil_liters)?;
    Ok(output)
}
