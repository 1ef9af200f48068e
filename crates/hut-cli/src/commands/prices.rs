//! Price table maintenance.

use std::fmt::{self, Write as _};
use std::io::Write;

use anyhow::{Context, Result};
use hut_core::PriceTable;
use hut_db::Database;

/// Shows prices of one year, or of every configured year.
pub fn show<W: Write>(writer: &mut W, db: &Database, year: Option<i32>) -> Result<()> {
    let prices = match year {
        Some(year) => db
            .prices_for_year(year)?
            .with_context(|| format!("no prices configured for {year}"))
            .map(|prices| vec![prices])?,
        None => db.list_prices()?,
    };
    write!(writer, "{}", format_prices(&prices)?)?;
    Ok(())
}

/// Replaces the prices of a year.
pub fn set<W: Write>(writer: &mut W, db: &mut Database, prices: &PriceTable) -> Result<()> {
    db.save_prices(prices)
        .with_context(|| format!("failed to save prices for {}", prices.year))?;
    writeln!(writer, "Prices for {} saved.", prices.year)?;
    Ok(())
}

/// Adds a year with default prices.
pub fn add_year<W: Write>(writer: &mut W, db: &mut Database, year: i32) -> Result<()> {
    if db.insert_default_prices(year)? {
        writeln!(writer, "Added {year} with default prices.")?;
    } else {
        writeln!(writer, "Prices for {year} already exist.")?;
    }
    Ok(())
}

pub fn format_prices(prices: &[PriceTable]) -> Result<String, fmt::Error> {
    let mut output = String::new();
    if prices.is_empty() {
        writeln!(output, "No prices configured.")?;
        writeln!(output, "Hint: Run 'hut prices add-year <YEAR>' to add defaults.")?;
        return Ok(output);
    }

    writeln!(
        output,
        "{:<6}  {:>10}  {:>12}  {:>11}  {:>10}",
        "YEAR", "OIL/LITER", "MEMBER/NIGHT", "GUEST/NIGHT", "LITERS/H"
    )?;
    for row in prices {
        writeln!(
            output,
            "{:<6}  {:>10}  {:>12}  {:>11}  {:>10}",
            row.year,
            format!("{:.2}", row.oil_price_per_liter),
            format!("{:.2}", row.member_night),
            format!("{:.2}", row.guest_night),
            format!("{:.2}", row.liters_per_burner_hour),
        )?;
    }
    Ok(output)
}
