//! Status command for showing what the ledger holds.

use std::io::Write;
use std::path::Path;

use anyhow::Result;
use hut_db::Database;

pub fn run<W: Write>(writer: &mut W, db: &Database, database_path: &Path) -> Result<()> {
    let count = db.stay_count()?;
    let years = db.available_years()?;
    let priced: Vec<i32> = db.list_prices()?.iter().map(|p| p.year).collect();

    writeln!(writer, "Cabin ledger status")?;
    writeln!(writer, "Database: {}", database_path.display())?;

    if count == 0 {
        writeln!(writer, "No stays recorded.")?;
    } else {
        writeln!(writer, "Stays: {count}")?;
        writeln!(writer, "Years: {}", join_years(&years))?;
    }

    let unpriced: Vec<i32> = years.into_iter().filter(|y| !priced.contains(y)).collect();
    if !unpriced.is_empty() {
        writeln!(writer, "Years without prices: {}", join_years(&unpriced))?;
    }

    Ok(())
}

fn join_years(years: &[i32]) -> String {
    years
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
