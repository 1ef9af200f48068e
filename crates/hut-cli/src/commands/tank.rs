//! Heating-oil deliveries.

use std::fmt::{self, Write as _};
use std::io::Write;

use anyhow::{Context, Result};
use hut_core::TankFilling;
use hut_db::Database;
use rust_decimal::Decimal;

use super::util::{format_hours, parse_date};

/// Records a delivery after checking it against the recorded ones.
pub fn add<W: Write>(
    writer: &mut W,
    db: &mut Database,
    date: &str,
    liters: Decimal,
    price: Decimal,
    counter: f64,
) -> Result<()> {
    let filling = TankFilling {
        id: None,
        date: parse_date(date)?,
        liters,
        price_per_liter: price,
        counter_reading: counter,
    };
    let id = db
        .add_tank_filling(&filling)
        .context("failed to save tank filling")?;
    writeln!(
        writer,
        "Recorded tank filling {id}: {:.2} liters on {} for {:.2}.",
        filling.liters,
        filling.date,
        filling.cost()
    )?;
    Ok(())
}

pub fn list<W: Write>(writer: &mut W, db: &Database, year: Option<i32>, json: bool) -> Result<()> {
    let fillings = db
        .list_tank_fillings(year)
        .context("failed to load tank fillings")?;
    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&fillings)?)?;
    } else {
        write!(writer, "{}", format_fillings(&fillings)?)?;
    }
    Ok(())
}

pub fn format_fillings(fillings: &[TankFilling]) -> Result<String, fmt::Error> {
    let mut output = String::new();
    if fillings.is_empty() {
        writeln!(output, "No tank fillings recorded.")?;
        return Ok(output);
    }

    writeln!(
        output,
        "{:<10}  {:>8}  {:>7}  {:>9}  {:>9}",
        "DATE", "LITERS", "PRICE/L", "COST", "COUNTER"
    )?;
    for filling in fillings {
        writeln!(
            output,
            "{:<10}  {:>8}  {:>7}  {:>9}  {:>9}",
            filling.date,
            format!("{:.2}", filling.liters),
            format!("{:.2}", filling.price_per_liter),
            format!("{:.2}", filling.cost()),
            format_hours(filling.counter_reading),
        )?;
    }
    let liters: Decimal = fillings.iter().map(|f| f.liters).sum();
    let cost: Decimal = fillings.iter().map(TankFilling::cost).sum();
    writeln!(
        output,
        "{:<10}  {:>8}  {:>7}  {:>9}",
        "TOTAL",
        format!("{liters:.2}"),
        "",
        format!("{cost:.2}"),
    )?;
    Ok(output)
}
