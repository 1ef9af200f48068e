//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use rust_decimal::Decimal;

/// Shared-cabin stay ledger.
///
/// Records who stayed at the cabin and splits the burner hours of the
/// heating fairly among everybody who was there at the same time.
#[derive(Debug, Parser)]
#[command(name = "hut", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Record, change and inspect stays.
    #[command(subcommand)]
    Stay(StayAction),

    /// Recalculate the burner-hour split of every stay.
    Recompute,

    /// Maintain the yearly price table.
    #[command(subcommand)]
    Prices(PricesAction),

    /// Show what a member owes for a year.
    Bill {
        /// Member to bill.
        #[arg(long)]
        member: String,

        /// Year to bill (defaults to the current year).
        #[arg(long)]
        year: Option<i32>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Record and list heating-oil deliveries.
    #[command(subcommand)]
    Tank(TankAction),

    /// Show burner usage of a year next to the year before.
    Stats {
        /// Year to report (defaults to the current year).
        #[arg(long)]
        year: Option<i32>,

        /// Split usage into this member's own hours and everybody else's.
        #[arg(long)]
        member: Option<String>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Show database location and contents.
    Status,
}

/// Stay subcommands.
#[derive(Debug, Subcommand)]
pub enum StayAction {
    /// Record a new stay.
    Add(StayArgs),

    /// Change fields of an existing stay.
    Edit {
        /// ID of the stay.
        id: String,

        #[command(flatten)]
        changes: EditArgs,
    },

    /// Remove a stay.
    Delete {
        /// ID of the stay.
        id: String,
    },

    /// Show one stay with its shared segments.
    Show {
        /// ID of the stay.
        id: String,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },

    /// List stays.
    List {
        /// Only stays of this member.
        #[arg(long)]
        member: Option<String>,

        /// Only stays arriving in this year.
        #[arg(long)]
        year: Option<i32>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}

/// Fields of a new stay.
#[derive(Debug, Clone, Args)]
pub struct StayArgs {
    /// Member the stay belongs to.
    #[arg(long)]
    pub member: String,

    /// Arrival (RFC 3339 or YYYY-MM-DD).
    #[arg(long)]
    pub arrival: String,

    /// Departure (RFC 3339 or YYYY-MM-DD).
    #[arg(long)]
    pub departure: String,

    /// Burner counter reading on arrival.
    #[arg(long)]
    pub counter_start: f64,

    /// Burner counter reading on departure.
    #[arg(long)]
    pub counter_end: f64,

    /// Member nights.
    #[arg(long, default_value_t = 0)]
    pub members: u32,

    /// Guest nights.
    #[arg(long, default_value_t = 0)]
    pub guests: u32,
}

/// Fields to change on an existing stay. Omitted fields keep their value.
#[derive(Debug, Clone, Default, Args)]
pub struct EditArgs {
    #[arg(long)]
    pub member: Option<String>,

    #[arg(long)]
    pub arrival: Option<String>,

    #[arg(long)]
    pub departure: Option<String>,

    #[arg(long)]
    pub counter_start: Option<f64>,

    #[arg(long)]
    pub counter_end: Option<f64>,

    #[arg(long)]
    pub members: Option<u32>,

    #[arg(long)]
    pub guests: Option<u32>,
}

/// Price table subcommands.
#[derive(Debug, Subcommand)]
pub enum PricesAction {
    /// Show prices for one year or all years.
    Show {
        #[arg(long)]
        year: Option<i32>,
    },

    /// Set all prices of a year.
    Set {
        #[arg(long)]
        year: i32,

        /// Oil price per liter.
        #[arg(long)]
        oil: Decimal,

        /// Price per member night.
        #[arg(long)]
        member_night: Decimal,

        /// Price per guest night.
        #[arg(long)]
        guest_night: Decimal,

        /// Liters of oil burnt per burner hour.
        #[arg(long)]
        consumption: Decimal,
    },

    /// Add a year with default prices.
    AddYear {
        year: i32,
    },
}

/// Tank filling subcommands.
#[derive(Debug, Subcommand)]
pub enum TankAction {
    /// Record a delivery.
    Add {
        /// Delivery date (YYYY-MM-DD).
        #[arg(long)]
        date: String,

        /// Liters delivered.
        #[arg(long)]
        liters: Decimal,

        /// Price per liter.
        #[arg(long)]
        price: Decimal,

        /// Burner counter reading at delivery.
        #[arg(long)]
        counter: f64,
    },

    /// List deliveries.
    List {
        /// Only deliveries in this year.
        #[arg(long)]
        year: Option<i32>,

        /// Output as JSON.
        #[arg(long)]
        json: bool,
    },
}
