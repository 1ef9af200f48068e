use std::io::{self, Write};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use hut_core::{PriceTable, StayService};
use tracing_subscriber::EnvFilter;

use hut_cli::commands::{bill, prices, recompute, stats, status, stay, tank};
use hut_cli::{Cli, Commands, Config, PricesAction, StayAction, TankAction};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(hut_db::Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }

    let db = hut_db::Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing with verbose flag support
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let mut out = io::stdout().lock();

    match &cli.command {
        Some(Commands::Stay(action)) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            let mut service = StayService::with_config(db, config.validation, config.cascade);
            match action {
                StayAction::Add(args) => stay::add(&mut out, &mut service, args)?,
                StayAction::Edit { id, changes } => {
                    stay::edit(&mut out, &mut service, id, changes)?;
                }
                StayAction::Delete { id } => stay::delete(&mut out, &mut service, id)?,
                StayAction::Show { id, json } => stay::show(&mut out, service.store(), id, *json)?,
                StayAction::List { member, year, json } => {
                    stay::list(&mut out, service.store(), member.as_deref(), *year, *json)?;
                }
            }
        }
        Some(Commands::Recompute) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            recompute::run(&mut out, &mut db)?;
        }
        Some(Commands::Prices(action)) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            match action {
                PricesAction::Show { year } => prices::show(&mut out, &db, *year)?,
                PricesAction::Set {
                    year,
                    oil,
                    member_night,
                    guest_night,
                    consumption,
                } => {
                    let table = PriceTable {
                        year: *year,
                        oil_price_per_liter: *oil,
                        member_night: *member_night,
                        guest_night: *guest_night,
                        liters_per_burner_hour: *consumption,
                    };
                    prices::set(&mut out, &mut db, &table)?;
                }
                PricesAction::AddYear { year } => prices::add_year(&mut out, &mut db, *year)?,
            }
        }
        Some(Commands::Bill { member, year, json }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            bill::run(&mut out, &db, member, *year, *json)?;
        }
        Some(Commands::Tank(action)) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            match action {
                TankAction::Add {
                    date,
                    liters,
                    price,
                    counter,
                } => tank::add(&mut out, &mut db, date, *liters, *price, *counter)?,
                TankAction::List { year, json } => tank::list(&mut out, &db, *year, *json)?,
            }
        }
        Some(Commands::Stats { year, member, json }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            stats::run(&mut out, &db, *year, member.as_deref(), *json)?;
        }
        Some(Commands::Status) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            status::run(&mut out, &db, &config.database_path)?;
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            writeln!(out)?;
        }
    }

    Ok(())
}
