//! Cabin ledger CLI library.
//!
//! This crate provides the CLI interface for recording stays and billing
//! burner hours.

mod cli;
pub mod commands;
mod config;

pub use cli::{Cli, Commands, EditArgs, PricesAction, StayAction, StayArgs, TankAction};
pub use config::Config;
