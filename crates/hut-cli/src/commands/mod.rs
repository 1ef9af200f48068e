//! CLI subcommand implementations.

pub mod bill;
pub mod prices;
pub mod recompute;
pub mod stats;
pub mod status;
pub mod stay;
pub mod tank;
pub mod util;
