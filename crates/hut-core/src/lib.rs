//! Core domain logic for the cabin ledger.
//!
//! This crate contains the fundamental types and logic for:
//! - Validation: checking a stay's counter readings against the stays on record
//! - Allocation: splitting shared burner hours among co-present parties
//! - Cascade: refreshing neighbours after a stay changes
//! - Lifecycle: the create/update/delete flow tying the above together
//! - Billing: pricing stays and yearly statements
//! - Tank fillings and yearly usage statistics
//!
//! Persistence is abstracted behind [`StayStore`].

pub mod allocation;
pub mod billing;
pub mod cascade;
pub mod lifecycle;
pub mod stats;
pub mod stay;
pub mod store;
pub mod tank;
pub mod types;
pub mod validate;

#[cfg(test)]
mod testing;

pub use allocation::{Allocation, allocate};
pub use billing::{BillingError, PriceTable, StayCharges, Statement};
pub use cascade::{
    CascadeConfig, CascadeDepth, CascadeFailure, CascadeReport, RecomputeReport, StayChange,
    on_stay_changed, recalculate_all, recalculate_stay,
};
pub use lifecycle::{DeletedStay, LifecycleError, SavedStay, Stage, StayService};
pub use stats::{UsageSplit, YearlyStatistics};
pub use stay::{CounterRange, OverlapSegment, Period, Stay, StayDraft};
pub use store::{StayStore, StoreError};
pub use tank::{TankError, TankFilling};
pub use types::{ChangeKind, MemberId, StayId, ValidationError};
pub use validate::{Rejection, ValidationConfig, ValidationContext, validate};
