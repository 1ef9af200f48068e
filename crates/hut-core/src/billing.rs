//! Cost of stays.
//!
//! Turns billable burner hours and nights into money using the price row of
//! the stay's arrival year. All amounts are [`Decimal`] and rounded to cents
//! with banker's rounding.

use chrono::Datelike;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stay::Stay;
use crate::types::{MemberId, StayId};

/// Hours are rounded to this many places before pricing.
const HOURS_SCALE: u32 = 4;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BillingError {
    /// No price row exists for the year a stay falls in.
    #[error("no prices configured for {year}")]
    MissingPrices { year: i32 },

    /// A price is zero or negative.
    #[error("{field} must be greater than zero (got {value})")]
    NonPositivePrice { field: &'static str, value: Decimal },

    /// Hours that cannot be priced (NaN or infinite).
    #[error("stay {stay_id} has unpriceable hours")]
    InvalidHours { stay_id: StayId },
}

/// Prices for one year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTable {
    pub year: i32,
    pub oil_price_per_liter: Decimal,
    pub member_night: Decimal,
    pub guest_night: Decimal,
    /// Oil burnt per burner hour, in liters.
    pub liters_per_burner_hour: Decimal,
}

impl PriceTable {
    /// Prices used when a year is first added.
    pub fn defaults_for(year: i32) -> Self {
        Self {
            year,
            oil_price_per_liter: Decimal::new(100, 2),
            member_night: Decimal::new(1000, 2),
            guest_night: Decimal::new(1500, 2),
            liters_per_burner_hour: Decimal::new(250, 2),
        }
    }

    /// Checks that every price is strictly positive.
    pub fn validate(&self) -> Result<(), BillingError> {
        let fields = [
            ("oil price per liter", self.oil_price_per_liter),
            ("member night price", self.member_night),
            ("guest night price", self.guest_night),
            ("liters per burner hour", self.liters_per_burner_hour),
        ];
        for (field, value) in fields {
            if value <= Decimal::ZERO {
                return Err(BillingError::NonPositivePrice { field, value });
            }
        }
        Ok(())
    }

    /// Cost of one burner hour.
    pub fn cost_per_hour(&self) -> Decimal {
        self.liters_per_burner_hour * self.oil_price_per_liter
    }
}

/// What one stay costs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StayCharges {
    pub stay_id: StayId,
    pub year: i32,
    pub hours: Decimal,
    pub oil_liters: Decimal,
    pub oil: Decimal,
    pub member_nights: u32,
    pub members: Decimal,
    pub guest_nights: u32,
    pub guests: Decimal,
    pub total: Decimal,
}

/// Year of a stay for pricing purposes.
pub fn billing_year(stay: &Stay) -> i32 {
    stay.period.arrival.year()
}

/// Prices a stay.
pub fn charge_stay(stay: &Stay, prices: &PriceTable) -> Result<StayCharges, BillingError> {
    let year = billing_year(stay);
    if prices.year != year {
        return Err(BillingError::MissingPrices { year });
    }
    let hours = priced_hours(stay.billable_hours()).ok_or_else(|| BillingError::InvalidHours {
        stay_id: stay.id.clone(),
    })?;

    let oil_liters = hours * prices.liters_per_burner_hour;
    let oil = round_money(hours * prices.cost_per_hour());
    let members = round_money(Decimal::from(stay.member_nights) * prices.member_night);
    let guests = round_money(Decimal::from(stay.guest_nights) * prices.guest_night);

    Ok(StayCharges {
        stay_id: stay.id.clone(),
        year,
        hours,
        oil_liters,
        oil,
        member_nights: stay.member_nights,
        members,
        guest_nights: stay.guest_nights,
        guests,
        total: oil + members + guests,
    })
}

/// A member's bill for one year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Statement {
    pub member_id: MemberId,
    pub year: i32,
    pub stays: Vec<StayCharges>,
    pub hours: Decimal,
    pub oil_liters: Decimal,
    pub oil: Decimal,
    pub member_nights: u32,
    pub members: Decimal,
    pub guest_nights: u32,
    pub guests: Decimal,
    pub total: Decimal,
}

impl Statement {
    /// Bills every stay of `member_id` that falls in `prices.year`.
    ///
    /// Stays of other members or other years are ignored. Money totals are
    /// sums of the per-stay amounts, which are already rounded to cents.
    pub fn build(
        member_id: &MemberId,
        stays: &[Stay],
        prices: &PriceTable,
    ) -> Result<Self, BillingError> {
        let mut statement = Self {
            member_id: member_id.clone(),
            year: prices.year,
            stays: Vec::new(),
            hours: Decimal::ZERO,
            oil_liters: Decimal::ZERO,
            oil: Decimal::ZERO,
            member_nights: 0,
            members: Decimal::ZERO,
            guest_nights: 0,
            guests: Decimal::ZERO,
            total: Decimal::ZERO,
        };

        for stay in stays
            .iter()
            .filter(|s| &s.member_id == member_id && billing_year(s) == prices.year)
        {
            let charges = charge_stay(stay, prices)?;
            statement.hours += charges.hours;
            statement.oil_liters += charges.oil_liters;
            statement.oil += charges.oil;
            statement.member_nights = statement.member_nights.saturating_add(charges.member_nights);
            statement.members += charges.members;
            statement.guest_nights = statement.guest_nights.saturating_add(charges.guest_nights);
            statement.guests += charges.guests;
            statement.total += charges.total;
            statement.stays.push(charges);
        }

        Ok(statement)
    }
}

/// Burner hours as a decimal, rounded the way they are priced.
///
/// `None` for NaN or infinite hours.
pub fn priced_hours(hours: f64) -> Option<Decimal> {
    Decimal::from_f64(hours)
        .map(|hours| hours.round_dp_with_strategy(HOURS_SCALE, RoundingStrategy::MidpointNearestEven))
}

/// Rounds to cents, ties to even.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointNearestEven)
}
