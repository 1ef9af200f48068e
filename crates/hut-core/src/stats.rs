//! Yearly usage statistics.
//!
//! Burner hours per month, how a member's own usage compares to everybody
//! else's, and how many counter hours no stay accounts for. A year's counter
//! span runs from its lowest to its highest reading, taking stays and tank
//! fillings together; the part of the span outside every stay is idle.

use chrono::Datelike;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::billing::{PriceTable, billing_year, priced_hours};
use crate::stay::Stay;
use crate::tank::TankFilling;
use crate::types::MemberId;

/// One member's usage against everyone else's.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsageSplit {
    pub member_id: MemberId,
    pub own_hours: f64,
    pub others_hours: f64,
    pub idle_hours: f64,
}

/// Usage figures for one calendar year.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct YearlyStatistics {
    pub year: i32,
    pub stays: usize,
    /// Billable burner hours of all stays.
    pub burner_hours: f64,
    /// Burner hours by arrival month, January first.
    pub monthly_hours: [f64; 12],
    /// Counter hours within the year's span not covered by any stay.
    pub idle_hours: f64,
    pub member_nights: u32,
    pub guest_nights: u32,
    /// Oil burnt by the stays; known only with the year's prices.
    pub oil_liters: Option<Decimal>,
    pub fillings: usize,
    pub filled_liters: Decimal,
    pub filling_cost: Decimal,
    /// Present when the statistics were built for a member.
    pub usage: Option<UsageSplit>,
}

impl YearlyStatistics {
    /// Builds the statistics of `year`.
    ///
    /// Stays count for their arrival year and fillings for their delivery
    /// year; anything else in the slices is ignored, as are prices of another
    /// year.
    pub fn build(
        year: i32,
        stays: &[Stay],
        fillings: &[TankFilling],
        prices: Option<&PriceTable>,
        member: Option<&MemberId>,
    ) -> Self {
        let stays: Vec<&Stay> = stays.iter().filter(|s| billing_year(s) == year).collect();
        let fillings: Vec<&TankFilling> = fillings.iter().filter(|f| f.year() == year).collect();

        let mut monthly_hours = [0.0; 12];
        let mut burner_hours = 0.0;
        let mut member_nights: u32 = 0;
        let mut guest_nights: u32 = 0;
        for stay in &stays {
            let hours = stay.billable_hours();
            burner_hours += hours;
            if let Some(month) = monthly_hours.get_mut(stay.period.arrival.month0() as usize) {
                *month += hours;
            }
            member_nights = member_nights.saturating_add(stay.member_nights);
            guest_nights = guest_nights.saturating_add(stay.guest_nights);
        }

        let idle_hours = idle_hours(&stays, &fillings);
        let oil_liters = prices
            .filter(|prices| prices.year == year)
            .and_then(|prices| {
                priced_hours(burner_hours).map(|hours| hours * prices.liters_per_burner_hour)
            });

        let usage = member.map(|member_id| {
            let own_hours: f64 = stays
                .iter()
                .filter(|s| &s.member_id == member_id)
                .map(|s| s.billable_hours())
                .sum();
            UsageSplit {
                member_id: member_id.clone(),
                own_hours,
                others_hours: burner_hours - own_hours,
                idle_hours,
            }
        });

        Self {
            year,
            stays: stays.len(),
            burner_hours,
            monthly_hours,
            idle_hours,
            member_nights,
            guest_nights,
            oil_liters,
            fillings: fillings.len(),
            filled_liters: fillings.iter().map(|f| f.liters).sum(),
            filling_cost: fillings.iter().map(|f| f.cost()).sum(),
            usage,
        }
    }
}

/// Span of all readings minus the union of the stays' counter ranges.
fn idle_hours(stays: &[&Stay], fillings: &[&TankFilling]) -> f64 {
    let readings = stays
        .iter()
        .flat_map(|s| [s.counter.start, s.counter.end])
        .chain(fillings.iter().map(|f| f.counter_reading));
    let Some((low, high)) = readings.fold(None, |span: Option<(f64, f64)>, value| {
        Some(span.map_or((value, value), |(low, high)| (low.min(value), high.max(value))))
    }) else {
        return 0.0;
    };

    let mut ranges: Vec<(f64, f64)> = stays.iter().map(|s| (s.counter.start, s.counter.end)).collect();
    ranges.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut covered = 0.0;
    let mut current: Option<(f64, f64)> = None;
    for (start, end) in ranges {
        current = match current {
            Some((from, to)) if start <= to => Some((from, to.max(end))),
            Some((from, to)) => {
                covered += to - from;
                Some((start, end))
            }
            None => Some((start, end)),
        };
    }
    if let Some((from, to)) = current {
        covered += to - from;
    }

    (high - low - covered).max(0.0)
}
