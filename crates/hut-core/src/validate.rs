//! Counter-consistency validation.
//!
//! A candidate stay is checked against the stays already on record before
//! any allocation happens. The burner counter only moves while somebody is at
//! the cabin, so counter readings have to be explainable by presence:
//!
//! 1. The candidate's own period and counter range must be well-formed.
//! 2. If its counter range intersects another stay's, the two were either at
//!    the cabin together or handed over on the same day.
//! 3. On a same-day handover the readings at the handover must agree within
//!    a small tolerance.
//! 4. Stays at the cabin together must have connected counter ranges.
//! 5. A member cannot be at the cabin twice at the same time.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::stay::Stay;
use crate::types::StayId;

/// Slack for floating-point noise when comparing counter readings.
const COUNTER_EPSILON: f64 = 1e-9;

/// Why a candidate stay was rejected.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum Rejection {
    /// Departure is not after arrival.
    #[error("departure ({departure}) must be after arrival ({arrival})")]
    InvalidPeriod {
        arrival: NaiveDate,
        departure: NaiveDate,
    },

    /// A counter reading is negative, infinite or NaN.
    #[error("counter readings must be finite and non-negative")]
    InvalidCounterValue,

    /// The end reading is not above the start reading.
    #[error("counter end ({end:.1} h) must be greater than counter start ({start:.1} h)")]
    InvalidCounterSequence { start: f64, end: f64 },

    /// Counter ranges overlap although the parties were never at the cabin
    /// together and did not hand over on the same day.
    #[error(
        "counter range {start:.1} h to {end:.1} h overlaps stay {other} \
         ({other_start:.1} h to {other_end:.1} h, {other_arrival} to {other_departure}) \
         whose dates do not overlap"
    )]
    CounterOverlapWithoutPresence {
        other: StayId,
        start: f64,
        end: f64,
        other_start: f64,
        other_end: f64,
        other_arrival: NaiveDate,
        other_departure: NaiveDate,
    },

    /// The counter moved too far across a same-day handover.
    #[error("counter jumps from {from:.1} h to {to:.1} h across a same-day handover with stay {other}")]
    ImpossibleCounterJump { other: StayId, from: f64, to: f64 },

    /// Parties at the cabin together with disjoint counter ranges.
    #[error(
        "counter range {start:.1} h to {end:.1} h is not connected to \
         {other_start:.1} h to {other_end:.1} h of overlapping stay {other}"
    )]
    DisconnectedCounters {
        other: StayId,
        start: f64,
        end: f64,
        other_start: f64,
        other_end: f64,
    },

    /// The member already has a stay in this period.
    #[error("member already has stay {other} from {arrival} to {departure}")]
    SelfOverlap {
        other: StayId,
        arrival: NaiveDate,
        departure: NaiveDate,
    },
}

impl Rejection {
    /// Stable reason code for callers.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidPeriod { .. } => "invalid_dates",
            Self::InvalidCounterValue => "invalid_counter_value",
            Self::InvalidCounterSequence { .. } => "invalid_counter_sequence",
            Self::CounterOverlapWithoutPresence { .. } => "invalid_overlap_logic",
            Self::ImpossibleCounterJump { .. } => "invalid_counter_jump",
            Self::DisconnectedCounters { .. } => "invalid_counter_overlap",
            Self::SelfOverlap { .. } => "self_overlap",
        }
    }
}

/// Tunables for validation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Largest counter difference accepted across a same-day handover.
    /// Default: 0.1 hours.
    pub handover_tolerance_hours: f64,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            handover_tolerance_hours: 0.1,
        }
    }
}

/// Stored stays relevant to a candidate.
///
/// Entries with the candidate's own id are skipped, so an edited stay's
/// previous version may appear in any list.
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    /// Stays whose counter range intersects the candidate's.
    pub counter_neighbours: Vec<Stay>,
    /// Stays present on any calendar day of the candidate's period.
    pub day_neighbours: Vec<Stay>,
    /// The member's own stays overlapping the candidate's period.
    pub own_overlaps: Vec<Stay>,
}

/// Runs every check in order and returns the first failure.
pub fn validate(
    candidate: &Stay,
    context: &ValidationContext,
    config: &ValidationConfig,
) -> Result<(), Rejection> {
    check_well_formed(candidate)?;
    check_counter_overlaps(candidate, &context.counter_neighbours)?;
    check_handovers(candidate, &context.day_neighbours, config)?;
    check_shared_presence(candidate, &context.day_neighbours)?;
    check_self_overlap(candidate, &context.own_overlaps)
}

fn others<'a>(candidate: &'a Stay, stays: &'a [Stay]) -> impl Iterator<Item = &'a Stay> + 'a {
    stays.iter().filter(move |s| s.id != candidate.id)
}

/// The checks that need no stored data.
pub(crate) fn check_well_formed(candidate: &Stay) -> Result<(), Rejection> {
    let period = &candidate.period;
    if !period.is_valid() {
        return Err(Rejection::InvalidPeriod {
            arrival: period.first_day(),
            departure: period.last_day(),
        });
    }
    let counter = &candidate.counter;
    if !counter.is_finite() {
        return Err(Rejection::InvalidCounterValue);
    }
    if counter.end <= counter.start {
        return Err(Rejection::InvalidCounterSequence {
            start: counter.start,
            end: counter.end,
        });
    }
    Ok(())
}

fn check_counter_overlaps(candidate: &Stay, neighbours: &[Stay]) -> Result<(), Rejection> {
    for other in others(candidate, neighbours) {
        if !candidate.counter.intersects(&other.counter) {
            continue;
        }
        let explained = candidate.period.overlaps(&other.period)
            || candidate.period.hands_over_to(&other.period)
            || other.period.hands_over_to(&candidate.period);
        if !explained {
            return Err(Rejection::CounterOverlapWithoutPresence {
                other: other.id.clone(),
                start: candidate.counter.start,
                end: candidate.counter.end,
                other_start: other.counter.start,
                other_end: other.counter.end,
                other_arrival: other.period.first_day(),
                other_departure: other.period.last_day(),
            });
        }
    }
    Ok(())
}

fn check_handovers(
    candidate: &Stay,
    neighbours: &[Stay],
    config: &ValidationConfig,
) -> Result<(), Rejection> {
    let tolerance = config.handover_tolerance_hours + COUNTER_EPSILON;
    for other in others(candidate, neighbours) {
        if other.period.hands_over_to(&candidate.period)
            && (candidate.counter.start - other.counter.end).abs() > tolerance
        {
            return Err(Rejection::ImpossibleCounterJump {
                other: other.id.clone(),
                from: other.counter.end,
                to: candidate.counter.start,
            });
        }
        if candidate.period.hands_over_to(&other.period)
            && (other.counter.start - candidate.counter.end).abs() > tolerance
        {
            return Err(Rejection::ImpossibleCounterJump {
                other: other.id.clone(),
                from: candidate.counter.end,
                to: other.counter.start,
            });
        }
    }
    Ok(())
}

fn check_shared_presence(candidate: &Stay, neighbours: &[Stay]) -> Result<(), Rejection> {
    for other in others(candidate, neighbours) {
        if candidate.period.overlaps(&other.period)
            && !candidate.counter.connects(&other.counter)
        {
            return Err(Rejection::DisconnectedCounters {
                other: other.id.clone(),
                start: candidate.counter.start,
                end: candidate.counter.end,
                other_start: other.counter.start,
                other_end: other.counter.end,
            });
        }
    }
    Ok(())
}

fn check_self_overlap(candidate: &Stay, own: &[Stay]) -> Result<(), Rejection> {
    let clash = others(candidate, own).find(|other| {
        other.member_id == candidate.member_id && other.period.overlaps(&candidate.period)
    });
    match clash {
        Some(other) => Err(Rejection::SelfOverlap {
            other: other.id.clone(),
            arrival: other.period.first_day(),
            departure: other.period.last_day(),
        }),
        None => Ok(()),
    }
}
