//! Stays, the intervals they occupy, and overlap segments.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{MemberId, StayId};

/// Wall-clock presence at the cabin, arrival to departure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Period {
    pub arrival: DateTime<Utc>,
    pub departure: DateTime<Utc>,
}

impl Period {
    pub const fn new(arrival: DateTime<Utc>, departure: DateTime<Utc>) -> Self {
        Self { arrival, departure }
    }

    /// Departure strictly after arrival.
    pub fn is_valid(&self) -> bool {
        self.departure > self.arrival
    }

    /// True if both parties were at the cabin at the same time.
    ///
    /// Touching periods (one departs at the instant the other arrives) are
    /// not co-present.
    pub fn overlaps(&self, other: &Self) -> bool {
        self.arrival < other.departure && other.arrival < self.departure
    }

    /// Calendar day of arrival.
    pub fn first_day(&self) -> NaiveDate {
        self.arrival.date_naive()
    }

    /// Calendar day of departure.
    pub fn last_day(&self) -> NaiveDate {
        self.departure.date_naive()
    }

    /// True if `self` leaves on the day `next` arrives without the two ever
    /// being at the cabin together.
    pub fn hands_over_to(&self, next: &Self) -> bool {
        self.last_day() == next.first_day() && !self.overlaps(next)
    }
}

/// A span of the shared burner-hour counter.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CounterRange {
    pub start: f64,
    pub end: f64,
}

impl CounterRange {
    pub const fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    /// Burner hours covered by the range.
    pub fn hours(&self) -> f64 {
        self.end - self.start
    }

    /// Both readings finite and non-negative.
    pub fn is_finite(&self) -> bool {
        self.start.is_finite() && self.end.is_finite() && self.start >= 0.0
    }

    /// Positive-length overlap. Abutting ranges do not intersect.
    pub fn intersects(&self, other: &Self) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// Overlapping or touching.
    pub fn connects(&self, other: &Self) -> bool {
        self.start <= other.end && self.end >= other.start
    }
}

/// One party's occupancy of the cabin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stay {
    pub id: StayId,
    pub member_id: MemberId,
    pub period: Period,
    pub counter: CounterRange,
    /// Member-nights to bill.
    pub member_nights: u32,
    /// Guest-nights to bill.
    pub guest_nights: u32,
    /// Fair share of the counter range after allocation.
    pub adjusted_hours: f64,
    /// Whether any overlap segment currently applies.
    pub has_overlaps: bool,
}

impl Stay {
    /// Builds an unallocated stay from a draft, with `adjusted_hours` set to
    /// the raw counter difference.
    pub fn from_draft(id: StayId, draft: StayDraft) -> Self {
        Self {
            id,
            member_id: draft.member_id,
            period: draft.period,
            counter: draft.counter,
            member_nights: draft.member_nights,
            guest_nights: draft.guest_nights,
            adjusted_hours: draft.counter.hours(),
            has_overlaps: false,
        }
    }

    /// Counter difference without any sharing.
    pub fn raw_hours(&self) -> f64 {
        self.counter.hours()
    }

    /// Hours the party pays for.
    pub fn billable_hours(&self) -> f64 {
        if self.has_overlaps {
            self.adjusted_hours
        } else {
            self.raw_hours()
        }
    }

    /// True if the other stay was at the cabin at the same time.
    pub fn is_co_present_with(&self, other: &Self) -> bool {
        self.id != other.id && self.period.overlaps(&other.period)
    }

    /// True if counter hours of this stay have to be split with `other`.
    ///
    /// That is every co-present stay, plus a same-day handover neighbour
    /// whose readings overlap this stay's within the handover tolerance. The
    /// relation is symmetric, so every party active on a span of the counter
    /// sees the same set of parties there.
    pub fn shares_hours_with(&self, other: &Self) -> bool {
        if self.is_co_present_with(other) {
            return true;
        }
        self.id != other.id
            && self.counter.intersects(&other.counter)
            && (self.period.hands_over_to(&other.period) || other.period.hands_over_to(&self.period))
    }
}

/// Caller input for creating or editing a stay.
///
/// `id` is `None` for a new stay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StayDraft {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<StayId>,
    pub member_id: MemberId,
    pub period: Period,
    pub counter: CounterRange,
    #[serde(default)]
    pub member_nights: u32,
    #[serde(default)]
    pub guest_nights: u32,
}

impl StayDraft {
    /// Draft that edits an existing stay, carrying over all of its inputs.
    pub fn editing(stay: &Stay) -> Self {
        Self {
            id: Some(stay.id.clone()),
            member_id: stay.member_id.clone(),
            period: stay.period,
            counter: stay.counter,
            member_nights: stay.member_nights,
            guest_nights: stay.guest_nights,
        }
    }
}

/// Counter hours shared by the owner with one or more co-present stays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlapSegment {
    /// Stay the `shared_hours` are attributed to.
    pub owner: StayId,
    /// The other stays active on the counter during the segment.
    pub co_present: Vec<StayId>,
    /// Counter span of the segment.
    pub counter: CounterRange,
    /// The owner's share of the span.
    pub shared_hours: f64,
}
