//! Proportional burner-hour allocation.
//!
//! Splits the counter hours of a stay fairly among every party that was at
//! the cabin at the same time, or took over on the same day with readings
//! that overlap.
//!
//! # Algorithm Summary
//!
//! 1. Collect the counter start/end of the stay and of each sharing stay
//! 2. Sort the boundaries and group those sharing a counter value
//! 3. Sweep the groups, keeping the set of stays whose range covers the
//!    interval just passed; each interval is split evenly across that set
//!
//! The function is pure. Callers pick the sharing stays (see
//! [`Stay::shares_hours_with`]) and persist the result. Hours are conserved
//! across stays only if every caller picks them the same way.

use std::collections::{BTreeSet, HashSet};

use serde::Serialize;

use crate::stay::{CounterRange, OverlapSegment, Stay};
use crate::types::StayId;

/// Result of allocating counter hours to one stay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Allocation {
    /// The stay the allocation was computed for.
    pub stay_id: StayId,

    /// The stay's fair share of its counter range.
    pub adjusted_hours: f64,

    /// One entry per active stay for every shared interval the stay took
    /// part in, so the counterpart's share is visible too.
    pub segments: Vec<OverlapSegment>,
}

impl Allocation {
    /// Whether the stay shared any hours.
    pub fn has_overlaps(&self) -> bool {
        !self.segments.is_empty()
    }

    /// Segments attributed to `owner`.
    pub fn segments_for<'a>(
        &'a self,
        owner: &'a StayId,
    ) -> impl Iterator<Item = &'a OverlapSegment> + 'a {
        self.segments.iter().filter(move |s| &s.owner == owner)
    }

    /// Owned segments of the allocated stay, ready to persist.
    pub fn own_segments(&self) -> Vec<OverlapSegment> {
        self.segments_for(&self.stay_id).cloned().collect()
    }

    /// Copies the allocation onto the stay's cached fields.
    pub fn apply_to(&self, stay: &mut Stay) {
        stay.adjusted_hours = self.adjusted_hours;
        stay.has_overlaps = self.has_overlaps();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BoundaryKind {
    Start,
    End,
}

#[derive(Debug, Clone, Copy)]
struct Boundary<'a> {
    value: f64,
    kind: BoundaryKind,
    stay_id: &'a StayId,
}

/// Computes `stay`'s share of its counter range given the stays it shares
/// counter hours with.
///
/// Entries in `sharing` with the same id as `stay`, and repeated ids, are
/// ignored. With no co-present stays the adjusted hours equal the raw counter
/// difference and no segments are produced.
pub fn allocate(stay: &Stay, sharing: &[Stay]) -> Allocation {
    let mut seen: HashSet<&StayId> = HashSet::from([&stay.id]);
    let mut boundaries = Vec::with_capacity(2 * (sharing.len() + 1));
    push_boundaries(&mut boundaries, stay);
    for other in sharing {
        if seen.insert(&other.id) {
            push_boundaries(&mut boundaries, other);
        }
    }

    if boundaries.len() == 2 {
        return unshared(stay);
    }

    boundaries.sort_by(|a, b| a.value.total_cmp(&b.value));

    let mut active: BTreeSet<&StayId> = BTreeSet::new();
    let mut adjusted_hours = 0.0;
    let mut segments = Vec::new();
    let mut previous: Option<f64> = None;

    // All boundaries at one counter value are applied together, after the
    // interval ending at that value has been accounted.
    for group in boundaries.chunk_by(|a, b| a.value.total_cmp(&b.value).is_eq()) {
        let value = group[0].value;

        if let Some(from) = previous {
            let length = value - from;
            if length > 0.0 && active.contains(&stay.id) {
                let share = length / party_count(active.len());
                adjusted_hours += share;

                if active.len() > 1 {
                    let counter = CounterRange::new(from, value);
                    for &owner in &active {
                        segments.push(OverlapSegment {
                            owner: owner.clone(),
                            co_present: active
                                .iter()
                                .filter(|&&id| id != owner)
                                .map(|&id| id.clone())
                                .collect(),
                            counter,
                            shared_hours: share,
                        });
                    }
                }
            }
        }

        for boundary in group {
            match boundary.kind {
                BoundaryKind::Start => {
                    active.insert(boundary.stay_id);
                }
                BoundaryKind::End => {
                    active.remove(boundary.stay_id);
                }
            }
        }
        previous = Some(value);
    }

    if segments.is_empty() {
        return unshared(stay);
    }

    Allocation {
        stay_id: stay.id.clone(),
        adjusted_hours,
        segments,
    }
}

fn push_boundaries<'a>(boundaries: &mut Vec<Boundary<'a>>, stay: &'a Stay) {
    boundaries.push(Boundary {
        value: stay.counter.start,
        kind: BoundaryKind::Start,
        stay_id: &stay.id,
    });
    boundaries.push(Boundary {
        value: stay.counter.end,
        kind: BoundaryKind::End,
        stay_id: &stay.id,
    });
}

fn unshared(stay: &Stay) -> Allocation {
    Allocation {
        stay_id: stay.id.clone(),
        adjusted_hours: stay.raw_hours(),
        segments: Vec::new(),
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "party counts are tiny compared to f64 mantissa"
)]
fn party_count(active: usize) -> f64 {
    active as f64
}
