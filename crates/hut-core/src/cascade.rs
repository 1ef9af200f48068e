//! Cascading recalculation after a stay changes.
//!
//! Saving or deleting a stay changes how counter hours split for everyone
//! who shared counter hours with it, and, through them, possibly for stays
//! further along the chain. The recalculator finds those stays and re-runs
//! the allocation for each, one at a time.
//!
//! Write failures on these secondary stays do not abort the cascade. They
//! are logged and collected in the [`CascadeReport`]; the stale values are
//! corrected by the next recalculation that touches the stay.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::allocation::{Allocation, allocate};
use crate::stay::Stay;
use crate::store::{StayStore, StoreError};
use crate::types::{ChangeKind, StayId};

/// How far from the changed stay recalculation spreads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CascadeDepth {
    /// Direct neighbours and their neighbours.
    OneHop,
    /// Every stay reachable through shared counter hours.
    #[default]
    Transitive,
}

/// Tunables for the cascade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeConfig {
    pub depth: CascadeDepth,
}

/// The change that triggers a cascade.
#[derive(Debug, Clone, Copy)]
pub enum StayChange<'a> {
    Created(&'a Stay),
    /// Both versions matter: companions of the old period may have lost a
    /// co-present party.
    Updated {
        previous: &'a Stay,
        current: &'a Stay,
    },
    Deleted(&'a Stay),
}

impl<'a> StayChange<'a> {
    pub const fn kind(&self) -> ChangeKind {
        match self {
            Self::Created(_) => ChangeKind::Created,
            Self::Updated { .. } => ChangeKind::Updated,
            Self::Deleted(_) => ChangeKind::Deleted,
        }
    }

    /// The stay that changed.
    pub const fn stay(&self) -> &'a Stay {
        match *self {
            Self::Created(stay) | Self::Deleted(stay) | Self::Updated { current: stay, .. } => stay,
        }
    }

    fn seeds(&self) -> Vec<&'a Stay> {
        match *self {
            Self::Created(stay) | Self::Deleted(stay) => vec![stay],
            Self::Updated { previous, current } => vec![previous, current],
        }
    }
}

/// A secondary stay the cascade could not bring up to date.
#[derive(Debug)]
pub struct CascadeFailure {
    pub stay_id: StayId,
    pub error: StoreError,
}

/// Outcome of a cascade.
#[derive(Debug, Default)]
pub struct CascadeReport {
    /// Stays whose allocation was recalculated and written.
    pub updated: BTreeSet<StayId>,
    /// Stays that could not be read or written.
    pub failed: Vec<CascadeFailure>,
}

impl CascadeReport {
    fn record_failure(&mut self, stay_id: &StayId, error: StoreError) {
        tracing::warn!(stay_id = %stay_id, error = %error, "cascade could not update stay");
        self.failed.push(CascadeFailure {
            stay_id: stay_id.clone(),
            error,
        });
    }
}

/// Recalculates every stay affected by `change`.
///
/// The changed stay itself is not touched: its allocation is written by the
/// caller as part of the primary save.
pub fn on_stay_changed<S: StayStore>(
    store: &mut S,
    change: StayChange<'_>,
    config: &CascadeConfig,
) -> CascadeReport {
    let changed = change.stay();
    let mut report = CascadeReport::default();
    let affected = affected_stays(store, change, config.depth, &mut report);

    tracing::debug!(
        stay_id = %changed.id,
        change = %change.kind(),
        affected = affected.len(),
        "cascading recalculation"
    );

    for stay_id in &affected {
        match recalculate_stay(store, stay_id) {
            Ok(Some(allocation)) => {
                tracing::debug!(
                    stay_id = %stay_id,
                    adjusted_hours = allocation.adjusted_hours,
                    has_overlaps = allocation.has_overlaps(),
                    "stay recalculated"
                );
                report.updated.insert(stay_id.clone());
            }
            Ok(None) => tracing::debug!(stay_id = %stay_id, "affected stay vanished"),
            Err(error) => report.record_failure(stay_id, error),
        }
    }

    report
}

/// Collects the ids of stays whose allocation may depend on the change.
fn affected_stays<S: StayStore>(
    store: &S,
    change: StayChange<'_>,
    depth: CascadeDepth,
    report: &mut CascadeReport,
) -> BTreeSet<StayId> {
    let changed_id = &change.stay().id;
    let mut affected: BTreeMap<StayId, Stay> = BTreeMap::new();

    for seed in change.seeds() {
        match store.sharing_stays(seed) {
            Ok(neighbours) => {
                for stay in neighbours {
                    affected.insert(stay.id.clone(), stay);
                }
            }
            Err(error) => report.record_failure(changed_id, error),
        }
    }

    let mut queue: VecDeque<(Stay, usize)> = affected.values().cloned().map(|s| (s, 1)).collect();
    while let Some((stay, hops)) = queue.pop_front() {
        if depth == CascadeDepth::OneHop && hops > 1 {
            continue;
        }
        let neighbours = match store.sharing_stays(&stay) {
            Ok(neighbours) => neighbours,
            Err(error) => {
                report.record_failure(&stay.id, error);
                continue;
            }
        };
        for neighbour in neighbours {
            if &neighbour.id == changed_id || affected.contains_key(&neighbour.id) {
                continue;
            }
            affected.insert(neighbour.id.clone(), neighbour.clone());
            queue.push_back((neighbour, hops + 1));
        }
    }

    affected.remove(changed_id);
    affected.into_keys().collect()
}

/// Re-runs the allocation for one stored stay and writes the result.
///
/// Returns `Ok(None)` if the stay no longer exists.
pub fn recalculate_stay<S: StayStore>(
    store: &mut S,
    stay_id: &StayId,
) -> Result<Option<Allocation>, StoreError> {
    let Some(mut stay) = store.get_stay(stay_id)? else {
        return Ok(None);
    };
    let sharing = store.sharing_stays(&stay)?;
    let allocation = allocate(&stay, &sharing);
    allocation.apply_to(&mut stay);
    store.save_allocated_stay(&stay, &allocation.own_segments())?;
    Ok(Some(allocation))
}

/// A stay whose cached allocation changed during a full recompute.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recalculated {
    pub stay_id: StayId,
    pub previous_hours: f64,
    pub adjusted_hours: f64,
    pub has_overlaps: bool,
}

/// Outcome of [`recalculate_all`].
#[derive(Debug, Default)]
pub struct RecomputeReport {
    /// Number of stays looked at.
    pub checked: usize,
    /// Stays whose cached values differed from a fresh allocation.
    pub changed: Vec<Recalculated>,
    pub failed: Vec<CascadeFailure>,
}

/// Recalculates every stored stay from scratch.
///
/// Repairs stale values left behind by failed cascades.
pub fn recalculate_all<S: StayStore>(store: &mut S) -> Result<RecomputeReport, StoreError> {
    let stays = store.all_stays()?;
    let mut report = RecomputeReport {
        checked: stays.len(),
        ..RecomputeReport::default()
    };

    for stay in stays {
        match recalculate_stay(store, &stay.id) {
            Ok(Some(allocation)) => {
                let changed = (allocation.adjusted_hours - stay.adjusted_hours).abs() > 1e-9
                    || allocation.has_overlaps() != stay.has_overlaps;
                if changed {
                    report.changed.push(Recalculated {
                        stay_id: stay.id.clone(),
                        previous_hours: stay.adjusted_hours,
                        adjusted_hours: allocation.adjusted_hours,
                        has_overlaps: allocation.has_overlaps(),
                    });
                }
            }
            Ok(None) => {}
            Err(error) => {
                tracing::warn!(stay_id = %stay.id, error = %error, "recompute could not update stay");
                report.failed.push(CascadeFailure {
                    stay_id: stay.id.clone(),
                    error,
                });
            }
        }
    }

    Ok(report)
}
