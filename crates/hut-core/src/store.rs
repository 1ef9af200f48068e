//! Persistence contract the engine runs against.
//!
//! The engine never talks to a database directly. Anything that can answer
//! these queries and accept these writes can back it, e.g. `hut_db::Database`
//! or an in-memory map in tests.
//!
//! Implementations are expected to see a single writer at a time: the
//! lifecycle reads a snapshot of neighbouring stays and writes derived fields
//! back, so callers must serialize mutations per cabin.

use chrono::NaiveDate;
use thiserror::Error;

use crate::stay::{CounterRange, OverlapSegment, Period, Stay};
use crate::types::{MemberId, StayId};

/// Errors surfaced by a [`StayStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The requested stay does not exist.
    #[error("stay not found: {0}")]
    NotFound(StayId),

    /// The backing store failed.
    #[error("store backend error: {message}")]
    Backend {
        message: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl StoreError {
    /// Wraps a backend error.
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            message: error.to_string(),
            source: Box::new(error),
        }
    }
}

/// Read/write access to stays and their overlap segments.
pub trait StayStore {
    /// Stays present on any calendar day in `first_day..=last_day`.
    ///
    /// Inclusive on days, so both co-present stays and same-day handover
    /// neighbours are returned.
    fn stays_overlapping_days(
        &self,
        first_day: NaiveDate,
        last_day: NaiveDate,
        exclude: Option<&StayId>,
    ) -> Result<Vec<Stay>, StoreError>;

    /// Stays whose counter range intersects `range` with positive length.
    fn stays_overlapping_counter(
        &self,
        range: CounterRange,
        exclude: Option<&StayId>,
    ) -> Result<Vec<Stay>, StoreError>;

    /// The member's stays co-present with `period`.
    fn member_stays_overlapping(
        &self,
        period: &Period,
        member_id: &MemberId,
        exclude: Option<&StayId>,
    ) -> Result<Vec<Stay>, StoreError>;

    /// Looks up one stay.
    fn get_stay(&self, id: &StayId) -> Result<Option<Stay>, StoreError>;

    /// Every stored stay, ordered by arrival.
    fn all_stays(&self) -> Result<Vec<Stay>, StoreError>;

    /// Inserts or replaces a stay.
    fn save_stay(&mut self, stay: &Stay) -> Result<StayId, StoreError>;

    /// Replaces every segment owned by `stay_id`.
    fn save_overlap_segments(
        &mut self,
        stay_id: &StayId,
        segments: &[OverlapSegment],
    ) -> Result<(), StoreError>;

    /// Writes a stay together with the segments it owns.
    ///
    /// Backends that support transactions should override this so the pair
    /// lands atomically.
    fn save_allocated_stay(
        &mut self,
        stay: &Stay,
        segments: &[OverlapSegment],
    ) -> Result<StayId, StoreError> {
        let id = self.save_stay(stay)?;
        self.save_overlap_segments(&id, segments)?;
        Ok(id)
    }

    /// Segments owned by `stay_id`.
    fn overlap_segments(&self, stay_id: &StayId) -> Result<Vec<OverlapSegment>, StoreError>;

    /// Removes a stay and the segments it owns.
    fn delete_stay(&mut self, id: &StayId) -> Result<(), StoreError>;

    /// Stays whose counter hours are split with `stay`'s.
    ///
    /// See [`Stay::shares_hours_with`].
    fn sharing_stays(&self, stay: &Stay) -> Result<Vec<Stay>, StoreError> {
        let candidates = self.stays_overlapping_days(
            stay.period.first_day(),
            stay.period.last_day(),
            Some(&stay.id),
        )?;
        Ok(candidates
            .into_iter()
            .filter(|other| stay.shares_hours_with(other))
            .collect())
    }
}
