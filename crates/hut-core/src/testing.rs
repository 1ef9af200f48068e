//! In-memory [`StayStore`] for tests, with write-failure injection.

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;

use crate::stay::{CounterRange, OverlapSegment, Period, Stay};
use crate::store::{StayStore, StoreError};
use crate::types::{MemberId, StayId};

#[derive(Debug, Default)]
pub struct MemoryStore {
    stays: BTreeMap<StayId, Stay>,
    segments: BTreeMap<StayId, Vec<OverlapSegment>>,
    /// Writes touching these ids fail.
    pub failing: HashSet<StayId>,
    /// Number of successful writes, across all kinds.
    pub writes: usize,
}

impl MemoryStore {
    pub fn with_stays(stays: impl IntoIterator<Item = Stay>) -> Self {
        Self {
            stays: stays.into_iter().map(|s| (s.id.clone(), s)).collect(),
            ..Self::default()
        }
    }

    pub fn fail_writes_for(&mut self, id: &StayId) {
        self.failing.insert(id.clone());
    }

    pub fn stay(&self, id: &str) -> Stay {
        self.stays[&StayId::new(id).unwrap()].clone()
    }

    pub fn segments(&self, id: &str) -> Vec<OverlapSegment> {
        self.segments
            .get(&StayId::new(id).unwrap())
            .cloned()
            .unwrap_or_default()
    }

    fn check_writable(&self, id: &StayId) -> Result<(), StoreError> {
        if self.failing.contains(id) {
            return Err(StoreError::backend(std::io::Error::other(format!(
                "injected write failure for {id}"
            ))));
        }
        Ok(())
    }

    fn filtered(&self, exclude: Option<&StayId>, keep: impl Fn(&Stay) -> bool) -> Vec<Stay> {
        let mut stays: Vec<Stay> = self
            .stays
            .values()
            .filter(|s| Some(&s.id) != exclude)
            .filter(|s| keep(s))
            .cloned()
            .collect();
        stays.sort_by(|a, b| a.period.arrival.cmp(&b.period.arrival).then(a.id.cmp(&b.id)));
        stays
    }
}

impl StayStore for MemoryStore {
    fn stays_overlapping_days(
        &self,
        first_day: NaiveDate,
        last_day: NaiveDate,
        exclude: Option<&StayId>,
    ) -> Result<Vec<Stay>, StoreError> {
        Ok(self.filtered(exclude, |s| {
            s.period.first_day() <= last_day && s.period.last_day() >= first_day
        }))
    }

    fn stays_overlapping_counter(
        &self,
        range: CounterRange,
        exclude: Option<&StayId>,
    ) -> Result<Vec<Stay>, StoreError> {
        Ok(self.filtered(exclude, |s| s.counter.intersects(&range)))
    }

    fn member_stays_overlapping(
        &self,
        period: &Period,
        member_id: &MemberId,
        exclude: Option<&StayId>,
    ) -> Result<Vec<Stay>, StoreError> {
        Ok(self.filtered(exclude, |s| {
            &s.member_id == member_id && s.period.overlaps(period)
        }))
    }

    fn get_stay(&self, id: &StayId) -> Result<Option<Stay>, StoreError> {
        Ok(self.stays.get(id).cloned())
    }

    fn all_stays(&self) -> Result<Vec<Stay>, StoreError> {
        Ok(self.filtered(None, |_| true))
    }

    fn save_stay(&mut self, stay: &Stay) -> Result<StayId, StoreError> {
        self.check_writable(&stay.id)?;
        self.stays.insert(stay.id.clone(), stay.clone());
        self.writes += 1;
        Ok(stay.id.clone())
    }

    fn save_overlap_segments(
        &mut self,
        stay_id: &StayId,
        segments: &[OverlapSegment],
    ) -> Result<(), StoreError> {
        self.check_writable(stay_id)?;
        self.segments.insert(stay_id.clone(), segments.to_vec());
        self.writes += 1;
        Ok(())
    }

    fn overlap_segments(&self, stay_id: &StayId) -> Result<Vec<OverlapSegment>, StoreError> {
        Ok(self.segments.get(stay_id).cloned().unwrap_or_default())
    }

    fn delete_stay(&mut self, id: &StayId) -> Result<(), StoreError> {
        self.check_writable(id)?;
        if self.stays.remove(id).is_none() {
            return Err(StoreError::NotFound(id.clone()));
        }
        self.segments.remove(id);
        self.writes += 1;
        Ok(())
    }
}
