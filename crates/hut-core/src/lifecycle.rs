//! Stay lifecycle controller.
//!
//! Every create, update or delete walks the same stages:
//!
//! ```text
//! Draft -> Validated -> Allocated -> Persisted -> CascadeComplete
//!   |                                    |
//!   +-> Rejected                         +-> PersistFailed
//! ```
//!
//! The write of the triggering stay is the durability boundary. Once it has
//! succeeded the operation is reported as successful, even if some
//! neighbours could not be brought up to date by the cascade.

use std::fmt;

use thiserror::Error;

use crate::allocation::allocate;
use crate::cascade::{CascadeConfig, CascadeReport, StayChange, on_stay_changed};
use crate::stay::{OverlapSegment, Stay, StayDraft};
use crate::store::{StayStore, StoreError};
use crate::types::{ChangeKind, StayId};
use crate::validate::{Rejection, ValidationConfig, ValidationContext, check_well_formed, validate};

/// Where an operation stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Draft,
    Validated,
    Allocated,
    Persisted,
    CascadeComplete,
    Rejected,
    PersistFailed,
}

impl Stage {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Validated => "validated",
            Self::Allocated => "allocated",
            Self::Persisted => "persisted",
            Self::CascadeComplete => "cascade_complete",
            Self::Rejected => "rejected",
            Self::PersistFailed => "persist_failed",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Why a lifecycle operation failed.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The validator refused the stay. Nothing was written.
    #[error("stay rejected ({code}): {0}", code = .0.code())]
    Rejected(#[from] Rejection),

    /// The stay to edit or delete does not exist.
    #[error("stay not found: {0}")]
    NotFound(StayId),

    /// The store failed before the triggering stay was durably written.
    /// No cascade ran.
    #[error("could not persist stay {stay_id} (after stage {stage})")]
    PersistFailed {
        stay_id: StayId,
        /// Last stage completed before the failure.
        stage: Stage,
        #[source]
        source: StoreError,
    },
}

impl LifecycleError {
    /// Stable reason code for callers.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Rejected(rejection) => rejection.code(),
            Self::NotFound(_) => "not_found",
            Self::PersistFailed { .. } => "persist_failed",
        }
    }
}

/// Result of a successful create or update.
#[derive(Debug)]
pub struct SavedStay {
    /// The stay as written, with its allocation applied.
    pub stay: Stay,
    /// Segments owned by the stay.
    pub segments: Vec<OverlapSegment>,
    pub change: ChangeKind,
    pub cascade: CascadeReport,
}

/// Result of a successful delete.
#[derive(Debug)]
pub struct DeletedStay {
    pub stay: Stay,
    pub cascade: CascadeReport,
}

/// Runs stay operations against a store.
///
/// Callers must serialize operations on the same store.
#[derive(Debug)]
pub struct StayService<S> {
    store: S,
    validation: ValidationConfig,
    cascade: CascadeConfig,
}

impl<S: StayStore> StayService<S> {
    pub fn new(store: S) -> Self {
        Self::with_config(store, ValidationConfig::default(), CascadeConfig::default())
    }

    pub const fn with_config(store: S, validation: ValidationConfig, cascade: CascadeConfig) -> Self {
        Self {
            store,
            validation,
            cascade,
        }
    }

    pub const fn store(&self) -> &S {
        &self.store
    }

    pub const fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }

    pub fn into_inner(self) -> S {
        self.store
    }

    /// Validates, allocates and saves a stay, then refreshes its neighbours.
    ///
    /// A draft without an id creates a new stay; with an id it replaces the
    /// stored stay of that id.
    pub fn create_or_update_stay(&mut self, draft: StayDraft) -> Result<SavedStay, LifecycleError> {
        let previous = match &draft.id {
            Some(id) => Some(self.load(id, Stage::Draft)?),
            None => None,
        };
        let id = draft.id.clone().unwrap_or_else(StayId::generate);
        let mut stay = Stay::from_draft(id, draft);
        trace_stage(&stay.id, Stage::Draft);

        check_well_formed(&stay).map_err(|rejection| reject(&stay.id, rejection))?;
        let context = self.context_for(&stay)?;
        validate(&stay, &context, &self.validation).map_err(|rejection| reject(&stay.id, rejection))?;
        trace_stage(&stay.id, Stage::Validated);

        let sharing: Vec<Stay> = context
            .day_neighbours
            .into_iter()
            .filter(|other| stay.shares_hours_with(other))
            .collect();
        let allocation = allocate(&stay, &sharing);
        allocation.apply_to(&mut stay);
        let segments = allocation.own_segments();
        tracing::debug!(
            stay_id = %stay.id,
            stage = %Stage::Allocated,
            adjusted_hours = stay.adjusted_hours,
            sharing = sharing.len(),
            "stay allocated"
        );

        self.store
            .save_allocated_stay(&stay, &segments)
            .map_err(|source| persist_failed(&stay.id, Stage::Allocated, source))?;
        trace_stage(&stay.id, Stage::Persisted);

        let change = match &previous {
            Some(previous) => StayChange::Updated {
                previous,
                current: &stay,
            },
            None => StayChange::Created(&stay),
        };
        let kind = change.kind();
        let cascade = on_stay_changed(&mut self.store, change, &self.cascade);
        trace_cascade(&stay.id, &cascade);

        Ok(SavedStay {
            stay,
            segments,
            change: kind,
            cascade,
        })
    }

    /// Removes a stay and refreshes the stays it shared hours with.
    pub fn delete_stay(&mut self, id: &StayId) -> Result<DeletedStay, LifecycleError> {
        let stay = self.load(id, Stage::Draft)?;
        trace_stage(id, Stage::Validated);

        self.store
            .delete_stay(id)
            .map_err(|source| persist_failed(id, Stage::Validated, source))?;
        trace_stage(id, Stage::Persisted);

        let cascade = on_stay_changed(&mut self.store, StayChange::Deleted(&stay), &self.cascade);
        trace_cascade(id, &cascade);

        Ok(DeletedStay { stay, cascade })
    }

    fn load(&self, id: &StayId, stage: Stage) -> Result<Stay, LifecycleError> {
        match self.store.get_stay(id) {
            Ok(Some(stay)) => Ok(stay),
            Ok(None) | Err(StoreError::NotFound(_)) => Err(LifecycleError::NotFound(id.clone())),
            Err(source) => Err(persist_failed(id, stage, source)),
        }
    }

    fn context_for(&self, stay: &Stay) -> Result<ValidationContext, LifecycleError> {
        let exclude = Some(&stay.id);
        let fail = |source: StoreError| persist_failed(&stay.id, Stage::Draft, source);

        Ok(ValidationContext {
            counter_neighbours: self
                .store
                .stays_overlapping_counter(stay.counter, exclude)
                .map_err(fail)?,
            day_neighbours: self
                .store
                .stays_overlapping_days(stay.period.first_day(), stay.period.last_day(), exclude)
                .map_err(fail)?,
            own_overlaps: self
                .store
                .member_stays_overlapping(&stay.period, &stay.member_id, exclude)
                .map_err(fail)?,
        })
    }
}

fn trace_stage(id: &StayId, stage: Stage) {
    tracing::debug!(stay_id = %id, stage = %stage, "stay lifecycle");
}

fn trace_cascade(id: &StayId, report: &CascadeReport) {
    tracing::debug!(
        stay_id = %id,
        stage = %Stage::CascadeComplete,
        updated = report.updated.len(),
        failed = report.failed.len(),
        "stay lifecycle"
    );
}

fn reject(id: &StayId, rejection: Rejection) -> LifecycleError {
    tracing::info!(
        stay_id = %id,
        stage = %Stage::Rejected,
        code = rejection.code(),
        reason = %rejection,
        "stay rejected"
    );
    LifecycleError::Rejected(rejection)
}

fn persist_failed(id: &StayId, stage: Stage, source: StoreError) -> LifecycleError {
    tracing::error!(
        stay_id = %id,
        stage = %Stage::PersistFailed,
        after = %stage,
        error = %source,
        "stay not persisted"
    );
    LifecycleError::PersistFailed {
        stay_id: id.clone(),
        stage,
        source,
    }
}
