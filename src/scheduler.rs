//! Single entry point for turning a candidate into a persisted task.
//!
//! Normalize, take the per-(field, month) locks for every month the
//! candidate occupies, then let the store resolve conflicts and write the
//! task with its ledger in one transaction. A near-duplicate of an
//! overlapping task is discarded; existing tasks are never replaced.

use chrono::{Datelike, FixedOffset};
use fieldplan_core::{
    config::ScheduleConfig,
    error::PlanError,
    model::{RawCandidate, Task},
    normalize::normalize,
    similarity::find_duplicate,
};
use fieldplan_store::{ConflictScope, CreateOutcome, Store};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, warn};

type MonthKey = (i64, i32, u32);

/// Result of [`Scheduler::schedule`]. A duplicate is a normal outcome.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ScheduleOutcome {
    Created { task: Task },
    Duplicate { matched_task_id: String, similarity: f64 },
}

impl From<CreateOutcome> for ScheduleOutcome {
    fn from(outcome: CreateOutcome) -> Self {
        match outcome {
            CreateOutcome::Created(task) => Self::Created { task },
            CreateOutcome::Duplicate {
                matched_task_id,
                similarity,
            } => Self::Duplicate {
                matched_task_id,
                similarity,
            },
        }
    }
}

pub struct Scheduler {
    store: Store,
    offset: FixedOffset,
    threshold: f64,
    lock_timeout: Duration,
    widen_conflict_window: bool,
    locks: Mutex<HashMap<MonthKey, Arc<AsyncMutex<()>>>>,
}

impl Scheduler {
    pub fn new(store: Store, config: &ScheduleConfig) -> Result<Self, PlanError> {
        Ok(Self {
            store,
            offset: config.offset()?,
            threshold: config.schedule_threshold,
            lock_timeout: Duration::from_millis(config.lock_timeout_ms),
            widen_conflict_window: config.widen_conflict_window,
            locks: Mutex::new(HashMap::new()),
        })
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Schedule one candidate on `field_id` for `owner_id`.
    pub async fn schedule(
        &self,
        owner_id: i64,
        field_id: i64,
        raw: &RawCandidate,
    ) -> Result<ScheduleOutcome, PlanError> {
        let new_task = normalize(raw, self.offset)?;
        let range = new_task.occupied_range();
        let first = new_task.first_day();

        let guards = match self.lock_months(field_id, &range.months()).await {
            Ok(guards) => guards,
            Err(e) => {
                self.prune_locks();
                return Err(e);
            }
        };

        let scope = ConflictScope {
            field_id,
            range,
            start_month: (!self.widen_conflict_window).then(|| (first.year(), first.month())),
        };
        let threshold = self.threshold;
        let candidate_text = new_task.text();

        let outcome = self
            .store
            .create_task_checked(owner_id, scope, &new_task, |conflicts| {
                let texts: Vec<_> = conflicts.iter().map(Task::text).collect();
                let hit = find_duplicate(candidate_text, &texts, threshold);
                debug!(
                    "'{}' vs {} conflicting task(s): {hit:?}",
                    candidate_text.name,
                    conflicts.len()
                );
                hit.map(|(idx, score)| (conflicts[idx].task_id.clone(), score))
            })
            .await;

        drop(guards);
        self.prune_locks();

        let outcome = ScheduleOutcome::from(outcome?);
        if let ScheduleOutcome::Duplicate {
            matched_task_id,
            similarity,
        } = &outcome
        {
            warn!(
                "discarding '{}' on field {field_id} ({range}): duplicate of {matched_task_id} ({similarity:.3})",
                new_task.task_name
            );
        }
        Ok(outcome)
    }

    /// Lock each `(field, year, month)` in ascending order, all within one
    /// shared deadline.
    pub(crate) async fn lock_months(
        &self,
        field_id: i64,
        months: &[(i32, u32)],
    ) -> Result<Vec<OwnedMutexGuard<()>>, PlanError> {
        let mut keys: Vec<MonthKey> = months.iter().map(|&(y, m)| (field_id, y, m)).collect();
        keys.sort_unstable();
        keys.dedup();

        let mutexes: Vec<Arc<AsyncMutex<()>>> = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            keys.iter()
                .map(|key| locks.entry(*key).or_default().clone())
                .collect()
        };

        let deadline = tokio::time::Instant::now() + self.lock_timeout;
        let mut guards = Vec::with_capacity(mutexes.len());
        for (mutex, (_, year, month)) in mutexes.into_iter().zip(keys) {
            let guard = tokio::time::timeout_at(deadline, mutex.lock_owned())
                .await
                .map_err(|_| PlanError::ConcurrentScheduleConflict {
                    field_id,
                    detail: format!(
                        "lock for {year}-{month:02} not acquired within {}ms",
                        self.lock_timeout.as_millis()
                    ),
                })?;
            guards.push(guard);
        }
        Ok(guards)
    }

    /// Forget month locks nobody holds or waits on.
    fn prune_locks(&self) {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks.retain(|_, m| Arc::strong_count(m) > 1);
    }
}
