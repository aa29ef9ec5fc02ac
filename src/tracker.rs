//! Batch progress updates with per-entry results.

use chrono::NaiveDate;
use fieldplan_core::{error::PlanError, model::ProgressStatus};
use fieldplan_store::Store;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// One `(date, status)` pair as submitted. Kept as text so a malformed
/// pair fails alone instead of failing the whole batch at decode time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub date: String,
    pub status: String,
}

impl ProgressEntry {
    pub fn new(date: &str, status: &str) -> Self {
        Self {
            date: date.to_string(),
            status: status.to_string(),
        }
    }

    fn parse(&self) -> Result<(NaiveDate, ProgressStatus), PlanError> {
        let invalid = |reason: String| PlanError::ProgressEntryInvalid {
            date: self.date.clone(),
            reason,
        };
        let date = NaiveDate::parse_from_str(self.date.trim(), "%Y-%m-%d")
            .map_err(|e| invalid(format!("bad date: {e}")))?;
        let status = self.status.parse::<ProgressStatus>().map_err(invalid)?;
        Ok((date, status))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryResult {
    pub date: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ProgressStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressReport {
    pub task_id: String,
    pub results: Vec<EntryResult>,
    pub failed: usize,
    pub completed_day_count: u32,
}

/// Apply each entry independently. Only an unknown task fails the call.
pub async fn update_progress(
    store: &Store,
    task_id: &str,
    entries: &[ProgressEntry],
) -> Result<ProgressReport, PlanError> {
    if store.get_task(task_id).await?.is_none() {
        return Err(PlanError::NotFound(format!("task {task_id}")));
    }

    let mut results = Vec::with_capacity(entries.len());
    for entry in entries {
        let applied = match entry.parse() {
            Ok((date, status)) => store.set_progress(task_id, date, status).await,
            Err(e) => Err(e),
        };
        results.push(match applied {
            Ok(change) => EntryResult {
                date: entry.date.clone(),
                ok: true,
                status: Some(change.status),
                error: None,
            },
            Err(e) => {
                warn!("progress {task_id} {}: {e}", entry.date);
                EntryResult {
                    date: entry.date.clone(),
                    ok: false,
                    status: None,
                    error: Some(e.to_string()),
                }
            }
        });
    }

    let completed_day_count = store
        .get_task(task_id)
        .await?
        .map(|t| t.completed_day_count)
        .ok_or_else(|| PlanError::NotFound(format!("task {task_id}")))?;
    let failed = results.iter().filter(|r| !r.ok).count();

    info!(
        "progress {task_id}: {} entries, {failed} failed, {completed_day_count} day(s) done",
        results.len()
    );

    Ok(ProgressReport {
        task_id: task_id.to_string(),
        results,
        failed,
        completed_day_count,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::ScheduleOutcome;
    use crate::test_support::{scheduler, store_with_field};
    use fieldplan_core::model::RawCandidate;

    async fn setup() -> (Store, String) {
        let scheduler = scheduler(store_with_field().await);
        let raw = RawCandidate::new("물주기", "매일 물을 준다", "2025-06-01").with_period(3_i64);
        let ScheduleOutcome::Created { task } = scheduler.schedule(1, 1, &raw).await.unwrap() else {
            panic!("expected created");
        };
        (scheduler.store().clone(), task.task_id)
    }

    #[tokio::test]
    async fn test_done_then_resubmit() {
        let (store, task_id) = setup().await;
        let report = update_progress(&store, &task_id, &[ProgressEntry::new("2025-06-01", "done")])
            .await
            .unwrap();
        assert_eq!(report.completed_day_count, 1);
        assert_eq!(report.failed, 0);

        let report = update_progress(&store, &task_id, &[ProgressEntry::new("2025-06-01", "done")])
            .await
            .unwrap();
        assert_eq!(report.completed_day_count, 1);
    }

    #[tokio::test]
    async fn test_bad_entries_do_not_abort_batch() {
        let (store, task_id) = setup().await;
        let entries = [
            ProgressEntry::new("2025-06-01", "done"),
            ProgressEntry::new("2025-13-01", "done"),
            ProgressEntry::new("2025-06-02", "maybe"),
            ProgressEntry::new("2025-06-09", "done"),
            ProgressEntry::new("2025-06-03", "done"),
        ];
        let report = update_progress(&store, &task_id, &entries).await.unwrap();

        let oks: Vec<bool> = report.results.iter().map(|r| r.ok).collect();
        assert_eq!(oks, vec![true, false, false, false, true]);
        assert_eq!(report.failed, 3);
        assert_eq!(report.completed_day_count, 2);
        assert!(report.results[3]
            .error
            .as_deref()
            .unwrap()
            .contains("outside task range"));
    }

    #[tokio::test]
    async fn test_done_to_skip_decrements() {
        let (store, task_id) = setup().await;
        update_progress(&store, &task_id, &[ProgressEntry::new("2025-06-02", "done")])
            .await
            .unwrap();
        let report = update_progress(&store, &task_id, &[ProgressEntry::new("2025-06-02", "skip")])
            .await
            .unwrap();
        assert_eq!(report.completed_day_count, 0);
    }

    #[tokio::test]
    async fn test_unknown_task_fails_whole_call() {
        let (store, _) = setup().await;
        let err = update_progress(&store, "missing", &[ProgressEntry::new("2025-06-01", "done")])
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::NotFound(_)));
    }
}
