//! Daily progress ledger and the completion counter it drives.

use super::tasks::day_str;
use super::Store;
use chrono::NaiveDate;
use fieldplan_core::{
    aggregate::completion_rate,
    error::PlanError,
    model::{DayRange, Progress, ProgressStatus},
};
use serde::Serialize;
use tracing::debug;

/// Effect of one ledger write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProgressChange {
    /// Status before the write; `None` if the row did not exist.
    pub previous: Option<ProgressStatus>,
    pub status: ProgressStatus,
    pub completed_day_count: u32,
}

/// Ledger totals over a window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ProgressCounts {
    pub done: u64,
    pub total: u64,
}

impl ProgressCounts {
    pub fn rate(&self) -> u32 {
        completion_rate(self.done, self.total)
    }
}

fn counter_delta(previous: Option<ProgressStatus>, next: ProgressStatus) -> i64 {
    match (previous, next) {
        (None | Some(ProgressStatus::Skip), ProgressStatus::Done) => 1,
        (Some(ProgressStatus::Done), ProgressStatus::Skip) => -1,
        _ => 0,
    }
}

fn parse_status(raw: &str) -> Result<ProgressStatus, PlanError> {
    raw.parse()
        .map_err(|e: String| PlanError::Store(format!("bad status in ledger: {e}")))
}

impl Store {
    /// Upsert one ledger row and adjust the task's counter in the same
    /// transaction. The task row is written first, so concurrent updates to
    /// one task are serialized by SQLite's write lock.
    pub async fn set_progress(
        &self,
        task_id: &str,
        date: NaiveDate,
        status: ProgressStatus,
    ) -> Result<ProgressChange, PlanError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PlanError::Store(format!("begin failed: {e}")))?;

        let touched = sqlx::query("UPDATE tasks SET updated_at = datetime('now') WHERE task_id = ?")
            .bind(task_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| PlanError::Store(format!("task lock failed: {e}")))?;
        if touched.rows_affected() == 0 {
            return Err(PlanError::NotFound(format!("task {task_id}")));
        }

        let (start_day, end_day): (String, String) =
            sqlx::query_as("SELECT start_day, end_day FROM tasks WHERE task_id = ?")
                .bind(task_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| PlanError::Store(format!("load task range failed: {e}")))?;
        let date_str = day_str(date);
        if date_str < start_day || date_str > end_day {
            return Err(PlanError::ProgressEntryInvalid {
                date: date_str,
                reason: format!("outside task range {start_day}..{end_day}"),
            });
        }

        let previous: Option<(String,)> =
            sqlx::query_as("SELECT status FROM task_progress WHERE task_id = ? AND date = ?")
                .bind(task_id)
                .bind(&date_str)
                .fetch_optional(&mut *tx)
                .await
                .map_err(|e| PlanError::Store(format!("load progress failed: {e}")))?;
        let previous = previous.map(|(s,)| parse_status(&s)).transpose()?;

        sqlx::query(
            "INSERT INTO task_progress (task_id, date, status) VALUES (?, ?, ?) \
             ON CONFLICT(task_id, date) DO UPDATE SET \
             status = excluded.status, updated_at = datetime('now')",
        )
        .bind(task_id)
        .bind(&date_str)
        .bind(status.as_str())
        .execute(&mut *tx)
        .await
        .map_err(|e| PlanError::Store(format!("upsert progress failed: {e}")))?;

        let delta = counter_delta(previous, status);
        if delta != 0 {
            sqlx::query(
                "UPDATE tasks SET completed_day_count = MAX(completed_day_count + ?, 0) \
                 WHERE task_id = ?",
            )
            .bind(delta)
            .bind(task_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| PlanError::Store(format!("counter update failed: {e}")))?;
        }

        let (count,): (i64,) =
            sqlx::query_as("SELECT completed_day_count FROM tasks WHERE task_id = ?")
                .bind(task_id)
                .fetch_one(&mut *tx)
                .await
                .map_err(|e| PlanError::Store(format!("load counter failed: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| PlanError::Store(format!("commit failed: {e}")))?;

        debug!("task {task_id} {date_str}: {previous:?} -> {status} (count {count})");

        Ok(ProgressChange {
            previous,
            status,
            completed_day_count: u32::try_from(count).unwrap_or(0),
        })
    }

    /// The ledger of one task, in date order.
    pub async fn list_progress(&self, task_id: &str) -> Result<Vec<Progress>, PlanError> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            "SELECT date, status FROM task_progress WHERE task_id = ? ORDER BY date",
        )
        .bind(task_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PlanError::Store(format!("list progress failed: {e}")))?;

        rows.into_iter()
            .map(|(date, status)| {
                let date = NaiveDate::parse_from_str(&date, "%Y-%m-%d")
                    .map_err(|e| PlanError::Store(format!("bad ledger date '{date}': {e}")))?;
                Ok(Progress {
                    task_id: task_id.to_string(),
                    date,
                    status: parse_status(&status)?,
                })
            })
            .collect()
    }

    /// Done and total ledger rows of an owner's tasks dated within `window`.
    pub async fn progress_counts(
        &self,
        owner_id: i64,
        window: DayRange,
        field_id: Option<i64>,
    ) -> Result<ProgressCounts, PlanError> {
        let (done, total): (i64, i64) = sqlx::query_as(
            "SELECT COALESCE(SUM(p.status = 'done'), 0), COUNT(*) \
             FROM task_progress p JOIN tasks t ON t.task_id = p.task_id \
             WHERE t.owner_id = ? AND p.date BETWEEN ? AND ? \
             AND (? IS NULL OR t.field_id = ?)",
        )
        .bind(owner_id)
        .bind(day_str(window.start))
        .bind(day_str(window.end))
        .bind(field_id)
        .bind(field_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PlanError::Store(format!("completion query failed: {e}")))?;

        Ok(ProgressCounts {
            done: u64::try_from(done).unwrap_or(0),
            total: u64::try_from(total).unwrap_or(0),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::store_with_field;
    use super::super::{ConflictScope, CreateOutcome};
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use fieldplan_core::model::{NewTask, Task};

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, d).unwrap()
    }

    async fn seeded_task(store: &Store, start: u32, period: u32) -> Task {
        let kst = FixedOffset::east_opt(9 * 3600).unwrap();
        let new = NewTask {
            task_name: "물주기".into(),
            task_content: "매일 물을 준다".into(),
            priority: 3,
            period,
            repeat_interval_hint: 1,
            is_pest: false,
            start_date: kst.with_ymd_and_hms(2025, 6, start, 0, 0, 0).unwrap(),
        };
        let scope = ConflictScope {
            field_id: 1,
            range: new.occupied_range(),
            start_month: None,
        };
        match store.create_task_checked(1, scope, &new, |_| None).await.unwrap() {
            CreateOutcome::Created(task) => task,
            other => panic!("expected created, got {other:?}"),
        }
    }

    #[test]
    fn test_counter_delta() {
        use ProgressStatus::{Done, Skip};
        assert_eq!(counter_delta(None, Done), 1);
        assert_eq!(counter_delta(Some(Skip), Done), 1);
        assert_eq!(counter_delta(Some(Done), Skip), -1);
        assert_eq!(counter_delta(Some(Done), Done), 0);
        assert_eq!(counter_delta(None, Skip), 0);
    }

    #[tokio::test]
    async fn test_done_is_idempotent() {
        let store = store_with_field().await;
        let task = seeded_task(&store, 1, 3).await;

        let first = store
            .set_progress(&task.task_id, day(1), ProgressStatus::Done)
            .await
            .unwrap();
        assert_eq!(first.previous, Some(ProgressStatus::Skip));
        assert_eq!(first.completed_day_count, 1);

        let again = store
            .set_progress(&task.task_id, day(1), ProgressStatus::Done)
            .await
            .unwrap();
        assert_eq!(again.completed_day_count, 1);
    }

    #[tokio::test]
    async fn test_skip_decrements_and_floors() {
        let store = store_with_field().await;
        let task = seeded_task(&store, 1, 2).await;

        store
            .set_progress(&task.task_id, day(2), ProgressStatus::Done)
            .await
            .unwrap();
        let back = store
            .set_progress(&task.task_id, day(2), ProgressStatus::Skip)
            .await
            .unwrap();
        assert_eq!(back.completed_day_count, 0);

        let still = store
            .set_progress(&task.task_id, day(2), ProgressStatus::Skip)
            .await
            .unwrap();
        assert_eq!(still.completed_day_count, 0);
        assert_eq!(store.list_progress(&task.task_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_date_outside_range_rejected() {
        let store = store_with_field().await;
        let task = seeded_task(&store, 1, 3).await;
        let err = store
            .set_progress(&task.task_id, day(4), ProgressStatus::Done)
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::ProgressEntryInvalid { .. }));
        assert_eq!(store.get_task(&task.task_id).await.unwrap().unwrap().completed_day_count, 0);
    }

    #[tokio::test]
    async fn test_unknown_task() {
        let store = store_with_field().await;
        let err = store
            .set_progress("missing", day(1), ProgressStatus::Done)
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_counts_over_window() {
        let store = store_with_field().await;
        let a = seeded_task(&store, 1, 3).await; // 1..3
        let _b = seeded_task(&store, 30, 2).await; // 30..July 1

        store.set_progress(&a.task_id, day(1), ProgressStatus::Done).await.unwrap();
        store.set_progress(&a.task_id, day(2), ProgressStatus::Done).await.unwrap();

        let june = DayRange::month(2025, 6).unwrap();
        let counts = store.progress_counts(1, june, None).await.unwrap();
        assert_eq!(counts, ProgressCounts { done: 2, total: 4 });
        assert_eq!(counts.rate(), 50);

        let empty = DayRange::month(2025, 8).unwrap();
        assert_eq!(store.progress_counts(1, empty, None).await.unwrap().rate(), 0);
        assert_eq!(store.progress_counts(1, june, Some(9)).await.unwrap().total, 0);
    }
}
