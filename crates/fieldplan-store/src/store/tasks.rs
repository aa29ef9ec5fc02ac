//! Task rows and their creation together with the progress ledger.

use super::Store;
use chrono::{DateTime, NaiveDate};
use fieldplan_core::{
    error::PlanError,
    model::{
        mentions_pest, truncate_chars, DayRange, NewTask, Task, TaskPatch, MAX_PERIOD_DAYS,
        TASK_NAME_MAX_CHARS,
    },
};
use sqlx::SqliteConnection;
use tracing::{debug, info};
use uuid::Uuid;

const TASK_COLUMNS: &str = "task_id, owner_id, field_id, task_name, task_content, priority, \
     period, repeat_interval_hint, completed_day_count, is_pest, start_at";

#[derive(sqlx::FromRow)]
struct TaskRow {
    task_id: String,
    owner_id: i64,
    field_id: i64,
    task_name: String,
    task_content: String,
    priority: i64,
    period: i64,
    repeat_interval_hint: i64,
    completed_day_count: i64,
    is_pest: bool,
    start_at: String,
}

impl TryFrom<TaskRow> for Task {
    type Error = PlanError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let start_date = DateTime::parse_from_rfc3339(&row.start_at).map_err(|e| {
            PlanError::Store(format!("task {}: bad start_at '{}': {e}", row.task_id, row.start_at))
        })?;
        Ok(Task {
            task_id: row.task_id,
            owner_id: row.owner_id,
            field_id: row.field_id,
            task_name: row.task_name,
            task_content: row.task_content,
            priority: row.priority,
            period: u32::try_from(row.period).unwrap_or(1).max(1),
            repeat_interval_hint: u32::try_from(row.repeat_interval_hint).unwrap_or(0),
            completed_day_count: u32::try_from(row.completed_day_count).unwrap_or(0),
            is_pest: row.is_pest,
            start_date,
        })
    }
}

fn rows_to_tasks(rows: Vec<TaskRow>) -> Result<Vec<Task>, PlanError> {
    rows.into_iter().map(Task::try_from).collect()
}

pub(crate) fn day_str(day: NaiveDate) -> String {
    day.format("%Y-%m-%d").to_string()
}

/// Which existing tasks a candidate is checked against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConflictScope {
    pub field_id: i64,
    /// Candidate's occupied range; overlapping tasks conflict.
    pub range: DayRange,
    /// When set, only tasks starting in this `(year, month)` are considered.
    pub start_month: Option<(i32, u32)>,
}

/// Result of a checked task creation.
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    Created(Task),
    /// Nothing was written; the candidate matched an existing task.
    Duplicate { matched_task_id: String, similarity: f64 },
}

impl Store {
    /// Atomically resolve conflicts, run `is_duplicate` over them, and either
    /// write the task plus one `skip` ledger row per occupied day, or nothing.
    ///
    /// The transaction opens with a write on the field row so SQLite grants
    /// the write lock before the conflict read.
    pub async fn create_task_checked<F>(
        &self,
        owner_id: i64,
        scope: ConflictScope,
        new: &NewTask,
        is_duplicate: F,
    ) -> Result<CreateOutcome, PlanError>
    where
        F: FnOnce(&[Task]) -> Option<(String, f64)>,
    {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PlanError::Store(format!("begin failed: {e}")))?;

        let touched = sqlx::query("UPDATE fields SET updated_at = datetime('now') WHERE id = ?")
            .bind(scope.field_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| PlanError::Store(format!("field lock failed: {e}")))?;
        if touched.rows_affected() == 0 {
            return Err(PlanError::NotFound(format!("field {}", scope.field_id)));
        }

        let conflicts = find_conflicts(&mut tx, &scope).await?;
        debug!(
            "field {}: {} conflicting task(s) in {}",
            scope.field_id,
            conflicts.len(),
            scope.range
        );

        if let Some((matched_task_id, similarity)) = is_duplicate(&conflicts) {
            tx.rollback()
                .await
                .map_err(|e| PlanError::Store(format!("rollback failed: {e}")))?;
            return Ok(CreateOutcome::Duplicate {
                matched_task_id,
                similarity,
            });
        }

        let task = insert_task(&mut tx, owner_id, scope.field_id, new).await?;
        seed_ledger(&mut tx, &task.task_id, task.occupied_range()).await?;

        tx.commit()
            .await
            .map_err(|e| PlanError::Store(format!("commit failed: {e}")))?;

        info!(
            "created task {} '{}' on field {} ({})",
            task.task_id,
            task.task_name,
            task.field_id,
            task.occupied_range()
        );
        Ok(CreateOutcome::Created(task))
    }

    /// Tasks conflicting with `scope`, outside any transaction.
    pub async fn find_conflicts(&self, scope: &ConflictScope) -> Result<Vec<Task>, PlanError> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| PlanError::Store(format!("acquire failed: {e}")))?;
        find_conflicts(&mut conn, scope).await
    }

    pub async fn get_task(&self, task_id: &str) -> Result<Option<Task>, PlanError> {
        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE task_id = ?");
        let row: Option<TaskRow> = sqlx::query_as(&sql)
            .bind(task_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| PlanError::Store(format!("get task failed: {e}")))?;
        row.map(Task::try_from).transpose()
    }

    /// Tasks of an owner, optionally for one field, oldest first.
    pub async fn list_tasks(
        &self,
        owner_id: i64,
        field_id: Option<i64>,
    ) -> Result<Vec<Task>, PlanError> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks \
             WHERE owner_id = ? AND (? IS NULL OR field_id = ?) \
             ORDER BY start_day, priority, task_id"
        );
        let rows: Vec<TaskRow> = sqlx::query_as(&sql)
            .bind(owner_id)
            .bind(field_id)
            .bind(field_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PlanError::Store(format!("list tasks failed: {e}")))?;
        rows_to_tasks(rows)
    }

    /// Tasks of an owner whose occupied range intersects `window`.
    pub async fn tasks_in_window(
        &self,
        owner_id: i64,
        window: DayRange,
        field_id: Option<i64>,
    ) -> Result<Vec<Task>, PlanError> {
        let sql = format!(
            "SELECT {TASK_COLUMNS} FROM tasks \
             WHERE owner_id = ? AND start_day <= ? AND end_day >= ? \
             AND (? IS NULL OR field_id = ?) \
             ORDER BY start_day, priority, task_id"
        );
        let rows: Vec<TaskRow> = sqlx::query_as(&sql)
            .bind(owner_id)
            .bind(day_str(window.end))
            .bind(day_str(window.start))
            .bind(field_id)
            .bind(field_id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| PlanError::Store(format!("window query failed: {e}")))?;
        rows_to_tasks(rows)
    }

    /// Names of a field's tasks starting within `range`, for planner context.
    pub async fn task_names_starting_in(
        &self,
        field_id: i64,
        range: DayRange,
    ) -> Result<Vec<String>, PlanError> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT task_name FROM tasks \
             WHERE field_id = ? AND start_day BETWEEN ? AND ? ORDER BY start_day, task_name",
        )
        .bind(field_id)
        .bind(day_str(range.start))
        .bind(day_str(range.end))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PlanError::Store(format!("task names query failed: {e}")))?;
        Ok(rows.into_iter().map(|(name,)| name).collect())
    }

    /// Apply a partial update. Moving the range re-seeds the ledger: days that
    /// left the range are dropped, new days start as `skip`, and the
    /// completion counter is recounted from the surviving `done` rows.
    pub async fn update_task(&self, task_id: &str, patch: &TaskPatch) -> Result<Task, PlanError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| PlanError::Store(format!("begin failed: {e}")))?;

        let touched = sqlx::query("UPDATE tasks SET updated_at = datetime('now') WHERE task_id = ?")
            .bind(task_id)
            .execute(&mut *tx)
            .await
            .map_err(|e| PlanError::Store(format!("update task failed: {e}")))?;
        if touched.rows_affected() == 0 {
            return Err(PlanError::NotFound(format!("task {task_id}")));
        }

        let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE task_id = ?");
        let row: TaskRow = sqlx::query_as(&sql)
            .bind(task_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| PlanError::Store(format!("load task failed: {e}")))?;
        let mut task = Task::try_from(row)?;

        if let Some(name) = &patch.task_name {
            task.task_name = truncate_chars(name.trim(), TASK_NAME_MAX_CHARS);
        }
        if let Some(content) = &patch.task_content {
            task.task_content = content.trim().to_string();
            task.is_pest = mentions_pest(&task.task_content);
        }
        if let Some(priority) = patch.priority {
            task.priority = priority;
        }
        if let Some(period) = patch.period {
            task.period = checked_period(period)?;
        }
        if let Some(start) = patch.start_date {
            task.start_date = start;
        }

        let range = task.occupied_range();
        if patch.touches_range() {
            reseed_ledger(&mut tx, task_id, range).await?;
            let (done,): (i64,) = sqlx::query_as(
                "SELECT COUNT(*) FROM task_progress WHERE task_id = ? AND status = 'done'",
            )
            .bind(task_id)
            .fetch_one(&mut *tx)
            .await
            .map_err(|e| PlanError::Store(format!("recount failed: {e}")))?;
            task.completed_day_count = u32::try_from(done).unwrap_or(0);
        }

        sqlx::query(
            "UPDATE tasks SET task_name = ?, task_content = ?, priority = ?, period = ?, \
             is_pest = ?, start_at = ?, start_day = ?, end_day = ?, completed_day_count = ? \
             WHERE task_id = ?",
        )
        .bind(&task.task_name)
        .bind(&task.task_content)
        .bind(task.priority)
        .bind(i64::from(task.period))
        .bind(task.is_pest)
        .bind(task.start_date.to_rfc3339())
        .bind(day_str(range.start))
        .bind(day_str(range.end))
        .bind(i64::from(task.completed_day_count))
        .bind(task_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| PlanError::Store(format!("update task failed: {e}")))?;

        tx.commit()
            .await
            .map_err(|e| PlanError::Store(format!("commit failed: {e}")))?;

        info!("updated task {task_id}");
        Ok(task)
    }

    /// Delete a task; its ledger rows go with it. Returns false if absent.
    pub async fn delete_task(&self, task_id: &str) -> Result<bool, PlanError> {
        let result = sqlx::query("DELETE FROM tasks WHERE task_id = ?")
            .bind(task_id)
            .execute(&self.pool)
            .await
            .map_err(|e| PlanError::Store(format!("delete task failed: {e}")))?;
        Ok(result.rows_affected() > 0)
    }
}

async fn find_conflicts(
    conn: &mut SqliteConnection,
    scope: &ConflictScope,
) -> Result<Vec<Task>, PlanError> {
    let (month_start, month_end) = match scope.start_month.and_then(|(y, m)| DayRange::month(y, m)) {
        Some(month) => (Some(day_str(month.start)), Some(day_str(month.end))),
        None => (None, None),
    };

    let sql = format!(
        "SELECT {TASK_COLUMNS} FROM tasks \
         WHERE field_id = ? AND start_day <= ? AND end_day >= ? \
         AND (? IS NULL OR start_day BETWEEN ? AND ?) \
         ORDER BY start_day, task_id"
    );
    let rows: Vec<TaskRow> = sqlx::query_as(&sql)
        .bind(scope.field_id)
        .bind(day_str(scope.range.end))
        .bind(day_str(scope.range.start))
        .bind(month_start.clone())
        .bind(month_start)
        .bind(month_end)
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| PlanError::Store(format!("conflict query failed: {e}")))?;

    // Re-check with the same closed-interval rule used everywhere else.
    Ok(rows_to_tasks(rows)?
        .into_iter()
        .filter(|t| t.occupied_range().overlaps(&scope.range))
        .collect())
}

async fn insert_task(
    conn: &mut SqliteConnection,
    owner_id: i64,
    field_id: i64,
    new: &NewTask,
) -> Result<Task, PlanError> {
    let task = Task {
        task_id: Uuid::new_v4().to_string(),
        owner_id,
        field_id,
        task_name: new.stored_name(),
        task_content: new.task_content.clone(),
        priority: new.priority,
        period: checked_period(new.period)?,
        repeat_interval_hint: new.repeat_interval_hint,
        completed_day_count: 0,
        is_pest: new.is_pest,
        start_date: new.start_date,
    };
    let range = task.occupied_range();

    sqlx::query(
        "INSERT INTO tasks (task_id, owner_id, field_id, task_name, task_content, priority, \
         period, repeat_interval_hint, completed_day_count, is_pest, start_at, start_day, end_day) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?, ?)",
    )
    .bind(&task.task_id)
    .bind(task.owner_id)
    .bind(task.field_id)
    .bind(&task.task_name)
    .bind(&task.task_content)
    .bind(task.priority)
    .bind(i64::from(task.period))
    .bind(i64::from(task.repeat_interval_hint))
    .bind(task.is_pest)
    .bind(task.start_date.to_rfc3339())
    .bind(day_str(range.start))
    .bind(day_str(range.end))
    .execute(&mut *conn)
    .await
    .map_err(|e| PlanError::Store(format!("insert task failed: {e}")))?;

    Ok(task)
}

fn checked_period(period: u32) -> Result<u32, PlanError> {
    if period > MAX_PERIOD_DAYS {
        return Err(PlanError::InvalidScheduleInput(format!(
            "period {period} exceeds {MAX_PERIOD_DAYS} days"
        )));
    }
    Ok(period.max(1))
}

/// One `skip` row per day of `range` in a single statement; existing rows
/// are left alone. `WHERE true` keeps the upsert clause unambiguous.
async fn seed_ledger(
    conn: &mut SqliteConnection,
    task_id: &str,
    range: DayRange,
) -> Result<(), PlanError> {
    sqlx::query(
        "WITH RECURSIVE span(day) AS ( \
             SELECT ? UNION ALL SELECT date(day, '+1 day') FROM span WHERE day < ? \
         ) \
         INSERT INTO task_progress (task_id, date, status) \
         SELECT ?, day, 'skip' FROM span WHERE true \
         ON CONFLICT(task_id, date) DO NOTHING",
    )
    .bind(day_str(range.start))
    .bind(day_str(range.end))
    .bind(task_id)
    .execute(&mut *conn)
    .await
    .map_err(|e| PlanError::Store(format!("seed progress failed: {e}")))?;
    Ok(())
}

async fn reseed_ledger(
    conn: &mut SqliteConnection,
    task_id: &str,
    range: DayRange,
) -> Result<(), PlanError> {
    sqlx::query("DELETE FROM task_progress WHERE task_id = ? AND (date < ? OR date > ?)")
        .bind(task_id)
        .bind(day_str(range.start))
        .bind(day_str(range.end))
        .execute(&mut *conn)
        .await
        .map_err(|e| PlanError::Store(format!("trim progress failed: {e}")))?;
    seed_ledger(conn, task_id, range).await
}

#[cfg(test)]
mod tests {
    use super::super::test_support::store_with_field;
    use super::*;
    use chrono::{FixedOffset, TimeZone};
    use fieldplan_core::model::ProgressStatus;

    fn new_task(name: &str, day: u32, period: u32) -> NewTask {
        let kst = FixedOffset::east_opt(9 * 3600).unwrap();
        NewTask {
            task_name: name.to_string(),
            task_content: "내용".to_string(),
            priority: 3,
            period,
            repeat_interval_hint: 0,
            is_pest: false,
            start_date: kst.with_ymd_and_hms(2025, 6, day, 0, 0, 0).unwrap(),
        }
    }

    fn scope_for(new: &NewTask) -> ConflictScope {
        ConflictScope {
            field_id: 1,
            range: new.occupied_range(),
            start_month: None,
        }
    }

    async fn create(store: &Store, new: &NewTask) -> Task {
        match store
            .create_task_checked(1, scope_for(new), new, |_| None)
            .await
            .unwrap()
        {
            CreateOutcome::Created(task) => task,
            other => panic!("expected created, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_create_seeds_contiguous_ledger() {
        let store = store_with_field().await;
        let task = create(&store, &new_task("물주기", 1, 3)).await;

        let ledger = store.list_progress(&task.task_id).await.unwrap();
        let days: Vec<String> = ledger.iter().map(|p| day_str(p.date)).collect();
        assert_eq!(days, vec!["2025-06-01", "2025-06-02", "2025-06-03"]);
        assert!(ledger.iter().all(|p| p.status == ProgressStatus::Skip));
    }

    #[tokio::test]
    async fn test_create_truncates_stored_name() {
        let store = store_with_field().await;
        let task = create(&store, &new_task(&"가".repeat(70), 1, 1)).await;
        assert_eq!(task.task_name.chars().count(), TASK_NAME_MAX_CHARS);
        let loaded = store.get_task(&task.task_id).await.unwrap().unwrap();
        assert_eq!(loaded, task);
    }

    #[tokio::test]
    async fn test_duplicate_writes_nothing() {
        let store = store_with_field().await;
        let first = create(&store, &new_task("물주기", 1, 3)).await;

        let second = new_task("물주기", 2, 2);
        let outcome = store
            .create_task_checked(1, scope_for(&second), &second, |conflicts| {
                assert_eq!(conflicts.len(), 1);
                Some((conflicts[0].task_id.clone(), 1.0))
            })
            .await
            .unwrap();
        assert_eq!(
            outcome,
            CreateOutcome::Duplicate {
                matched_task_id: first.task_id.clone(),
                similarity: 1.0
            }
        );
        assert_eq!(store.list_tasks(1, None).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_field_is_not_found() {
        let store = store_with_field().await;
        let new = new_task("물주기", 1, 1);
        let mut scope = scope_for(&new);
        scope.field_id = 42;
        let err = store
            .create_task_checked(1, scope, &new, |_| None)
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_conflicts_use_closed_intervals() {
        let store = store_with_field().await;
        create(&store, &new_task("지주", 1, 3)).await; // 1..3
        create(&store, &new_task("수확", 5, 1)).await; // 5..5

        let touching = new_task("x", 3, 2); // 3..4
        let found = store.find_conflicts(&scope_for(&touching)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].task_name, "지주");

        let gap = new_task("x", 4, 1); // 4..4
        assert!(store.find_conflicts(&scope_for(&gap)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_month_scope_misses_cross_month_overlap() {
        let store = store_with_field().await;
        create(&store, &new_task("지주", 29, 5)).await; // June 29 .. July 3

        let kst = FixedOffset::east_opt(9 * 3600).unwrap();
        let mut july = new_task("x", 1, 1);
        july.start_date = kst.with_ymd_and_hms(2025, 7, 1, 0, 0, 0).unwrap();

        let mut scope = scope_for(&july);
        assert_eq!(store.find_conflicts(&scope).await.unwrap().len(), 1);

        scope.start_month = Some((2025, 7));
        assert!(store.find_conflicts(&scope).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_window_query_and_field_filter() {
        let store = store_with_field().await;
        store
            .upsert_field(&super::super::test_support::tomato_field(2))
            .await
            .unwrap();
        create(&store, &new_task("a", 1, 2)).await;
        let other = new_task("b", 2, 1);
        let scope = ConflictScope {
            field_id: 2,
            ..scope_for(&other)
        };
        store
            .create_task_checked(1, scope, &other, |_| None)
            .await
            .unwrap();

        let window = DayRange::from_period(new_task("w", 2, 1).first_day(), 1);
        assert_eq!(store.tasks_in_window(1, window, None).await.unwrap().len(), 2);
        assert_eq!(store.tasks_in_window(1, window, Some(2)).await.unwrap().len(), 1);
        assert!(store.tasks_in_window(2, window, None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_update_moves_ledger() {
        let store = store_with_field().await;
        let task = create(&store, &new_task("지주", 1, 3)).await;
        store
            .set_progress(&task.task_id, new_task("d", 3, 1).first_day(), ProgressStatus::Done)
            .await
            .unwrap();
        store
            .set_progress(&task.task_id, new_task("d", 1, 1).first_day(), ProgressStatus::Done)
            .await
            .unwrap();

        // Shift to 3..6: day 1 leaves the range, day 3 stays done.
        let patch = TaskPatch {
            start_date: Some(new_task("d", 3, 1).start_date),
            period: Some(4),
            ..TaskPatch::default()
        };
        let updated = store.update_task(&task.task_id, &patch).await.unwrap();
        assert_eq!(updated.completed_day_count, 1);

        let ledger = store.list_progress(&task.task_id).await.unwrap();
        let days: Vec<String> = ledger.iter().map(|p| day_str(p.date)).collect();
        assert_eq!(
            days,
            vec!["2025-06-03", "2025-06-04", "2025-06-05", "2025-06-06"]
        );
        assert_eq!(ledger[0].status, ProgressStatus::Done);
    }

    #[tokio::test]
    async fn test_seed_crosses_year_end() {
        let store = store_with_field().await;
        let kst = FixedOffset::east_opt(9 * 3600).unwrap();
        let new = NewTask {
            start_date: kst.with_ymd_and_hms(2024, 12, 30, 0, 0, 0).unwrap(),
            ..new_task("물주기", 1, 4)
        };
        let task = create(&store, &new).await;

        let ledger = store.list_progress(&task.task_id).await.unwrap();
        let days: Vec<String> = ledger.iter().map(|p| day_str(p.date)).collect();
        assert_eq!(
            days,
            vec!["2024-12-30", "2024-12-31", "2025-01-01", "2025-01-02"]
        );
    }

    #[tokio::test]
    async fn test_oversized_period_is_rejected() {
        let store = store_with_field().await;
        let too_long = new_task("물주기", 1, MAX_PERIOD_DAYS + 1);
        let err = store
            .create_task_checked(1, scope_for(&too_long), &too_long, |_| None)
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::InvalidScheduleInput(_)));
        assert!(store.list_tasks(1, None).await.unwrap().is_empty());

        let task = create(&store, &new_task("물주기", 1, 2)).await;
        let patch = TaskPatch {
            period: Some(50_000_000),
            ..TaskPatch::default()
        };
        let err = store.update_task(&task.task_id, &patch).await.unwrap_err();
        assert!(matches!(err, PlanError::InvalidScheduleInput(_)));
        assert_eq!(store.list_progress(&task.task_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_text_only_keeps_ledger() {
        let store = store_with_field().await;
        let task = create(&store, &new_task("관찰", 1, 2)).await;
        let patch = TaskPatch {
            task_content: Some("진딧물 방제".into()),
            ..TaskPatch::default()
        };
        let updated = store.update_task(&task.task_id, &patch).await.unwrap();
        assert!(updated.is_pest);
        assert_eq!(store.list_progress(&task.task_id).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_update_missing_task() {
        let store = store_with_field().await;
        let err = store
            .update_task("nope", &TaskPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, PlanError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_cascades_to_ledger() {
        let store = store_with_field().await;
        let task = create(&store, &new_task("물주기", 1, 3)).await;
        assert!(store.delete_task(&task.task_id).await.unwrap());
        assert!(!store.delete_task(&task.task_id).await.unwrap());

        let (rows,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM task_progress")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(rows, 0);
    }

    #[tokio::test]
    async fn test_task_names_starting_in() {
        let store = store_with_field().await;
        create(&store, &new_task("물주기", 1, 1)).await;
        create(&store, &new_task("수확", 9, 1)).await;
        let range = DayRange::new(new_task("a", 1, 1).first_day(), new_task("a", 7, 1).first_day())
            .unwrap();
        assert_eq!(store.task_names_starting_in(1, range).await.unwrap(), vec!["물주기"]);
    }
}
