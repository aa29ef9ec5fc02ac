//! Monthly planning keywords per field.

use super::Store;
use fieldplan_core::{error::PlanError, model::MonthlyKeywords};

impl Store {
    pub async fn get_keywords(
        &self,
        field_id: i64,
        year: i32,
        month: u32,
    ) -> Result<Option<MonthlyKeywords>, PlanError> {
        let row: Option<(String,)> = sqlx::query_as(
            "SELECT keywords_json FROM monthly_keywords WHERE field_id = ? AND year = ? AND month = ?",
        )
        .bind(field_id)
        .bind(year)
        .bind(month)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PlanError::Store(format!("get keywords failed: {e}")))?;

        row.map(|(json,)| {
            let keywords: Vec<String> = serde_json::from_str(&json)
                .map_err(|e| PlanError::Store(format!("bad keywords json: {e}")))?;
            Ok(MonthlyKeywords {
                field_id,
                year,
                month,
                keywords,
            })
        })
        .transpose()
    }

    /// Replace the keyword list for a month.
    pub async fn put_keywords(&self, entry: &MonthlyKeywords) -> Result<(), PlanError> {
        let json = serde_json::to_string(&entry.keywords)
            .map_err(|e| PlanError::Store(format!("serialize keywords: {e}")))?;

        sqlx::query(
            "INSERT INTO monthly_keywords (field_id, year, month, keywords_json) VALUES (?, ?, ?, ?) \
             ON CONFLICT(field_id, year, month) DO UPDATE SET \
             keywords_json = excluded.keywords_json, updated_at = datetime('now')",
        )
        .bind(entry.field_id)
        .bind(entry.year)
        .bind(entry.month)
        .bind(json)
        .execute(&self.pool)
        .await
        .map_err(|e| PlanError::Store(format!("put keywords failed: {e}")))?;
        Ok(())
    }

    /// Returns false when nothing was stored for that month.
    pub async fn delete_keywords(
        &self,
        field_id: i64,
        year: i32,
        month: u32,
    ) -> Result<bool, PlanError> {
        let result =
            sqlx::query("DELETE FROM monthly_keywords WHERE field_id = ? AND year = ? AND month = ?")
                .bind(field_id)
                .bind(year)
                .bind(month)
                .execute(&self.pool)
                .await
                .map_err(|e| PlanError::Store(format!("delete keywords failed: {e}")))?;
        Ok(result.rows_affected() > 0)
    }
}
