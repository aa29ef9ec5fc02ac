//! Field registry mirrored from the surrounding system.

use super::Store;
use chrono::NaiveDate;
use fieldplan_core::{error::PlanError, model::Field};

type FieldRow = (i64, i64, String, String, String, String, Option<String>);

fn field_from_row(row: FieldRow) -> Result<Field, PlanError> {
    let (id, owner_id, crop_name, address, start_date, description, geometry) = row;
    let start_date = NaiveDate::parse_from_str(&start_date, "%Y-%m-%d")
        .map_err(|e| PlanError::Store(format!("field {id}: bad start_date '{start_date}': {e}")))?;
    let geometry = geometry
        .map(|g| serde_json::from_str(&g))
        .transpose()
        .map_err(|e| PlanError::Store(format!("field {id}: bad geometry: {e}")))?;
    Ok(Field {
        id,
        owner_id,
        crop_name,
        address,
        start_date,
        description,
        geometry,
    })
}

impl Store {
    /// Insert or refresh a field.
    pub async fn upsert_field(&self, field: &Field) -> Result<(), PlanError> {
        let geometry = field
            .geometry
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| PlanError::Store(format!("serialize geometry: {e}")))?;

        sqlx::query(
            "INSERT INTO fields (id, owner_id, crop_name, address, start_date, description, geometry) \
             VALUES (?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT(id) DO UPDATE SET \
             owner_id = excluded.owner_id, crop_name = excluded.crop_name, \
             address = excluded.address, start_date = excluded.start_date, \
             description = excluded.description, geometry = excluded.geometry, \
             updated_at = datetime('now')",
        )
        .bind(field.id)
        .bind(field.owner_id)
        .bind(&field.crop_name)
        .bind(&field.address)
        .bind(field.start_date.format("%Y-%m-%d").to_string())
        .bind(&field.description)
        .bind(geometry)
        .execute(&self.pool)
        .await
        .map_err(|e| PlanError::Store(format!("upsert field failed: {e}")))?;

        Ok(())
    }

    pub async fn get_field(&self, field_id: i64) -> Result<Option<Field>, PlanError> {
        let row: Option<FieldRow> = sqlx::query_as(
            "SELECT id, owner_id, crop_name, address, start_date, description, geometry \
             FROM fields WHERE id = ?",
        )
        .bind(field_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PlanError::Store(format!("get field failed: {e}")))?;

        row.map(field_from_row).transpose()
    }

    /// Every field, for periodic planning runs.
    pub async fn list_fields(&self) -> Result<Vec<Field>, PlanError> {
        let rows: Vec<FieldRow> = sqlx::query_as(
            "SELECT id, owner_id, crop_name, address, start_date, description, geometry \
             FROM fields ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PlanError::Store(format!("list fields failed: {e}")))?;

        rows.into_iter().map(field_from_row).collect()
    }
}
