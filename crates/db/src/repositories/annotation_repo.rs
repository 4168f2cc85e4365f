//! Repository for the `movement_annotations` table.

use sqlx::{PgConnection, PgPool};
use custody_core::annotation::AnnotationInput;
use custody_core::types::EntityId;

use crate::models::movement::AnnotationRow;

/// Column list for `movement_annotations` queries.
const COLUMNS: &str = "id, movement_id, language, title, notes, created_at, updated_at";

/// Provides per-language annotation storage for movements.
pub struct AnnotationRepo;

impl AnnotationRepo {
    /// Insert one annotation. A second row for the same language violates
    /// `uq_movement_annotations_language`.
    pub async fn insert(
        conn: &mut PgConnection,
        movement_id: EntityId,
        input: &AnnotationInput,
    ) -> Result<AnnotationRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO movement_annotations (movement_id, language, title, notes) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AnnotationRow>(&query)
            .bind(movement_id)
            .bind(&input.language)
            .bind(input.title.as_deref())
            .bind(input.notes.as_deref())
            .fetch_one(&mut *conn)
            .await
    }

    /// Insert or replace the annotation for `input.language`.
    pub async fn upsert(
        conn: &mut PgConnection,
        movement_id: EntityId,
        input: &AnnotationInput,
    ) -> Result<AnnotationRow, sqlx::Error> {
        let query = format!(
            "INSERT INTO movement_annotations (movement_id, language, title, notes) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT ON CONSTRAINT uq_movement_annotations_language DO UPDATE SET \
                title = EXCLUDED.title, \
                notes = EXCLUDED.notes, \
                updated_at = NOW() \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, AnnotationRow>(&query)
            .bind(movement_id)
            .bind(&input.language)
            .bind(input.title.as_deref())
            .bind(input.notes.as_deref())
            .fetch_one(&mut *conn)
            .await
    }

    /// Annotations for a set of movements, oldest first within each movement.
    pub async fn list_for_movements(
        pool: &PgPool,
        movement_ids: &[EntityId],
    ) -> Result<Vec<AnnotationRow>, sqlx::Error> {
        if movement_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT {COLUMNS} FROM movement_annotations \
             WHERE movement_id = ANY($1) \
             ORDER BY movement_id, created_at, id"
        );
        sqlx::query_as::<_, AnnotationRow>(&query)
            .bind(movement_ids)
            .fetch_all(pool)
            .await
    }
}
