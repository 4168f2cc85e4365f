//! Repository for the `assets` table.
//!
//! The ledger only reads an asset's identity and custody state, and moves the
//! state forward with a compare-and-set when a movement is appended.

use sqlx::{PgConnection, PgPool};
use custody_core::movement::AssetState;
use custody_core::types::EntityId;

use crate::models::directory::{Asset, CreateAsset};

/// Column list for `assets` queries.
const COLUMNS: &str = "\
    id, tag, serial_number, current_location_id, current_custodian_id, \
    created_at, updated_at";

/// Provides asset lookups and custody state updates.
pub struct AssetRepo;

impl AssetRepo {
    pub async fn create(pool: &PgPool, input: &CreateAsset) -> Result<Asset, sqlx::Error> {
        let query = format!(
            "INSERT INTO assets (id, tag, serial_number) VALUES ($1, $2, $3) RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Asset>(&query)
            .bind(uuid::Uuid::now_v7())
            .bind(&input.tag)
            .bind(input.serial_number.as_deref())
            .fetch_one(pool)
            .await
    }

    pub async fn find_by_id(pool: &PgPool, id: EntityId) -> Result<Option<Asset>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM assets WHERE id = $1");
        sqlx::query_as::<_, Asset>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn exists(conn: &mut PgConnection, id: EntityId) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM assets WHERE id = $1)")
            .bind(id)
            .fetch_one(&mut *conn)
            .await
    }

    /// Move the asset to `next` only if its state still equals `expected`.
    ///
    /// Returns `false` when the asset is missing or its state has changed.
    pub async fn compare_and_set_state(
        conn: &mut PgConnection,
        id: EntityId,
        expected: AssetState,
        next: AssetState,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE assets SET \
                current_location_id = $2, \
                current_custodian_id = $3, \
                updated_at = NOW() \
             WHERE id = $1 \
               AND current_location_id IS NOT DISTINCT FROM $4 \
               AND current_custodian_id IS NOT DISTINCT FROM $5",
        )
        .bind(id)
        .bind(next.location_id)
        .bind(next.custodian_id)
        .bind(expected.location_id)
        .bind(expected.custodian_id)
        .execute(&mut *conn)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Unconditionally set the asset's custody state.
    pub async fn set_state(
        conn: &mut PgConnection,
        id: EntityId,
        state: AssetState,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE assets SET current_location_id = $2, current_custodian_id = $3, \
             updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(state.location_id)
        .bind(state.custodian_id)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }
}
