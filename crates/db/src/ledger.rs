//! Postgres implementations of the core ledger and collaborator traits.

use std::collections::HashMap;

use async_trait::async_trait;
use custody_core::annotation::{validate_annotations, AnnotationInput};
use custody_core::error::CoreError;
use custody_core::ledger::MovementLedger;
use custody_core::listing::{
    finish_cursor_page, CursorPage, CursorRequest, MovementQuery, Page, PageRequest,
};
use custody_core::movement::{
    ApprovedTransfer, AssetState, Destination, MovementAnnotation, MovementEntry, MovementLabels,
    MovementRecord, ENTITY_ASSET, ENTITY_MOVEMENT,
};
use custody_core::types::{new_movement_id, EntityId};
use custody_core::validator::{AssetStateProvider, ExistenceChecker};

use crate::error::map_db_error;
use crate::models::movement::{AnnotationRow, MovementRow};
use crate::repositories::{AnnotationRepo, AssetRepo, LocationRepo, MovementRepo, UserRepo};
use crate::DbPool;

// ---------------------------------------------------------------------------
// Row conversion
// ---------------------------------------------------------------------------

fn to_annotation(row: AnnotationRow) -> MovementAnnotation {
    MovementAnnotation {
        movement_id: row.movement_id,
        language: row.language,
        title: row.title,
        notes: row.notes,
        created_at: row.created_at,
        updated_at: row.updated_at,
    }
}

fn to_entry(row: MovementRow, annotations: Vec<MovementAnnotation>) -> Result<MovementEntry, CoreError> {
    // The table's check constraint guarantees exactly one destination column.
    let destination = Destination::from_parts(row.to_location_id, row.to_custodian_id)
        .map_err(|e| CoreError::Persistence(format!("Corrupt movement {}: {e}", row.id)))?;

    Ok(MovementEntry {
        record: MovementRecord {
            id: row.id,
            asset_id: row.asset_id,
            from_location_id: row.from_location_id,
            from_custodian_id: row.from_custodian_id,
            destination,
            moved_by: row.moved_by,
            moved_at: row.moved_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        },
        labels: MovementLabels {
            asset_tag: row.asset_tag,
            asset_serial: row.asset_serial,
            from_location_name: row.from_location_name,
            from_custodian_name: row.from_custodian_name,
            to_location_name: row.to_location_name,
            to_custodian_name: row.to_custodian_name,
            moved_by_name: row.moved_by_name,
        },
        annotations,
    })
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

/// Movement ledger backed by the `movements` and `movement_annotations` tables.
#[derive(Debug, Clone)]
pub struct PgMovementLedger {
    pool: DbPool,
}

impl PgMovementLedger {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Attach annotations to a batch of rows with one extra query.
    async fn hydrate(&self, rows: Vec<MovementRow>) -> Result<Vec<MovementEntry>, CoreError> {
        let ids: Vec<EntityId> = rows.iter().map(|r| r.id).collect();
        let mut by_movement: HashMap<EntityId, Vec<MovementAnnotation>> = HashMap::new();
        for row in AnnotationRepo::list_for_movements(&self.pool, &ids)
            .await
            .map_err(map_db_error)?
        {
            by_movement
                .entry(row.movement_id)
                .or_default()
                .push(to_annotation(row));
        }

        rows.into_iter()
            .map(|row| {
                let annotations = by_movement.remove(&row.id).unwrap_or_default();
                to_entry(row, annotations)
            })
            .collect()
    }

    async fn fetch_entry(&self, id: EntityId) -> Result<MovementEntry, CoreError> {
        self.get_by_id(id).await?.ok_or(CoreError::NotFound {
            entity: ENTITY_MOVEMENT,
            id,
        })
    }
}

#[async_trait]
impl MovementLedger for PgMovementLedger {
    async fn append(
        &self,
        transfer: ApprovedTransfer,
        annotations: &[AnnotationInput],
    ) -> Result<MovementEntry, CoreError> {
        validate_annotations(annotations)?;

        let now = chrono::Utc::now();
        let id = new_movement_id();
        let expected = transfer.expected_state();
        let next = transfer.destination.resulting_state();
        let record = transfer.into_record(id, now);

        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let moved = AssetRepo::compare_and_set_state(&mut tx, record.asset_id, expected, next)
            .await
            .map_err(map_db_error)?;
        if !moved {
            let exists = AssetRepo::exists(&mut tx, record.asset_id)
                .await
                .map_err(map_db_error)?;
            return Err(if exists {
                CoreError::Conflict(format!(
                    "Asset {} changed custody since the transfer was validated",
                    record.asset_id
                ))
            } else {
                CoreError::NotFound {
                    entity: ENTITY_ASSET,
                    id: record.asset_id,
                }
            });
        }

        MovementRepo::insert(&mut tx, &record)
            .await
            .map_err(map_db_error)?;
        for input in annotations {
            AnnotationRepo::insert(&mut tx, id, input)
                .await
                .map_err(map_db_error)?;
        }

        tx.commit().await.map_err(map_db_error)?;
        self.fetch_entry(id).await
    }

    async fn amend_destination(
        &self,
        movement_id: EntityId,
        destination: Option<Destination>,
        annotations: &[AnnotationInput],
    ) -> Result<MovementEntry, CoreError> {
        validate_annotations(annotations)?;

        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let row = MovementRepo::find_for_update(&mut tx, movement_id)
            .await
            .map_err(map_db_error)?
            .ok_or(CoreError::NotFound {
                entity: ENTITY_MOVEMENT,
                id: movement_id,
            })?;

        match destination {
            Some(destination) => {
                MovementRepo::update_destination(&mut tx, movement_id, &destination)
                    .await
                    .map_err(map_db_error)?;
                let latest =
                    MovementRepo::is_latest_for_asset(&mut tx, row.asset_id, row.moved_at, row.id)
                        .await
                        .map_err(map_db_error)?;
                if latest {
                    AssetRepo::set_state(&mut tx, row.asset_id, destination.resulting_state())
                        .await
                        .map_err(map_db_error)?;
                }
            }
            None => {
                MovementRepo::touch(&mut tx, movement_id)
                    .await
                    .map_err(map_db_error)?;
            }
        }

        for input in annotations {
            AnnotationRepo::upsert(&mut tx, movement_id, input)
                .await
                .map_err(map_db_error)?;
        }

        tx.commit().await.map_err(map_db_error)?;
        self.fetch_entry(movement_id).await
    }

    async fn remove(&self, movement_id: EntityId) -> Result<(), CoreError> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;
        let deleted = MovementRepo::delete(&mut tx, movement_id)
            .await
            .map_err(map_db_error)?;
        if !deleted {
            return Err(CoreError::NotFound {
                entity: ENTITY_MOVEMENT,
                id: movement_id,
            });
        }
        tx.commit().await.map_err(map_db_error)
    }

    async fn get_by_id(&self, movement_id: EntityId) -> Result<Option<MovementEntry>, CoreError> {
        let row = MovementRepo::find_by_id(&self.pool, movement_id)
            .await
            .map_err(map_db_error)?;
        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn list(&self, query: &MovementQuery) -> Result<Vec<MovementEntry>, CoreError> {
        let rows = MovementRepo::list(&self.pool, query, None)
            .await
            .map_err(map_db_error)?;
        self.hydrate(rows).await
    }

    async fn list_paginated(
        &self,
        query: &MovementQuery,
        page: PageRequest,
    ) -> Result<Page<MovementEntry>, CoreError> {
        let total = MovementRepo::count(&self.pool, query)
            .await
            .map_err(map_db_error)?;
        let rows = MovementRepo::list(&self.pool, query, Some((page.limit, page.offset)))
            .await
            .map_err(map_db_error)?;
        Ok(Page {
            items: self.hydrate(rows).await?,
            total,
            limit: page.limit,
            offset: page.offset,
        })
    }

    async fn list_by_cursor(
        &self,
        query: &MovementQuery,
        cursor: CursorRequest,
    ) -> Result<CursorPage<MovementEntry>, CoreError> {
        let boundary = match cursor.cursor.boundary() {
            Some(id) => Some(
                MovementRepo::find_cursor_key(&self.pool, id)
                    .await
                    .map_err(map_db_error)?
                    .ok_or(CoreError::NotFound {
                        entity: ENTITY_MOVEMENT,
                        id,
                    })?,
            ),
            None => None,
        };

        let rows = MovementRepo::list_keyset(
            &self.pool,
            query,
            cursor.cursor,
            boundary,
            cursor.limit + 1,
        )
        .await
        .map_err(map_db_error)?;

        let entries = self.hydrate(rows).await?;
        Ok(finish_cursor_page(entries, &cursor, |e| e.record.id))
    }

    async fn count(&self, query: &MovementQuery) -> Result<i64, CoreError> {
        MovementRepo::count(&self.pool, query)
            .await
            .map_err(map_db_error)
    }

    async fn scan(&self) -> Result<Vec<MovementEntry>, CoreError> {
        let rows = MovementRepo::scan(&self.pool).await.map_err(map_db_error)?;
        self.hydrate(rows).await
    }
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

/// Asset state and existence lookups against the directory tables.
#[derive(Debug, Clone)]
pub struct PgDirectory {
    pool: DbPool,
}

impl PgDirectory {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AssetStateProvider for PgDirectory {
    async fn asset_exists(&self, asset_id: EntityId) -> Result<bool, CoreError> {
        Ok(AssetRepo::find_by_id(&self.pool, asset_id)
            .await
            .map_err(map_db_error)?
            .is_some())
    }

    async fn current_state(&self, asset_id: EntityId) -> Result<AssetState, CoreError> {
        Ok(AssetRepo::find_by_id(&self.pool, asset_id)
            .await
            .map_err(map_db_error)?
            .map(|asset| asset.state())
            .unwrap_or_default())
    }
}

#[async_trait]
impl ExistenceChecker for PgDirectory {
    async fn location_exists(&self, location_id: EntityId) -> Result<bool, CoreError> {
        LocationRepo::exists(&self.pool, location_id)
            .await
            .map_err(map_db_error)
    }

    async fn user_exists(&self, user_id: EntityId) -> Result<bool, CoreError> {
        UserRepo::exists(&self.pool, user_id)
            .await
            .map_err(map_db_error)
    }
}
