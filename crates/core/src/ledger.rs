//! The movement ledger contract.
//!
//! A ledger is an append-only store of [`MovementRecord`]s and their
//! per-language annotations. Core transfer fields are never rewritten; only
//! annotations and, through [`MovementLedger::amend_destination`], the
//! destination may change. Every mutating call is all-or-nothing.
//!
//! [`MovementRecord`]: crate::movement::MovementRecord

use async_trait::async_trait;
use serde::Deserialize;

use crate::annotation::AnnotationInput;
use crate::error::CoreError;
use crate::listing::{CursorPage, CursorRequest, MovementQuery, Page, PageRequest};
use crate::movement::{ApprovedTransfer, Destination, MovementEntry};
use crate::types::EntityId;

/// Payload for correcting an existing movement.
///
/// Destination fields follow the creation arity rule when present. When both
/// are absent only the annotations are touched.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AmendMovement {
    pub to_location_id: Option<EntityId>,
    pub to_custodian_id: Option<EntityId>,
    #[serde(default)]
    pub annotations: Vec<AnnotationInput>,
}

impl AmendMovement {
    pub fn touches_destination(&self) -> bool {
        self.to_location_id.is_some() || self.to_custodian_id.is_some()
    }
}

#[async_trait]
pub trait MovementLedger: Send + Sync {
    /// Persist an approved transfer and its annotations as one unit.
    ///
    /// Also moves the asset's current state to the destination, provided the
    /// state still equals the transfer's recorded source. A stale source is a
    /// [`CoreError::Conflict`] and nothing is written.
    async fn append(
        &self,
        transfer: ApprovedTransfer,
        annotations: &[AnnotationInput],
    ) -> Result<MovementEntry, CoreError>;

    /// Replace the destination (if `Some`) and upsert annotations by language.
    ///
    /// Source fields are never re-derived. When the movement is the asset's
    /// most recent one, the asset's current state follows the new
    /// destination; older movements only change in the audit trail.
    async fn amend_destination(
        &self,
        movement_id: EntityId,
        destination: Option<Destination>,
        annotations: &[AnnotationInput],
    ) -> Result<MovementEntry, CoreError>;

    /// Delete a movement and all of its annotations.
    async fn remove(&self, movement_id: EntityId) -> Result<(), CoreError>;

    async fn get_by_id(&self, movement_id: EntityId) -> Result<Option<MovementEntry>, CoreError>;

    /// All matching movements, unpaginated.
    async fn list(&self, query: &MovementQuery) -> Result<Vec<MovementEntry>, CoreError>;

    async fn list_paginated(
        &self,
        query: &MovementQuery,
        page: PageRequest,
    ) -> Result<Page<MovementEntry>, CoreError>;

    /// Keyset pagination on `(moved_at, id)`; the query's sort is ignored.
    ///
    /// An unknown boundary id is [`CoreError::NotFound`].
    async fn list_by_cursor(
        &self,
        query: &MovementQuery,
        cursor: CursorRequest,
    ) -> Result<CursorPage<MovementEntry>, CoreError>;

    async fn count(&self, query: &MovementQuery) -> Result<i64, CoreError>;

    /// Full snapshot for statistics.
    async fn scan(&self) -> Result<Vec<MovementEntry>, CoreError>;

    async fn list_by_asset(
        &self,
        asset_id: EntityId,
        query: &MovementQuery,
    ) -> Result<Vec<MovementEntry>, CoreError> {
        let mut scoped = query.clone();
        scoped.filter.asset_id = Some(asset_id);
        self.list(&scoped).await
    }
}
