//! Write-side orchestration: lock, validate, append.

use std::sync::Arc;

use crate::annotation::{validate_annotations, AnnotationInput};
use crate::error::CoreError;
use crate::ledger::{AmendMovement, MovementLedger};
use crate::locks::AssetLocks;
use crate::listing::MovementQuery;
use crate::movement::{MovementEntry, ENTITY_ASSET, ENTITY_MOVEMENT};
use crate::types::EntityId;
use crate::validator::{
    check_destination, AssetStateProvider, ExistenceChecker, MovementValidator, TransferRequest,
};

/// Runs every mutating ledger operation for one request.
///
/// Transfers for the same asset are serialized through [`AssetLocks`] so the
/// derived "from" state cannot be observed twice by concurrent requests.
#[derive(Clone)]
pub struct TransferService {
    ledger: Arc<dyn MovementLedger>,
    assets: Arc<dyn AssetStateProvider>,
    directory: Arc<dyn ExistenceChecker>,
    locks: AssetLocks,
}

impl TransferService {
    pub fn new(
        ledger: Arc<dyn MovementLedger>,
        assets: Arc<dyn AssetStateProvider>,
        directory: Arc<dyn ExistenceChecker>,
    ) -> Self {
        Self {
            ledger,
            assets,
            directory,
            locks: AssetLocks::new(),
        }
    }

    pub fn ledger(&self) -> &dyn MovementLedger {
        self.ledger.as_ref()
    }

    /// Validate a transfer and append it with its annotations.
    pub async fn transfer(
        &self,
        request: TransferRequest,
        annotations: &[AnnotationInput],
    ) -> Result<MovementEntry, CoreError> {
        validate_annotations(annotations)?;

        let _guard = self.locks.acquire(request.asset_id).await;

        let validator = MovementValidator::new(self.assets.as_ref(), self.directory.as_ref());
        let approved = match validator.validate(&request).await {
            Ok(approved) => approved,
            Err(e) => {
                tracing::warn!(
                    asset_id = %request.asset_id,
                    moved_by = %request.moved_by,
                    error = %e,
                    "Transfer rejected"
                );
                return Err(e);
            }
        };

        let entry = self.ledger.append(approved, annotations).await?;

        tracing::info!(
            movement_id = %entry.record.id,
            asset_id = %entry.record.asset_id,
            kind = ?entry.record.kind(),
            moved_by = %entry.record.moved_by,
            "Movement recorded"
        );

        Ok(entry)
    }

    /// Correct a movement's destination and/or annotations.
    pub async fn amend(
        &self,
        movement_id: EntityId,
        amendment: &AmendMovement,
    ) -> Result<MovementEntry, CoreError> {
        validate_annotations(&amendment.annotations)?;

        let existing = self
            .ledger
            .get_by_id(movement_id)
            .await?
            .ok_or(CoreError::NotFound {
                entity: ENTITY_MOVEMENT,
                id: movement_id,
            })?;

        let destination = if amendment.touches_destination() {
            Some(
                check_destination(
                    self.directory.as_ref(),
                    amendment.to_location_id,
                    amendment.to_custodian_id,
                )
                .await?,
            )
        } else {
            None
        };

        let _guard = self.locks.acquire(existing.record.asset_id).await;
        let entry = self
            .ledger
            .amend_destination(movement_id, destination, &amendment.annotations)
            .await?;

        tracing::info!(
            movement_id = %movement_id,
            destination_changed = destination.is_some(),
            annotations = amendment.annotations.len(),
            "Movement amended"
        );

        Ok(entry)
    }

    /// Movement history of one asset under `query`. Unknown assets are
    /// [`CoreError::NotFound`].
    pub async fn history(
        &self,
        asset_id: EntityId,
        query: &MovementQuery,
    ) -> Result<Vec<MovementEntry>, CoreError> {
        if !self.assets.asset_exists(asset_id).await? {
            return Err(CoreError::NotFound {
                entity: ENTITY_ASSET,
                id: asset_id,
            });
        }
        self.ledger.list_by_asset(asset_id, query).await
    }

    /// Administrative delete of a movement and its annotations.
    pub async fn remove(&self, movement_id: EntityId) -> Result<(), CoreError> {
        self.ledger.remove(movement_id).await?;
        tracing::info!(movement_id = %movement_id, "Movement deleted");
        Ok(())
    }
}
