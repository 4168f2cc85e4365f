//! Transfer validation.
//!
//! [`MovementValidator`] is stateless: it reads the asset's current state and
//! referential existence through the collaborator traits and either approves
//! the transfer (deriving the "from" side) or rejects it with a typed error.

use async_trait::async_trait;

use crate::error::CoreError;
use crate::movement::{
    ApprovedTransfer, AssetState, Destination, ENTITY_ASSET, ENTITY_LOCATION, ENTITY_USER,
    FAMILY_CUSTODIAN, FAMILY_LOCATION,
};
use crate::types::{EntityId, Timestamp};

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

/// Read access to the asset's current custody state.
#[async_trait]
pub trait AssetStateProvider: Send + Sync {
    async fn asset_exists(&self, asset_id: EntityId) -> Result<bool, CoreError>;

    /// Current location and custodian. Unknown assets report an empty state.
    async fn current_state(&self, asset_id: EntityId) -> Result<AssetState, CoreError>;

    async fn current_location(&self, asset_id: EntityId) -> Result<Option<EntityId>, CoreError> {
        Ok(self.current_state(asset_id).await?.location_id)
    }

    async fn current_custodian(&self, asset_id: EntityId) -> Result<Option<EntityId>, CoreError> {
        Ok(self.current_state(asset_id).await?.custodian_id)
    }
}

/// Existence checks for the entity types a movement may reference.
#[async_trait]
pub trait ExistenceChecker: Send + Sync {
    async fn location_exists(&self, location_id: EntityId) -> Result<bool, CoreError>;
    async fn user_exists(&self, user_id: EntityId) -> Result<bool, CoreError>;
}

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A proposed transfer. There is no source side: it is always derived.
#[derive(Debug, Clone)]
pub struct TransferRequest {
    pub asset_id: EntityId,
    pub to_location_id: Option<EntityId>,
    pub to_custodian_id: Option<EntityId>,
    pub moved_by: EntityId,
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

pub struct MovementValidator<'a> {
    assets: &'a dyn AssetStateProvider,
    directory: &'a dyn ExistenceChecker,
}

impl<'a> MovementValidator<'a> {
    pub fn new(assets: &'a dyn AssetStateProvider, directory: &'a dyn ExistenceChecker) -> Self {
        Self { assets, directory }
    }

    /// Validate a transfer, stamping it with the current time on approval.
    pub async fn validate(&self, request: &TransferRequest) -> Result<ApprovedTransfer, CoreError> {
        self.validate_at(request, chrono::Utc::now()).await
    }

    /// Validate a transfer against the asset's state as of now.
    ///
    /// Checks run in a fixed order so the first failing rule is the one
    /// reported: asset existence, destination arity, destination existence,
    /// no-op detection, acting user existence.
    pub async fn validate_at(
        &self,
        request: &TransferRequest,
        moved_at: Timestamp,
    ) -> Result<ApprovedTransfer, CoreError> {
        if !self.assets.asset_exists(request.asset_id).await? {
            return Err(CoreError::NotFound {
                entity: ENTITY_ASSET,
                id: request.asset_id,
            });
        }

        let destination =
            Destination::from_parts(request.to_location_id, request.to_custodian_id)?;

        let current = self.assets.current_state(request.asset_id).await?;

        match destination {
            Destination::Location(location_id) => {
                ensure_location(self.directory, location_id).await?;
                if current.location_id == Some(location_id) {
                    return Err(CoreError::NoOpMove {
                        asset_id: request.asset_id,
                        family: FAMILY_LOCATION,
                        target: location_id,
                    });
                }
            }
            Destination::Custodian(user_id) => {
                ensure_user(self.directory, user_id).await?;
                if current.custodian_id == Some(user_id) {
                    return Err(CoreError::NoOpMove {
                        asset_id: request.asset_id,
                        family: FAMILY_CUSTODIAN,
                        target: user_id,
                    });
                }
            }
        }

        ensure_user(self.directory, request.moved_by).await?;

        Ok(ApprovedTransfer {
            asset_id: request.asset_id,
            from_location_id: current.location_id,
            from_custodian_id: current.custodian_id,
            destination,
            moved_by: request.moved_by,
            moved_at,
        })
    }
}

/// Arity and existence checks for a destination, without the no-op rule.
///
/// Used when amending an existing movement, where the asset has already left
/// the recorded source and comparing against current state is meaningless.
pub async fn check_destination(
    directory: &dyn ExistenceChecker,
    to_location_id: Option<EntityId>,
    to_custodian_id: Option<EntityId>,
) -> Result<Destination, CoreError> {
    let destination = Destination::from_parts(to_location_id, to_custodian_id)?;
    match destination {
        Destination::Location(id) => ensure_location(directory, id).await?,
        Destination::Custodian(id) => ensure_user(directory, id).await?,
    }
    Ok(destination)
}

async fn ensure_location(directory: &dyn ExistenceChecker, id: EntityId) -> Result<(), CoreError> {
    if directory.location_exists(id).await? {
        Ok(())
    } else {
        Err(CoreError::NotFound {
            entity: ENTITY_LOCATION,
            id,
        })
    }
}

async fn ensure_user(directory: &dyn ExistenceChecker, id: EntityId) -> Result<(), CoreError> {
    if directory.user_exists(id).await? {
        Ok(())
    } else {
        Err(CoreError::NotFound {
            entity: ENTITY_USER,
            id,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
