use crate::types::EntityId;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: EntityId },

    #[error("Invalid destination: {0}")]
    InvalidDestination(String),

    #[error("No-op move: asset {asset_id} is already at {family} {target}")]
    NoOpMove {
        asset_id: EntityId,
        family: &'static str,
        target: EntityId,
    },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Persistence error: {0}")]
    Persistence(String),
}
