//! Asset, location and user rows read by the ledger.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use custody_core::movement::AssetState;
use custody_core::types::{EntityId, Timestamp};

// ---------------------------------------------------------------------------
// Entity structs (database rows)
// ---------------------------------------------------------------------------

/// A row from the `assets` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Asset {
    pub id: EntityId,
    pub tag: String,
    pub serial_number: Option<String>,
    pub current_location_id: Option<EntityId>,
    pub current_custodian_id: Option<EntityId>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Asset {
    pub fn state(&self) -> AssetState {
        AssetState {
            location_id: self.current_location_id,
            custodian_id: self.current_custodian_id,
        }
    }
}

/// A row from the `locations` or `users` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NamedEntity {
    pub id: EntityId,
    pub name: String,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

// ---------------------------------------------------------------------------
// Create DTOs
// ---------------------------------------------------------------------------

/// Input for registering an asset. New assets have no location or custodian.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateAsset {
    pub tag: String,
    pub serial_number: Option<String>,
}
