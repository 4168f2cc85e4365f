//! Movement domain types.
//!
//! A movement is an immutable fact: asset X left its previous location or
//! custodian and arrived at exactly one new destination. The "from" side is
//! always derived from the asset's state at validation time, never supplied
//! by the caller.

use serde::ser::SerializeStruct;
use serde::{Serialize, Serializer};

use crate::error::CoreError;
use crate::types::{EntityId, Timestamp};

// ---------------------------------------------------------------------------
// Entity names (used in `CoreError::NotFound`)
// ---------------------------------------------------------------------------

pub const ENTITY_ASSET: &str = "Asset";
pub const ENTITY_LOCATION: &str = "Location";
pub const ENTITY_USER: &str = "User";
pub const ENTITY_MOVEMENT: &str = "Movement";

// ---------------------------------------------------------------------------
// Destination
// ---------------------------------------------------------------------------

/// Family label used in messages and summaries for storage locations.
pub const FAMILY_LOCATION: &str = "location";

/// Family label used in messages and summaries for custodians (users).
pub const FAMILY_CUSTODIAN: &str = "custodian";

/// Where an asset is being moved to. Exactly one family, enforced by the type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Destination {
    Location(EntityId),
    Custodian(EntityId),
}

impl Destination {
    /// Build a destination from the two nullable wire fields.
    ///
    /// Exactly one of the two must be present; neither or both is rejected.
    pub fn from_parts(
        to_location_id: Option<EntityId>,
        to_custodian_id: Option<EntityId>,
    ) -> Result<Self, CoreError> {
        match (to_location_id, to_custodian_id) {
            (Some(location), None) => Ok(Destination::Location(location)),
            (None, Some(custodian)) => Ok(Destination::Custodian(custodian)),
            (None, None) => Err(CoreError::InvalidDestination(
                "either to_location_id or to_custodian_id is required".into(),
            )),
            (Some(_), Some(_)) => Err(CoreError::InvalidDestination(
                "to_location_id and to_custodian_id are mutually exclusive".into(),
            )),
        }
    }

    pub fn location_id(&self) -> Option<EntityId> {
        match self {
            Destination::Location(id) => Some(*id),
            Destination::Custodian(_) => None,
        }
    }

    pub fn custodian_id(&self) -> Option<EntityId> {
        match self {
            Destination::Custodian(id) => Some(*id),
            Destination::Location(_) => None,
        }
    }

    pub fn family(&self) -> &'static str {
        match self {
            Destination::Location(_) => FAMILY_LOCATION,
            Destination::Custodian(_) => FAMILY_CUSTODIAN,
        }
    }

    pub fn target(&self) -> EntityId {
        match self {
            Destination::Location(id) | Destination::Custodian(id) => *id,
        }
    }

    /// The asset state that results from arriving at this destination.
    ///
    /// Arriving at a location clears the custodian and vice versa.
    pub fn resulting_state(&self) -> AssetState {
        AssetState {
            location_id: self.location_id(),
            custodian_id: self.custodian_id(),
        }
    }
}

/// Serialized as the flat `to_location_id` / `to_custodian_id` pair so API
/// clients see the same shape regardless of family.
impl Serialize for Destination {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Destination", 2)?;
        s.serialize_field("to_location_id", &self.location_id())?;
        s.serialize_field("to_custodian_id", &self.custodian_id())?;
        s.end()
    }
}

// ---------------------------------------------------------------------------
// Asset state
// ---------------------------------------------------------------------------

/// Current custody state of an asset, as reported by the state provider.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AssetState {
    pub location_id: Option<EntityId>,
    pub custodian_id: Option<EntityId>,
}

// ---------------------------------------------------------------------------
// Approved transfer
// ---------------------------------------------------------------------------

/// A transfer that passed validation and is ready to be appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovedTransfer {
    pub asset_id: EntityId,
    pub from_location_id: Option<EntityId>,
    pub from_custodian_id: Option<EntityId>,
    pub destination: Destination,
    pub moved_by: EntityId,
    pub moved_at: Timestamp,
}

impl ApprovedTransfer {
    /// The asset state observed when this transfer was approved.
    pub fn expected_state(&self) -> AssetState {
        AssetState {
            location_id: self.from_location_id,
            custodian_id: self.from_custodian_id,
        }
    }

    /// Materialize the ledger record for this transfer.
    pub fn into_record(self, id: EntityId, now: Timestamp) -> MovementRecord {
        MovementRecord {
            id,
            asset_id: self.asset_id,
            from_location_id: self.from_location_id,
            from_custodian_id: self.from_custodian_id,
            destination: self.destination,
            moved_by: self.moved_by,
            moved_at: self.moved_at,
            created_at: now,
            updated_at: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Movement kind
// ---------------------------------------------------------------------------

/// Classification of a movement by which source/destination fields are set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    LocationToLocation,
    LocationToCustodian,
    CustodianToLocation,
    CustodianToCustodian,
    NewAsset,
}

impl MovementKind {
    /// Classify from the populated fields.
    ///
    /// A custodian source wins over a location source when both are present.
    pub fn classify(
        from_location_id: Option<EntityId>,
        from_custodian_id: Option<EntityId>,
        destination: &Destination,
    ) -> Self {
        match (from_custodian_id, from_location_id, destination) {
            (Some(_), _, Destination::Location(_)) => MovementKind::CustodianToLocation,
            (Some(_), _, Destination::Custodian(_)) => MovementKind::CustodianToCustodian,
            (None, Some(_), Destination::Location(_)) => MovementKind::LocationToLocation,
            (None, Some(_), Destination::Custodian(_)) => MovementKind::LocationToCustodian,
            (None, None, _) => MovementKind::NewAsset,
        }
    }
}

// ---------------------------------------------------------------------------
// Ledger rows
// ---------------------------------------------------------------------------

/// A persisted movement. Core transfer fields never change after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovementRecord {
    pub id: EntityId,
    pub asset_id: EntityId,
    pub from_location_id: Option<EntityId>,
    pub from_custodian_id: Option<EntityId>,
    #[serde(flatten)]
    pub destination: Destination,
    pub moved_by: EntityId,
    pub moved_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl MovementRecord {
    pub fn kind(&self) -> MovementKind {
        MovementKind::classify(
            self.from_location_id,
            self.from_custodian_id,
            &self.destination,
        )
    }
}

/// Per-language free-text note attached to a movement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovementAnnotation {
    pub movement_id: EntityId,
    pub language: String,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Display names resolved for a movement's referenced entities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MovementLabels {
    pub asset_tag: String,
    pub asset_serial: Option<String>,
    pub from_location_name: Option<String>,
    pub from_custodian_name: Option<String>,
    pub to_location_name: Option<String>,
    pub to_custodian_name: Option<String>,
    pub moved_by_name: Option<String>,
}

/// Read model: a record together with its annotations and display labels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovementEntry {
    pub record: MovementRecord,
    pub labels: MovementLabels,
    /// Ordered by creation time.
    pub annotations: Vec<MovementAnnotation>,
}

impl MovementEntry {
    /// One-line human-readable description, e.g.
    /// `"LAPTOP-7 moved from location Warehouse A to custodian Jane Doe"`.
    pub fn summary(&self) -> String {
        let r = &self.record;
        let source = match (r.from_custodian_id, r.from_location_id) {
            (Some(id), _) => format!(
                "{FAMILY_CUSTODIAN} {}",
                label_or_id(&self.labels.from_custodian_name, id)
            ),
            (None, Some(id)) => format!(
                "{FAMILY_LOCATION} {}",
                label_or_id(&self.labels.from_location_name, id)
            ),
            (None, None) => "intake".to_string(),
        };
        let target = match r.destination {
            Destination::Location(id) => format!(
                "{FAMILY_LOCATION} {}",
                label_or_id(&self.labels.to_location_name, id)
            ),
            Destination::Custodian(id) => format!(
                "{FAMILY_CUSTODIAN} {}",
                label_or_id(&self.labels.to_custodian_name, id)
            ),
        };
        format!("{} moved from {source} to {target}", self.labels.asset_tag)
    }
}

fn label_or_id(label: &Option<String>, id: EntityId) -> String {
    label.clone().unwrap_or_else(|| id.to_string())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
