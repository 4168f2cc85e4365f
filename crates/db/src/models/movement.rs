//! Movement and annotation rows.

use serde::Serialize;
use sqlx::FromRow;
use custody_core::types::{EntityId, Timestamp};

/// A row from `movements` joined with the display names of everything it
/// references.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct MovementRow {
    pub id: EntityId,
    pub asset_id: EntityId,
    pub from_location_id: Option<EntityId>,
    pub from_custodian_id: Option<EntityId>,
    pub to_location_id: Option<EntityId>,
    pub to_custodian_id: Option<EntityId>,
    pub moved_by: EntityId,
    pub moved_at: Timestamp,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
    pub asset_tag: String,
    pub asset_serial: Option<String>,
    pub from_location_name: Option<String>,
    pub from_custodian_name: Option<String>,
    pub to_location_name: Option<String>,
    pub to_custodian_name: Option<String>,
    pub moved_by_name: Option<String>,
}

/// A row from the `movement_annotations` table.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct AnnotationRow {
    pub id: i64,
    pub movement_id: EntityId,
    pub language: String,
    pub title: Option<String>,
    pub notes: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
