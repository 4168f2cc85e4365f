/// All entity identifiers are UUIDs. Movement ids are v7 (time-ordered).
pub type EntityId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Generate a new time-sortable identifier for a ledger row.
pub fn new_movement_id() -> EntityId {
    uuid::Uuid::now_v7()
}
