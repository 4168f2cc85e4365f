//! Process-local backend implementing the ledger and collaborator traits.
//!
//! Used for local development (`LEDGER_BACKEND=memory`) and tests. Every
//! mutation takes the single write lock, performs all checks first and only
//! then applies changes, so a failing call leaves nothing behind.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::annotation::{validate_annotations, AnnotationInput};
use crate::error::CoreError;
use crate::ledger::MovementLedger;
use crate::listing::{
    cursor_key, finish_cursor_page, Cursor, CursorPage, CursorRequest, MovementQuery, Page,
    PageRequest,
};
use crate::movement::{
    ApprovedTransfer, AssetState, Destination, MovementAnnotation, MovementEntry, MovementLabels,
    MovementRecord, ENTITY_ASSET, ENTITY_MOVEMENT,
};
use crate::types::{new_movement_id, EntityId, Timestamp};
use crate::validator::{AssetStateProvider, ExistenceChecker};

/// An asset as known to the in-memory directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetInfo {
    pub id: EntityId,
    pub tag: String,
    pub serial_number: Option<String>,
    pub state: AssetState,
}

#[derive(Debug, Default)]
struct Inner {
    assets: HashMap<EntityId, AssetInfo>,
    locations: HashMap<EntityId, String>,
    users: HashMap<EntityId, String>,
    /// Keyed by v7 id, so iteration is creation order.
    movements: BTreeMap<EntityId, MovementRecord>,
    annotations: HashMap<EntityId, Vec<MovementAnnotation>>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    // -- directory seeding ---------------------------------------------------

    pub async fn add_asset(&self, tag: &str, serial_number: Option<&str>) -> EntityId {
        let id = uuid::Uuid::now_v7();
        self.inner.write().await.assets.insert(
            id,
            AssetInfo {
                id,
                tag: tag.to_string(),
                serial_number: serial_number.map(str::to_string),
                state: AssetState::default(),
            },
        );
        id
    }

    pub async fn add_location(&self, name: &str) -> EntityId {
        let id = uuid::Uuid::now_v7();
        self.inner.write().await.locations.insert(id, name.to_string());
        id
    }

    pub async fn add_user(&self, name: &str) -> EntityId {
        let id = uuid::Uuid::now_v7();
        self.inner.write().await.users.insert(id, name.to_string());
        id
    }

    pub async fn asset(&self, id: EntityId) -> Option<AssetInfo> {
        self.inner.read().await.assets.get(&id).cloned()
    }
}

impl Inner {
    fn labels(&self, record: &MovementRecord) -> MovementLabels {
        let location = |id: Option<EntityId>| id.and_then(|id| self.locations.get(&id).cloned());
        let user = |id: Option<EntityId>| id.and_then(|id| self.users.get(&id).cloned());
        let asset = self.assets.get(&record.asset_id);

        MovementLabels {
            asset_tag: asset
                .map(|a| a.tag.clone())
                .unwrap_or_else(|| record.asset_id.to_string()),
            asset_serial: asset.and_then(|a| a.serial_number.clone()),
            from_location_name: location(record.from_location_id),
            from_custodian_name: user(record.from_custodian_id),
            to_location_name: location(record.destination.location_id()),
            to_custodian_name: user(record.destination.custodian_id()),
            moved_by_name: user(Some(record.moved_by)),
        }
    }

    fn entry(&self, record: &MovementRecord) -> MovementEntry {
        MovementEntry {
            record: record.clone(),
            labels: self.labels(record),
            annotations: self.annotations.get(&record.id).cloned().unwrap_or_default(),
        }
    }

    fn matching(&self, query: &MovementQuery) -> Vec<MovementEntry> {
        self.movements
            .values()
            .map(|r| self.entry(r))
            .filter(|e| query.matches(e))
            .collect()
    }

    fn sorted(&self, query: &MovementQuery) -> Vec<MovementEntry> {
        let mut rows = self.matching(query);
        rows.sort_by(|a, b| query.sort.compare(a, b));
        rows
    }

    fn is_latest_for_asset(&self, record: &MovementRecord) -> bool {
        let key = cursor_key(record);
        !self
            .movements
            .values()
            .any(|other| other.asset_id == record.asset_id && cursor_key(other) > key)
    }
}

fn new_annotation(movement_id: EntityId, input: &AnnotationInput, now: Timestamp) -> MovementAnnotation {
    MovementAnnotation {
        movement_id,
        language: input.language.clone(),
        title: input.title.clone(),
        notes: input.notes.clone(),
        created_at: now,
        updated_at: now,
    }
}

// ---------------------------------------------------------------------------
// Collaborator traits
// ---------------------------------------------------------------------------

#[async_trait]
impl AssetStateProvider for MemoryStore {
    async fn asset_exists(&self, asset_id: EntityId) -> Result<bool, CoreError> {
        Ok(self.inner.read().await.assets.contains_key(&asset_id))
    }

    async fn current_state(&self, asset_id: EntityId) -> Result<AssetState, CoreError> {
        Ok(self
            .inner
            .read()
            .await
            .assets
            .get(&asset_id)
            .map(|a| a.state)
            .unwrap_or_default())
    }
}

#[async_trait]
impl ExistenceChecker for MemoryStore {
    async fn location_exists(&self, location_id: EntityId) -> Result<bool, CoreError> {
        Ok(self.inner.read().await.locations.contains_key(&location_id))
    }

    async fn user_exists(&self, user_id: EntityId) -> Result<bool, CoreError> {
        Ok(self.inner.read().await.users.contains_key(&user_id))
    }
}

// ---------------------------------------------------------------------------
// Ledger
// ---------------------------------------------------------------------------

#[async_trait]
impl MovementLedger for MemoryStore {
    async fn append(
        &self,
        transfer: ApprovedTransfer,
        annotations: &[AnnotationInput],
    ) -> Result<MovementEntry, CoreError> {
        let mut inner = self.inner.write().await;
        validate_annotations(annotations)?;

        let asset = inner
            .assets
            .get(&transfer.asset_id)
            .ok_or(CoreError::NotFound {
                entity: ENTITY_ASSET,
                id: transfer.asset_id,
            })?;
        if asset.state != transfer.expected_state() {
            return Err(CoreError::Conflict(format!(
                "Asset {} changed custody since the transfer was validated",
                transfer.asset_id
            )));
        }

        let now = chrono::Utc::now();
        let id = new_movement_id();
        let next_state = transfer.destination.resulting_state();
        let record = transfer.into_record(id, now);

        let stored: Vec<MovementAnnotation> = annotations
            .iter()
            .map(|a| new_annotation(id, a, now))
            .collect();

        if let Some(asset) = inner.assets.get_mut(&record.asset_id) {
            asset.state = next_state;
        }
        inner.annotations.insert(id, stored);
        inner.movements.insert(id, record.clone());

        Ok(inner.entry(&record))
    }

    async fn amend_destination(
        &self,
        movement_id: EntityId,
        destination: Option<Destination>,
        annotations: &[AnnotationInput],
    ) -> Result<MovementEntry, CoreError> {
        let mut inner = self.inner.write().await;
        validate_annotations(annotations)?;

        let mut record = inner
            .movements
            .get(&movement_id)
            .cloned()
            .ok_or(CoreError::NotFound {
                entity: ENTITY_MOVEMENT,
                id: movement_id,
            })?;

        let now = chrono::Utc::now();

        if let Some(destination) = destination {
            record.destination = destination;
            if inner.is_latest_for_asset(&record) {
                if let Some(asset) = inner.assets.get_mut(&record.asset_id) {
                    asset.state = destination.resulting_state();
                }
            }
        }
        record.updated_at = now;

        let stored = inner.annotations.entry(movement_id).or_default();
        for input in annotations {
            match stored.iter_mut().find(|a| a.language == input.language) {
                Some(existing) => {
                    existing.title = input.title.clone();
                    existing.notes = input.notes.clone();
                    existing.updated_at = now;
                }
                None => stored.push(new_annotation(movement_id, input, now)),
            }
        }

        inner.movements.insert(movement_id, record.clone());
        Ok(inner.entry(&record))
    }

    async fn remove(&self, movement_id: EntityId) -> Result<(), CoreError> {
        let mut inner = self.inner.write().await;
        if inner.movements.remove(&movement_id).is_none() {
            return Err(CoreError::NotFound {
                entity: ENTITY_MOVEMENT,
                id: movement_id,
            });
        }
        inner.annotations.remove(&movement_id);
        Ok(())
    }

    async fn get_by_id(&self, movement_id: EntityId) -> Result<Option<MovementEntry>, CoreError> {
        let inner = self.inner.read().await;
        Ok(inner.movements.get(&movement_id).map(|r| inner.entry(r)))
    }

    async fn list(&self, query: &MovementQuery) -> Result<Vec<MovementEntry>, CoreError> {
        Ok(self.inner.read().await.sorted(query))
    }

    async fn list_paginated(
        &self,
        query: &MovementQuery,
        page: PageRequest,
    ) -> Result<Page<MovementEntry>, CoreError> {
        let rows = self.inner.read().await.sorted(query);
        let total = rows.len() as i64;
        let items = rows
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect();
        Ok(Page {
            items,
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
        let inner = self.inner.read().await;

        let boundary = match cursor.cursor.boundary() {
            Some(id) => Some(cursor_key(inner.movements.get(&id).ok_or(
                CoreError::NotFound {
                    entity: ENTITY_MOVEMENT,
                    id,
                },
            )?)),
            None => None,
        };

        let mut rows: Vec<MovementEntry> = inner
            .matching(query)
            .into_iter()
            .filter(|e| {
                let key = cursor_key(&e.record);
                match (cursor.cursor, boundary) {
                    (Cursor::After(_), Some(b)) => key < b,
                    (Cursor::Before(_), Some(b)) => key > b,
                    _ => true,
                }
            })
            .collect();

        if cursor.cursor.fetches_ascending() {
            rows.sort_by_key(|e| cursor_key(&e.record));
        } else {
            rows.sort_by(|a, b| cursor_key(&b.record).cmp(&cursor_key(&a.record)));
        }
        rows.truncate(cursor.limit as usize + 1);

        Ok(finish_cursor_page(rows, &cursor, |e| e.record.id))
    }

    async fn count(&self, query: &MovementQuery) -> Result<i64, CoreError> {
        Ok(self.inner.read().await.matching(query).len() as i64)
    }

    async fn scan(&self) -> Result<Vec<MovementEntry>, CoreError> {
        let inner = self.inner.read().await;
        Ok(inner.movements.values().map(|r| inner.entry(r)).collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
