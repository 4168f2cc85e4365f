//! Read-side query rules shared by every ledger backend.
//!
//! Filters, free-text search, sort specifications, offset pagination and
//! cursor pagination. The SQL backend translates these into clauses; the
//! in-memory backend evaluates them directly with the helpers below.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::movement::{MovementEntry, MovementRecord};
use crate::types::{EntityId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Default page size for list endpoints.
pub const DEFAULT_PAGE_SIZE: i64 = 25;

/// Upper bound on any page size.
pub const MAX_PAGE_SIZE: i64 = 100;

/// Clamp a user-provided limit to valid bounds.
pub fn clamp_limit(limit: Option<i64>, default: i64, max: i64) -> i64 {
    limit.unwrap_or(default).max(1).min(max)
}

/// Clamp a user-provided offset to non-negative.
pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

// ---------------------------------------------------------------------------
// Filters
// ---------------------------------------------------------------------------

/// Field-level filters. All present fields must match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MovementFilter {
    pub asset_id: Option<EntityId>,
    pub from_location_id: Option<EntityId>,
    pub to_location_id: Option<EntityId>,
    pub from_custodian_id: Option<EntityId>,
    pub to_custodian_id: Option<EntityId>,
    pub moved_by: Option<EntityId>,
    /// Inclusive lower bound on `moved_at`.
    pub moved_from: Option<Timestamp>,
    /// Inclusive upper bound on `moved_at`.
    pub moved_to: Option<Timestamp>,
}

impl MovementFilter {
    pub fn matches(&self, record: &MovementRecord) -> bool {
        fn eq(want: Option<EntityId>, have: Option<EntityId>) -> bool {
            want.is_none() || want == have
        }

        eq(self.asset_id, Some(record.asset_id))
            && eq(self.from_location_id, record.from_location_id)
            && eq(self.to_location_id, record.destination.location_id())
            && eq(self.from_custodian_id, record.from_custodian_id)
            && eq(self.to_custodian_id, record.destination.custodian_id())
            && eq(self.moved_by, Some(record.moved_by))
            && self.moved_from.map_or(true, |from| record.moved_at >= from)
            && self.moved_to.map_or(true, |to| record.moved_at <= to)
    }

    /// Reject an inverted date range.
    pub fn validate(&self) -> Result<(), CoreError> {
        match (self.moved_from, self.moved_to) {
            (Some(from), Some(to)) if from > to => Err(CoreError::Validation(
                "moved_from must not be after moved_to".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// Case-insensitive substring match over the owning asset's tag and serial.
pub fn matches_search(entry: &MovementEntry, term: &str) -> bool {
    let needle = term.to_lowercase();
    entry.labels.asset_tag.to_lowercase().contains(&needle)
        || entry
            .labels
            .asset_serial
            .as_deref()
            .is_some_and(|s| s.to_lowercase().contains(&needle))
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    MovedAt,
    CreatedAt,
    UpdatedAt,
    AssetTag,
}

impl SortField {
    fn parse(name: &str) -> Option<Self> {
        match name {
            "moved_at" => Some(SortField::MovedAt),
            "created_at" => Some(SortField::CreatedAt),
            "updated_at" => Some(SortField::UpdatedAt),
            "asset_tag" => Some(SortField::AssetTag),
            _ => None,
        }
    }

    /// Names accepted by [`SortSpec::parse`].
    pub const NAMES: &'static [&'static str] = &["moved_at", "created_at", "updated_at", "asset_tag"];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub direction: SortDirection,
}

/// Ordered list of sort keys. Record id descending is always the implicit
/// final tie-break so results are deterministic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec(Vec<SortKey>);

impl Default for SortSpec {
    fn default() -> Self {
        SortSpec(vec![SortKey {
            field: SortField::MovedAt,
            direction: SortDirection::Desc,
        }])
    }
}

impl SortSpec {
    /// Parse a comma-separated list such as `-moved_at,asset_tag`.
    ///
    /// A leading `-` means descending. An empty or absent spec yields the
    /// default (`moved_at` descending).
    pub fn parse(raw: Option<&str>) -> Result<Self, CoreError> {
        let raw = match raw.map(str::trim) {
            None | Some("") => return Ok(Self::default()),
            Some(raw) => raw,
        };

        let mut keys = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            let (direction, name) = match part.strip_prefix('-') {
                Some(name) => (SortDirection::Desc, name),
                None => (SortDirection::Asc, part.strip_prefix('+').unwrap_or(part)),
            };
            let field = SortField::parse(name).ok_or_else(|| {
                CoreError::Validation(format!(
                    "Unknown sort field '{name}'. Must be one of: {}",
                    SortField::NAMES.join(", ")
                ))
            })?;
            keys.push(SortKey { field, direction });
        }

        if keys.is_empty() {
            return Ok(Self::default());
        }
        Ok(SortSpec(keys))
    }

    pub fn keys(&self) -> &[SortKey] {
        &self.0
    }

    /// Compare two entries under this spec, falling back to id descending.
    pub fn compare(&self, a: &MovementEntry, b: &MovementEntry) -> Ordering {
        for key in &self.0 {
            let ord = match key.field {
                SortField::MovedAt => a.record.moved_at.cmp(&b.record.moved_at),
                SortField::CreatedAt => a.record.created_at.cmp(&b.record.created_at),
                SortField::UpdatedAt => a.record.updated_at.cmp(&b.record.updated_at),
                SortField::AssetTag => a.labels.asset_tag.cmp(&b.labels.asset_tag),
            };
            let ord = match key.direction {
                SortDirection::Asc => ord,
                SortDirection::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        b.record.id.cmp(&a.record.id)
    }
}

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// Everything a read operation accepts besides pagination.
#[derive(Debug, Clone, Default)]
pub struct MovementQuery {
    pub search: Option<String>,
    pub filter: MovementFilter,
    pub sort: SortSpec,
}

impl MovementQuery {
    /// Search term with surrounding whitespace removed, if non-empty.
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    pub fn matches(&self, entry: &MovementEntry) -> bool {
        self.filter.matches(&entry.record)
            && self
                .search_term()
                .map_or(true, |term| matches_search(entry, term))
    }
}

// ---------------------------------------------------------------------------
// Offset pagination
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: i64,
    pub offset: i64,
}

impl PageRequest {
    pub fn new(limit: Option<i64>, offset: Option<i64>) -> Self {
        Self {
            limit: clamp_limit(limit, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE),
            offset: clamp_offset(offset),
        }
    }
}

/// Offset-paginated response.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            limit: self.limit,
            offset: self.offset,
        }
    }
}

// ---------------------------------------------------------------------------
// Cursor pagination
// ---------------------------------------------------------------------------

/// Which side of a boundary record to read.
///
/// Listing order is `(moved_at DESC, id DESC)`. `After` walks toward older
/// records, `Before` toward newer ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cursor {
    First,
    After(EntityId),
    Before(EntityId),
}

impl Cursor {
    pub fn from_parts(before: Option<EntityId>, after: Option<EntityId>) -> Result<Self, CoreError> {
        match (before, after) {
            (None, None) => Ok(Cursor::First),
            (None, Some(id)) => Ok(Cursor::After(id)),
            (Some(id), None) => Ok(Cursor::Before(id)),
            (Some(_), Some(_)) => Err(CoreError::Validation(
                "before and after are mutually exclusive".into(),
            )),
        }
    }

    pub fn boundary(&self) -> Option<EntityId> {
        match self {
            Cursor::First => None,
            Cursor::After(id) | Cursor::Before(id) => Some(*id),
        }
    }

    /// Whether rows are fetched in ascending key order (then reversed).
    pub fn fetches_ascending(&self) -> bool {
        matches!(self, Cursor::Before(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CursorRequest {
    pub cursor: Cursor,
    pub limit: i64,
}

impl CursorRequest {
    pub fn new(
        before: Option<EntityId>,
        after: Option<EntityId>,
        limit: Option<i64>,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            cursor: Cursor::from_parts(before, after)?,
            limit: clamp_limit(limit, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE),
        })
    }
}

/// Cursor-paginated response.
///
/// `next_cursor` feeds `after=` to continue toward older records;
/// `prev_cursor` feeds `before=` to go back toward newer ones.
#[derive(Debug, Clone, Serialize)]
pub struct CursorPage<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<EntityId>,
    pub prev_cursor: Option<EntityId>,
}

impl<T> CursorPage<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> CursorPage<U> {
        CursorPage {
            items: self.items.into_iter().map(f).collect(),
            next_cursor: self.next_cursor,
            prev_cursor: self.prev_cursor,
        }
    }
}

/// Composite key defining the cursor order.
pub fn cursor_key(record: &MovementRecord) -> (Timestamp, EntityId) {
    (record.moved_at, record.id)
}

/// Assemble a cursor page from rows fetched with `limit + 1` lookahead.
///
/// `rows` must be in fetch order: descending for `First`/`After`, ascending
/// for `Before`. The extra row only signals that more data exists.
pub fn finish_cursor_page<T>(
    mut rows: Vec<T>,
    request: &CursorRequest,
    id_of: impl Fn(&T) -> EntityId,
) -> CursorPage<T> {
    let limit = request.limit.max(1) as usize;
    let has_more = rows.len() > limit;
    rows.truncate(limit);

    if request.cursor.fetches_ascending() {
        rows.reverse();
    }

    let first = rows.first().map(&id_of);
    let last = rows.last().map(&id_of);

    let (next_cursor, prev_cursor) = match request.cursor {
        Cursor::First => (if has_more { last } else { None }, None),
        Cursor::After(_) => (if has_more { last } else { None }, first),
        Cursor::Before(_) => (last, if has_more { first } else { None }),
    };

    CursorPage {
        items: rows,
        next_cursor,
        prev_cursor,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
