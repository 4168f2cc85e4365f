//! Repository for the `movements` table.
//!
//! Reads join the asset, location and user tables so every row carries its
//! display labels. Writes take a `&mut PgConnection` so callers can compose
//! them inside one transaction.

use sqlx::{PgConnection, PgPool};
use custody_core::listing::{Cursor, MovementQuery, SortField, SortSpec};
use custody_core::movement::{Destination, MovementRecord};
use custody_core::types::{EntityId, Timestamp};

use crate::models::movement::MovementRow;

/// Column list for joined `movements` reads. Pairs with [`MOVEMENT_FROM`].
const MOVEMENT_COLUMNS: &str = "\
    m.id, m.asset_id, m.from_location_id, m.from_custodian_id, \
    m.to_location_id, m.to_custodian_id, m.moved_by, \
    m.moved_at, m.created_at, m.updated_at, \
    COALESCE(a.tag, m.asset_id::text) AS asset_tag, \
    a.serial_number AS asset_serial, \
    fl.name AS from_location_name, \
    fc.name AS from_custodian_name, \
    tl.name AS to_location_name, \
    tc.name AS to_custodian_name, \
    mb.name AS moved_by_name";

const MOVEMENT_FROM: &str = "\
    FROM movements m \
    LEFT JOIN assets a ON a.id = m.asset_id \
    LEFT JOIN locations fl ON fl.id = m.from_location_id \
    LEFT JOIN users fc ON fc.id = m.from_custodian_id \
    LEFT JOIN locations tl ON tl.id = m.to_location_id \
    LEFT JOIN users tc ON tc.id = m.to_custodian_id \
    LEFT JOIN users mb ON mb.id = m.moved_by";

/// Provides persistence for movement records.
pub struct MovementRepo;

impl MovementRepo {
    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    pub async fn insert(conn: &mut PgConnection, record: &MovementRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO movements (\
                id, asset_id, from_location_id, from_custodian_id, \
                to_location_id, to_custodian_id, moved_by, \
                moved_at, created_at, updated_at\
             ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(record.id)
        .bind(record.asset_id)
        .bind(record.from_location_id)
        .bind(record.from_custodian_id)
        .bind(record.destination.location_id())
        .bind(record.destination.custodian_id())
        .bind(record.moved_by)
        .bind(record.moved_at)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Lock a movement row for the rest of the transaction.
    pub async fn find_for_update(
        conn: &mut PgConnection,
        id: EntityId,
    ) -> Result<Option<MovementRow>, sqlx::Error> {
        let query = format!("SELECT {MOVEMENT_COLUMNS} {MOVEMENT_FROM} WHERE m.id = $1 FOR UPDATE OF m");
        sqlx::query_as::<_, MovementRow>(&query)
            .bind(id)
            .fetch_optional(&mut *conn)
            .await
    }

    /// Replace the destination columns. Source columns are never touched.
    pub async fn update_destination(
        conn: &mut PgConnection,
        id: EntityId,
        destination: &Destination,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE movements SET to_location_id = $2, to_custodian_id = $3, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(destination.location_id())
        .bind(destination.custodian_id())
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    pub async fn touch(conn: &mut PgConnection, id: EntityId) -> Result<(), sqlx::Error> {
        sqlx::query("UPDATE movements SET updated_at = NOW() WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(())
    }

    /// Whether no later movement exists for the same asset.
    pub async fn is_latest_for_asset(
        conn: &mut PgConnection,
        asset_id: EntityId,
        moved_at: Timestamp,
        id: EntityId,
    ) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>(
            "SELECT NOT EXISTS (\
                SELECT 1 FROM movements \
                WHERE asset_id = $1 AND (moved_at, id) > ($2, $3)\
             )",
        )
        .bind(asset_id)
        .bind(moved_at)
        .bind(id)
        .fetch_one(&mut *conn)
        .await
    }

    /// Delete a movement. Annotations cascade. Returns `true` if a row was removed.
    pub async fn delete(conn: &mut PgConnection, id: EntityId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM movements WHERE id = $1")
            .bind(id)
            .execute(&mut *conn)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub async fn find_by_id(pool: &PgPool, id: EntityId) -> Result<Option<MovementRow>, sqlx::Error> {
        let query = format!("SELECT {MOVEMENT_COLUMNS} {MOVEMENT_FROM} WHERE m.id = $1");
        sqlx::query_as::<_, MovementRow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Matching movements in the query's sort order, optionally windowed.
    pub async fn list(
        pool: &PgPool,
        query: &MovementQuery,
        window: Option<(i64, i64)>,
    ) -> Result<Vec<MovementRow>, sqlx::Error> {
        let (conditions, bind_values, bind_idx) = build_movement_filter(query);
        let where_clause = where_clause(&conditions);
        let order = order_clause(&query.sort);

        let pagination = match window {
            Some(_) => format!(" LIMIT ${bind_idx} OFFSET ${}", bind_idx + 1),
            None => String::new(),
        };
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} {MOVEMENT_FROM} {where_clause} ORDER BY {order}{pagination}"
        );

        let mut q = bind_movement_values(sqlx::query_as::<_, MovementRow>(&sql), &bind_values);
        if let Some((limit, offset)) = window {
            q = q.bind(limit).bind(offset);
        }
        q.fetch_all(pool).await
    }

    pub async fn count(pool: &PgPool, query: &MovementQuery) -> Result<i64, sqlx::Error> {
        let (conditions, bind_values, _) = build_movement_filter(query);
        let sql = format!(
            "SELECT COUNT(*) {MOVEMENT_FROM} {}",
            where_clause(&conditions)
        );
        bind_movement_values_scalar(sqlx::query_scalar::<_, i64>(&sql), &bind_values)
            .fetch_one(pool)
            .await
    }

    /// The `(moved_at, id)` key of a movement, if it exists.
    pub async fn find_cursor_key(
        pool: &PgPool,
        id: EntityId,
    ) -> Result<Option<(Timestamp, EntityId)>, sqlx::Error> {
        sqlx::query_as::<_, (Timestamp, EntityId)>("SELECT moved_at, id FROM movements WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Keyset read on `(moved_at, id)`.
    ///
    /// `First` and `After` return rows older than the boundary, newest first.
    /// `Before` returns rows newer than the boundary, oldest first; the caller
    /// reverses them.
    pub async fn list_keyset(
        pool: &PgPool,
        query: &MovementQuery,
        cursor: Cursor,
        boundary: Option<(Timestamp, EntityId)>,
        fetch: i64,
    ) -> Result<Vec<MovementRow>, sqlx::Error> {
        let (mut conditions, bind_values, mut bind_idx) = build_movement_filter(query);

        let comparator = match cursor {
            Cursor::Before(_) => ">",
            Cursor::First | Cursor::After(_) => "<",
        };
        if boundary.is_some() {
            conditions.push(format!(
                "(m.moved_at, m.id) {comparator} (${bind_idx}, ${})",
                bind_idx + 1
            ));
            bind_idx += 2;
        }

        let direction = if cursor.fetches_ascending() { "ASC" } else { "DESC" };
        let sql = format!(
            "SELECT {MOVEMENT_COLUMNS} {MOVEMENT_FROM} {} \
             ORDER BY m.moved_at {direction}, m.id {direction} LIMIT ${bind_idx}",
            where_clause(&conditions)
        );

        let mut q = bind_movement_values(sqlx::query_as::<_, MovementRow>(&sql), &bind_values);
        if let Some((moved_at, id)) = boundary {
            q = q.bind(moved_at).bind(id);
        }
        q.bind(fetch).fetch_all(pool).await
    }

    /// Every movement in creation order.
    pub async fn scan(pool: &PgPool) -> Result<Vec<MovementRow>, sqlx::Error> {
        let query = format!("SELECT {MOVEMENT_COLUMNS} {MOVEMENT_FROM} ORDER BY m.id");
        sqlx::query_as::<_, MovementRow>(&query).fetch_all(pool).await
    }
}

// ---------------------------------------------------------------------------
// Internal helpers for dynamic query building
// ---------------------------------------------------------------------------

/// Typed bind value for dynamically-built movement queries.
enum BindValue {
    Id(EntityId),
    Text(String),
    Timestamp(Timestamp),
}

/// Build WHERE conditions and bind values from a [`MovementQuery`].
///
/// Returns `(conditions, bind_values, next_bind_index)`.
fn build_movement_filter(query: &MovementQuery) -> (Vec<String>, Vec<BindValue>, u32) {
    let mut conditions: Vec<String> = Vec::new();
    let mut bind_idx = 1u32;
    let mut bind_values: Vec<BindValue> = Vec::new();
    let filter = &query.filter;

    let id_filters = [
        ("m.asset_id", filter.asset_id),
        ("m.from_location_id", filter.from_location_id),
        ("m.to_location_id", filter.to_location_id),
        ("m.from_custodian_id", filter.from_custodian_id),
        ("m.to_custodian_id", filter.to_custodian_id),
        ("m.moved_by", filter.moved_by),
    ];
    for (column, value) in id_filters {
        if let Some(id) = value {
            conditions.push(format!("{column} = ${bind_idx}"));
            bind_idx += 1;
            bind_values.push(BindValue::Id(id));
        }
    }

    if let Some(from) = filter.moved_from {
        conditions.push(format!("m.moved_at >= ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Timestamp(from));
    }

    if let Some(to) = filter.moved_to {
        conditions.push(format!("m.moved_at <= ${bind_idx}"));
        bind_idx += 1;
        bind_values.push(BindValue::Timestamp(to));
    }

    if let Some(term) = query.search_term() {
        conditions.push(format!(
            "(a.tag ILIKE ${bind_idx} OR a.serial_number ILIKE ${bind_idx})"
        ));
        bind_idx += 1;
        bind_values.push(BindValue::Text(format!("%{}%", escape_like(term))));
    }

    (conditions, bind_values, bind_idx)
}

fn where_clause(conditions: &[String]) -> String {
    if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    }
}

fn sort_column(field: SortField) -> &'static str {
    match field {
        SortField::MovedAt => "m.moved_at",
        SortField::CreatedAt => "m.created_at",
        SortField::UpdatedAt => "m.updated_at",
        SortField::AssetTag => "a.tag",
    }
}

/// ORDER BY body for a sort spec, always ending in `m.id DESC`.
fn order_clause(sort: &SortSpec) -> String {
    let mut parts: Vec<String> = sort
        .keys()
        .iter()
        .map(|key| format!("{} {}", sort_column(key.field), key.direction.sql()))
        .collect();
    parts.push("m.id DESC".to_string());
    parts.join(", ")
}

/// Escape `%`, `_` and `\` so user input matches literally inside ILIKE.
fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Bind a slice of `BindValue` to a sqlx `QueryAs`.
fn bind_movement_values<'q, O>(
    mut q: sqlx::query::QueryAs<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments>,
    bind_values: &'q [BindValue],
) -> sqlx::query::QueryAs<'q, sqlx::Postgres, O, sqlx::postgres::PgArguments> {
    for val in bind_values {
        match val {
            BindValue::Id(v) => q = q.bind(*v),
            BindValue::Text(v) => q = q.bind(v.as_str()),
            BindValue::Timestamp(v) => q = q.bind(*v),
        }
    }
    q
}

/// Bind a slice of `BindValue` to a sqlx `QueryScalar`.
fn bind_movement_values_scalar<'q>(
    mut q: sqlx::query::QueryScalar<'q, sqlx::Postgres, i64, sqlx::postgres::PgArguments>,
    bind_values: &'q [BindValue],
) -> sqlx::query::QueryScalar<'q, sqlx::Postgres, i64, sqlx::postgres::PgArguments> {
    for val in bind_values {
        match val {
            BindValue::Id(v) => q = q.bind(*v),
            BindValue::Text(v) => q = q.bind(v.as_str()),
            BindValue::Timestamp(v) => q = q.bind(*v),
        }
    }
    q
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
