//! Repositories for the `locations` and `users` tables.

use sqlx::PgPool;
use custody_core::types::EntityId;

use crate::models::directory::NamedEntity;

/// Column list shared by `locations` and `users`.
const COLUMNS: &str = "id, name, created_at, updated_at";

/// Provides lookups for storage locations.
pub struct LocationRepo;

impl LocationRepo {
    pub async fn create(pool: &PgPool, name: &str) -> Result<NamedEntity, sqlx::Error> {
        create_named(pool, "locations", name).await
    }

    pub async fn exists(pool: &PgPool, id: EntityId) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM locations WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
    }
}

/// Provides lookups for users (custodians and acting users).
pub struct UserRepo;

impl UserRepo {
    pub async fn create(pool: &PgPool, name: &str) -> Result<NamedEntity, sqlx::Error> {
        create_named(pool, "users", name).await
    }

    pub async fn exists(pool: &PgPool, id: EntityId) -> Result<bool, sqlx::Error> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(pool)
            .await
    }
}

async fn create_named(pool: &PgPool, table: &str, name: &str) -> Result<NamedEntity, sqlx::Error> {
    let query = format!("INSERT INTO {table} (id, name) VALUES ($1, $2) RETURNING {COLUMNS}");
    sqlx::query_as::<_, NamedEntity>(&query)
        .bind(uuid::Uuid::now_v7())
        .bind(name)
        .fetch_one(pool)
        .await
}
