pub mod health;
pub mod movement;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /movements                                list, create
/// /movements/cursor                         keyset listing
/// /movements/count                          count
/// /movements/statistics                     aggregates
/// /movements/{id}                           get, amend, delete
///
/// /assets/{asset_id}/movements              asset history
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/movements", movement::router())
        .nest("/assets", movement::asset_router())
}
