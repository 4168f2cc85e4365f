//! Route definitions for asset movements.

use axum::routing::get;
use axum::Router;

use crate::handlers::movement;
use crate::state::AppState;

/// Routes mounted at `/movements`.
///
/// ```text
/// GET    /                     list_movements
/// POST   /                     create_movement
/// GET    /cursor               list_movements_by_cursor
/// GET    /count                count_movements
/// GET    /statistics           get_statistics
/// GET    /{id}                 get_movement
/// PUT    /{id}                 update_movement
/// DELETE /{id}                 delete_movement
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(movement::list_movements).post(movement::create_movement),
        )
        .route("/cursor", get(movement::list_movements_by_cursor))
        .route("/count", get(movement::count_movements))
        .route("/statistics", get(movement::get_statistics))
        .route(
            "/{id}",
            get(movement::get_movement)
                .put(movement::update_movement)
                .delete(movement::delete_movement),
        )
}

/// Asset-scoped routes mounted at `/assets`.
///
/// ```text
/// GET    /{asset_id}/movements   list_asset_movements
/// ```
pub fn asset_router() -> Router<AppState> {
    Router::new().route("/{asset_id}/movements", get(movement::list_asset_movements))
}
