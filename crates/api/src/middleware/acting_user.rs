//! Acting-user extractor for Axum handlers.
//!
//! Identity is asserted by the upstream session layer through the
//! `X-User-Id` header; this service only records it.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use custody_core::error::CoreError;
use custody_core::types::EntityId;

use crate::error::AppError;
use crate::state::AppState;

/// Header carrying the acting user's id.
pub const ACTING_USER_HEADER: &str = "x-user-id";

/// The user on whose behalf a request is made.
///
/// ```ignore
/// async fn my_handler(user: ActingUser) -> AppResult<Json<()>> {
///     tracing::info!(user_id = %user.user_id, "handling request");
///     Ok(Json(()))
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ActingUser {
    pub user_id: EntityId,
}

impl FromRequestParts<AppState> for ActingUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(ACTING_USER_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| {
                AppError::Core(CoreError::Unauthorized("Missing X-User-Id header".into()))
            })?;

        let user_id = raw.trim().parse::<EntityId>().map_err(|_| {
            AppError::Core(CoreError::Unauthorized(
                "Invalid X-User-Id header. Expected a UUID".into(),
            ))
        })?;

        Ok(ActingUser { user_id })
    }
}
