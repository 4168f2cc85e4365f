//! Handlers for asset movements.
//!
//! Creates go through [`TransferService`](custody_core::transfer::TransferService),
//! which validates and appends under the asset's lock. Reads query the ledger
//! directly and render the annotation for the requested language.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use custody_core::annotation::{available_languages, select_annotation, AnnotationInput};
use custody_core::error::CoreError;
use custody_core::ledger::AmendMovement;
use custody_core::movement::{
    MovementAnnotation, MovementEntry, MovementKind, MovementLabels, MovementRecord,
    ENTITY_MOVEMENT,
};
use custody_core::statistics::StatisticsAggregator;
use custody_core::types::EntityId;
use custody_core::validator::TransferRequest;

use crate::error::{AppError, AppResult};
use crate::middleware::acting_user::ActingUser;
use crate::query::MovementParams;
use crate::response::DataResponse;
use crate::state::AppState;

/* --------------------------------------------------------------------------
   Request / response types
   -------------------------------------------------------------------------- */

/// Body for `POST /movements`. The source side is always derived.
#[derive(Debug, Deserialize)]
pub struct CreateMovementRequest {
    pub asset_id: EntityId,
    pub to_location_id: Option<EntityId>,
    pub to_custodian_id: Option<EntityId>,
    #[serde(default)]
    pub annotations: Vec<AnnotationInput>,
}

/// `?lang=` for endpoints that return a single movement.
#[derive(Debug, Default, Deserialize)]
pub struct LangParams {
    pub lang: Option<String>,
}

/// A movement as rendered to clients.
#[derive(Debug, Serialize)]
pub struct MovementView {
    #[serde(flatten)]
    pub record: MovementRecord,
    pub kind: MovementKind,
    #[serde(flatten)]
    pub labels: MovementLabels,
    pub summary: String,
    /// Annotation in the requested language, falling back to the default.
    pub annotation: Option<MovementAnnotation>,
    pub available_languages: Vec<String>,
    /// Every annotation; only present on single-movement responses.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<MovementAnnotation>>,
}

impl MovementView {
    fn build(
        entry: MovementEntry,
        lang: Option<&str>,
        default_language: &str,
        detailed: bool,
    ) -> Self {
        let annotation = select_annotation(&entry.annotations, lang, default_language).cloned();
        let languages = available_languages(&entry.annotations);
        let summary = entry.summary();
        let kind = entry.record.kind();
        Self {
            record: entry.record,
            kind,
            labels: entry.labels,
            summary,
            annotation,
            available_languages: languages,
            annotations: detailed.then_some(entry.annotations),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CountResponse {
    pub count: i64,
}

fn render<'a>(
    state: &'a AppState,
    lang: Option<&'a str>,
) -> impl Fn(MovementEntry) -> MovementView + 'a {
    let default_language = state.config.default_language.as_str();
    move |entry| MovementView::build(entry, lang, default_language, false)
}

fn render_one(state: &AppState, entry: MovementEntry, lang: Option<&str>) -> MovementView {
    MovementView::build(entry, lang, &state.config.default_language, true)
}

/* --------------------------------------------------------------------------
   Writes
   -------------------------------------------------------------------------- */

/// POST /movements
///
/// Validate and record a transfer performed by the acting user.
pub async fn create_movement(
    user: ActingUser,
    State(state): State<AppState>,
    params: Result<Query<LangParams>, QueryRejection>,
    payload: Result<Json<CreateMovementRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Query(params) = params?;
    let Json(input) = payload?;
    let request = TransferRequest {
        asset_id: input.asset_id,
        to_location_id: input.to_location_id,
        to_custodian_id: input.to_custodian_id,
        moved_by: user.user_id,
    };

    let entry = state.transfers.transfer(request, &input.annotations).await?;
    let view = render_one(&state, entry, params.lang.as_deref());

    Ok((StatusCode::CREATED, Json(DataResponse { data: view })))
}

/// PUT /movements/{id}
///
/// Correct a movement's destination and/or upsert annotations.
pub async fn update_movement(
    user: ActingUser,
    State(state): State<AppState>,
    id: Result<Path<EntityId>, PathRejection>,
    params: Result<Query<LangParams>, QueryRejection>,
    payload: Result<Json<AmendMovement>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Path(id) = id?;
    let Query(params) = params?;
    let Json(input) = payload?;
    let entry = state.transfers.amend(id, &input).await?;

    tracing::info!(
        user_id = %user.user_id,
        movement_id = %id,
        "Movement amendment requested"
    );

    let view = render_one(&state, entry, params.lang.as_deref());
    Ok(Json(DataResponse { data: view }))
}

/// DELETE /movements/{id}
pub async fn delete_movement(
    user: ActingUser,
    State(state): State<AppState>,
    id: Result<Path<EntityId>, PathRejection>,
) -> AppResult<StatusCode> {
    let Path(id) = id?;
    state.transfers.remove(id).await?;
    tracing::info!(user_id = %user.user_id, movement_id = %id, "Movement deletion requested");
    Ok(StatusCode::NO_CONTENT)
}

/* --------------------------------------------------------------------------
   Reads
   -------------------------------------------------------------------------- */

/// GET /movements/{id}
pub async fn get_movement(
    State(state): State<AppState>,
    id: Result<Path<EntityId>, PathRejection>,
    params: Result<Query<LangParams>, QueryRejection>,
) -> AppResult<impl IntoResponse> {
    let Path(id) = id?;
    let Query(params) = params?;
    let entry = state
        .transfers
        .ledger()
        .get_by_id(id)
        .await?
        .ok_or_else(|| {
            AppError::Core(CoreError::NotFound {
                entity: ENTITY_MOVEMENT,
                id,
            })
        })?;
    let view = render_one(&state, entry, params.lang.as_deref());
    Ok(Json(DataResponse { data: view }))
}

/// GET /movements
///
/// Offset-paginated listing with filters, search and sort.
pub async fn list_movements(
    State(state): State<AppState>,
    params: Result<Query<MovementParams>, QueryRejection>,
) -> AppResult<impl IntoResponse> {
    let Query(params) = params?;
    let query = params.to_query()?;
    let page = state
        .transfers
        .ledger()
        .list_paginated(&query, params.page())
        .await?;
    let page = page.map(render(&state, params.lang.as_deref()));
    Ok(Json(DataResponse { data: page }))
}

/// GET /movements/cursor
///
/// Keyset pagination with `before` / `after` boundary ids.
pub async fn list_movements_by_cursor(
    State(state): State<AppState>,
    params: Result<Query<MovementParams>, QueryRejection>,
) -> AppResult<impl IntoResponse> {
    let Query(params) = params?;
    let query = params.to_query()?;
    let cursor = params.cursor()?;
    let page = state
        .transfers
        .ledger()
        .list_by_cursor(&query, cursor)
        .await?;
    let page = page.map(render(&state, params.lang.as_deref()));
    Ok(Json(DataResponse { data: page }))
}

/// GET /movements/count
pub async fn count_movements(
    State(state): State<AppState>,
    params: Result<Query<MovementParams>, QueryRejection>,
) -> AppResult<impl IntoResponse> {
    let Query(params) = params?;
    let query = params.to_query()?;
    let count = state.transfers.ledger().count(&query).await?;
    Ok(Json(DataResponse {
        data: CountResponse { count },
    }))
}

/// GET /movements/statistics
///
/// Aggregates recomputed from a full ledger scan on every call.
pub async fn get_statistics(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let stats = StatisticsAggregator::new(state.transfers.ledger())
        .compute()
        .await?;
    Ok(Json(DataResponse { data: stats }))
}

/// GET /assets/{asset_id}/movements
///
/// Full movement history of one asset, most recent first by default.
pub async fn list_asset_movements(
    State(state): State<AppState>,
    asset_id: Result<Path<EntityId>, PathRejection>,
    params: Result<Query<MovementParams>, QueryRejection>,
) -> AppResult<impl IntoResponse> {
    let Path(asset_id) = asset_id?;
    let Query(params) = params?;
    let query = params.to_query()?;
    let entries = state.transfers.history(asset_id, &query).await?;
    let views: Vec<MovementView> = entries
        .into_iter()
        .map(render(&state, params.lang.as_deref()))
        .collect();
    Ok(Json(DataResponse { data: views }))
}
