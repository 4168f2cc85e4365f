//! HTTP-level integration tests for the movement API.
//!
//! Uses Axum's tower::ServiceExt to send requests directly to the router
//! without an actual TCP listener. Every test runs on a fresh in-memory store.

mod common;

use std::collections::HashSet;

use axum::http::StatusCode;
use common::{body_bytes, body_json, delete, get, post_json, put_json, Seed};
use serde_json::{json, Value};
use uuid::Uuid;

async fn create(app: &axum::Router, seed: &Seed, body: Value) -> Value {
    let response = post_json(app.clone(), "/api/v1/movements", Some(seed.clerk), body).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["data"].clone()
}

fn movement_id(movement: &Value) -> String {
    movement["id"].as_str().unwrap().to_string()
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_create_movement_returns_201_with_derived_source() {
    let (app, seed) = common::build_test_app().await;

    let first = create(
        &app,
        &seed,
        json!({"asset_id": seed.laptop, "to_location_id": seed.warehouse_a}),
    )
    .await;
    assert_eq!(first["kind"], "new_asset");
    assert!(first["from_location_id"].is_null());
    assert_eq!(first["to_location_id"], seed.warehouse_a.to_string());
    assert!(first["to_custodian_id"].is_null());
    assert_eq!(first["moved_by"], seed.clerk.to_string());
    assert_eq!(first["asset_tag"], "LAPTOP-001");
    assert!(first["summary"].as_str().unwrap().contains("Warehouse A"));

    let second = create(
        &app,
        &seed,
        json!({"asset_id": seed.laptop, "to_custodian_id": seed.jane}),
    )
    .await;
    assert_eq!(second["kind"], "location_to_custodian");
    assert_eq!(second["from_location_id"], seed.warehouse_a.to_string());
    assert_eq!(second["to_custodian_name"], "Jane Doe");
}

#[tokio::test]
async fn test_create_requires_exactly_one_destination() {
    let (app, seed) = common::build_test_app().await;

    for body in [
        json!({"asset_id": seed.laptop}),
        json!({
            "asset_id": seed.laptop,
            "to_location_id": seed.warehouse_a,
            "to_custodian_id": seed.jane,
        }),
    ] {
        let response = post_json(app.clone(), "/api/v1/movements", Some(seed.clerk), body).await;
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body_json(response).await["code"], "INVALID_DESTINATION");
    }
}

#[tokio::test]
async fn test_repeat_destination_is_no_op() {
    let (app, seed) = common::build_test_app().await;
    let body = json!({"asset_id": seed.laptop, "to_location_id": seed.warehouse_a});
    create(&app, &seed, body.clone()).await;

    let response = post_json(app.clone(), "/api/v1/movements", Some(seed.clerk), body).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body_json(response).await["code"], "NO_OP_MOVE");

    let count = body_json(get(app, "/api/v1/movements/count").await).await;
    assert_eq!(count["data"]["count"], 1);
}

#[tokio::test]
async fn test_create_without_acting_user_returns_401() {
    let (app, seed) = common::build_test_app().await;
    let body = json!({"asset_id": seed.laptop, "to_location_id": seed.warehouse_a});

    let response = post_json(app.clone(), "/api/v1/movements", None, body).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_unknown_entities_return_404() {
    let (app, seed) = common::build_test_app().await;

    let response = post_json(
        app.clone(),
        "/api/v1/movements",
        Some(seed.clerk),
        json!({"asset_id": Uuid::now_v7(), "to_location_id": seed.warehouse_a}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = post_json(
        app.clone(),
        "/api/v1/movements",
        Some(seed.clerk),
        json!({"asset_id": seed.laptop, "to_location_id": Uuid::now_v7()}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Acting user must exist in the directory.
    let response = post_json(
        app,
        "/api/v1/movements",
        Some(Uuid::now_v7()),
        json!({"asset_id": seed.laptop, "to_location_id": seed.warehouse_a}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_body_returns_400() {
    let (app, seed) = common::build_test_app().await;
    let response = post_json(
        app,
        "/api/v1/movements",
        Some(seed.clerk),
        json!({"asset_id": "not-a-uuid"}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

// ---------------------------------------------------------------------------
// Annotations
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_get_movement_selects_requested_language_with_fallback() {
    let (app, seed) = common::build_test_app().await;
    let created = create(
        &app,
        &seed,
        json!({
            "asset_id": seed.laptop,
            "to_location_id": seed.warehouse_a,
            "annotations": [
                {"language": "en", "title": "Moved"},
                {"language": "pt-BR", "title": "Movido"},
            ],
        }),
    )
    .await;
    let id = movement_id(&created);

    let json = body_json(get(app.clone(), &format!("/api/v1/movements/{id}?lang=pt-BR")).await).await;
    assert_eq!(json["data"]["annotation"]["title"], "Movido");
    assert_eq!(json["data"]["available_languages"], json!(["en", "pt-BR"]));
    assert_eq!(json["data"]["annotations"].as_array().unwrap().len(), 2);

    let json = body_json(get(app, &format!("/api/v1/movements/{id}?lang=fr")).await).await;
    assert_eq!(json["data"]["annotation"]["title"], "Moved");
}

#[tokio::test]
async fn test_repeated_get_returns_identical_bytes() {
    let (app, seed) = common::build_test_app().await;
    let created = create(
        &app,
        &seed,
        json!({
            "asset_id": seed.laptop,
            "to_custodian_id": seed.jane,
            "annotations": [
                {"language": "en", "title": "Handed over", "notes": "Charger included"},
                {"language": "de", "title": "Übergeben"},
            ],
        }),
    )
    .await;
    let uri = format!("/api/v1/movements/{}", movement_id(&created));

    let first = get(app.clone(), &uri).await;
    assert_eq!(first.status(), StatusCode::OK);
    let first = body_bytes(first).await;
    let second = body_bytes(get(app, &uri).await).await;

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_malformed_path_and_query_return_json_400() {
    let (app, seed) = common::build_test_app().await;

    let response = get(app.clone(), "/api/v1/movements/not-a-uuid").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");

    let response = delete(app.clone(), "/api/v1/movements/42", Some(seed.clerk)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");

    let response = get(app.clone(), "/api/v1/assets/nope/movements").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");

    let uri = format!("/api/v1/movements/{}?lang=en&lang=de", Uuid::now_v7());
    let response = get(app.clone(), &uri).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");

    let response = get(app, "/api/v1/movements?limit=many").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
}

#[tokio::test]
async fn test_duplicate_annotation_language_returns_409() {
    let (app, seed) = common::build_test_app().await;
    let response = post_json(
        app.clone(),
        "/api/v1/movements",
        Some(seed.clerk),
        json!({
            "asset_id": seed.laptop,
            "to_location_id": seed.warehouse_a,
            "annotations": [
                {"language": "en", "title": "One"},
                {"language": "en", "title": "Two"},
            ],
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let count = body_json(get(app, "/api/v1/movements/count").await).await;
    assert_eq!(count["data"]["count"], 0);
}

// ---------------------------------------------------------------------------
// Amend and delete
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_amend_changes_destination_and_upserts_annotations() {
    let (app, seed) = common::build_test_app().await;
    let created = create(
        &app,
        &seed,
        json!({
            "asset_id": seed.laptop,
            "to_location_id": seed.warehouse_a,
            "annotations": [{"language": "en", "title": "Moved"}],
        }),
    )
    .await;
    let id = movement_id(&created);

    let response = put_json(
        app.clone(),
        &format!("/api/v1/movements/{id}"),
        Some(seed.clerk),
        json!({
            "to_location_id": seed.warehouse_b,
            "annotations": [
                {"language": "en", "title": "Corrected"},
                {"language": "de", "title": "Korrigiert"},
            ],
        }),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["data"]["to_location_id"], seed.warehouse_b.to_string());
    assert_eq!(json["data"]["annotation"]["title"], "Corrected");
    assert_eq!(json["data"]["annotations"].as_array().unwrap().len(), 2);

    // The asset now sits at Warehouse B, so moving it there again is a no-op.
    let response = post_json(
        app,
        "/api/v1/movements",
        Some(seed.clerk),
        json!({"asset_id": seed.laptop, "to_location_id": seed.warehouse_b}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_amend_unknown_movement_returns_404() {
    let (app, seed) = common::build_test_app().await;
    let response = put_json(
        app,
        &format!("/api/v1/movements/{}", Uuid::now_v7()),
        Some(seed.clerk),
        json!({"to_location_id": seed.warehouse_a}),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_returns_204_then_404() {
    let (app, seed) = common::build_test_app().await;
    let created = create(
        &app,
        &seed,
        json!({"asset_id": seed.laptop, "to_location_id": seed.warehouse_a}),
    )
    .await;
    let uri = format!("/api/v1/movements/{}", movement_id(&created));

    let response = delete(app.clone(), &uri, Some(seed.clerk)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = get(app.clone(), &uri).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = delete(app, &uri, Some(seed.clerk)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Listing
// ---------------------------------------------------------------------------

async fn seed_three_movements(app: &axum::Router, seed: &Seed) {
    create(
        app,
        seed,
        json!({"asset_id": seed.laptop, "to_location_id": seed.warehouse_a}),
    )
    .await;
    create(
        app,
        seed,
        json!({"asset_id": seed.laptop, "to_custodian_id": seed.jane}),
    )
    .await;
    create(
        app,
        seed,
        json!({"asset_id": seed.monitor, "to_location_id": seed.warehouse_b}),
    )
    .await;
}

#[tokio::test]
async fn test_list_paginates_and_filters() {
    let (app, seed) = common::build_test_app().await;
    seed_three_movements(&app, &seed).await;

    let json = body_json(get(app.clone(), "/api/v1/movements?limit=2&offset=0").await).await;
    assert_eq!(json["data"]["total"], 3);
    assert_eq!(json["data"]["items"].as_array().unwrap().len(), 2);

    let json = body_json(get(app.clone(), "/api/v1/movements?limit=2&offset=2").await).await;
    assert_eq!(json["data"]["items"].as_array().unwrap().len(), 1);

    let uri = format!("/api/v1/movements?asset_id={}", seed.laptop);
    let json = body_json(get(app.clone(), &uri).await).await;
    assert_eq!(json["data"]["total"], 2);

    let json = body_json(get(app.clone(), "/api/v1/movements?search=monitor").await).await;
    assert_eq!(json["data"]["total"], 1);
    assert_eq!(json["data"]["items"][0]["asset_tag"], "MONITOR-007");

    let json = body_json(get(app, "/api/v1/movements?search=sn-0001").await).await;
    assert_eq!(json["data"]["total"], 2);
}

#[tokio::test]
async fn test_list_rejects_bad_sort_and_date() {
    let (app, _) = common::build_test_app().await;

    let response = get(app.clone(), "/api/v1/movements?sort=-colour").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "VALIDATION_ERROR");

    let response = get(app, "/api/v1/movements/count?moved_from=yesterday").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_cursor_pages_cover_every_movement_once() {
    let (app, seed) = common::build_test_app().await;
    seed_three_movements(&app, &seed).await;

    let first = body_json(get(app.clone(), "/api/v1/movements/cursor?limit=2").await).await;
    let items = first["data"]["items"].as_array().unwrap().clone();
    assert_eq!(items.len(), 2);
    assert!(first["data"]["prev_cursor"].is_null());
    let next = first["data"]["next_cursor"].as_str().unwrap().to_string();
    assert_eq!(next, items[1]["id"].as_str().unwrap());

    let uri = format!("/api/v1/movements/cursor?limit=2&after={next}");
    let second = body_json(get(app.clone(), &uri).await).await;
    let rest = second["data"]["items"].as_array().unwrap().clone();
    assert_eq!(rest.len(), 1);
    assert!(second["data"]["next_cursor"].is_null());

    let ids: HashSet<_> = items
        .iter()
        .chain(rest.iter())
        .map(|m| m["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids.len(), 3);

    let uri = format!(
        "/api/v1/movements/cursor?before={}&after={}",
        next, next
    );
    let response = get(app.clone(), &uri).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let uri = format!("/api/v1/movements/cursor?after={}", Uuid::now_v7());
    let response = get(app, &uri).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_asset_history() {
    let (app, seed) = common::build_test_app().await;
    seed_three_movements(&app, &seed).await;

    let uri = format!("/api/v1/assets/{}/movements", seed.laptop);
    let json = body_json(get(app.clone(), &uri).await).await;
    let history = json["data"].as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert!(history
        .iter()
        .all(|m| m["asset_id"] == seed.laptop.to_string()));

    let uri = format!("/api/v1/assets/{}/movements", Uuid::now_v7());
    let response = get(app, &uri).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ---------------------------------------------------------------------------
// Statistics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_statistics_reflect_recorded_movements() {
    let (app, seed) = common::build_test_app().await;

    let empty = body_json(get(app.clone(), "/api/v1/movements/statistics").await).await;
    assert_eq!(empty["data"]["total"]["count"], 0);
    assert_eq!(empty["data"]["summary"]["avg_per_asset"], 0.0);

    seed_three_movements(&app, &seed).await;

    let json = body_json(get(app, "/api/v1/movements/statistics").await).await;
    let stats = &json["data"];
    assert_eq!(stats["total"]["count"], 3);
    assert_eq!(stats["by_movement_type"]["new_asset"], 2);
    assert_eq!(stats["by_movement_type"]["location_to_user"], 1);
    assert_eq!(stats["by_asset"][0]["asset_tag"], "LAPTOP-001");
    assert_eq!(stats["by_asset"][0]["count"], 2);
    assert_eq!(stats["summary"]["today"], 3);
    assert_eq!(stats["summary"]["unique_assets"], 2);
    assert_eq!(stats["summary"]["avg_per_asset"], 1.5);
    assert_eq!(stats["recent"].as_array().unwrap().len(), 3);
}
