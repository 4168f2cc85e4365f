//! Integration tests for the Postgres movement ledger.
//!
//! Exercises `PgMovementLedger` and `PgDirectory` against a real database:
//! - Append with source derivation and asset state update
//! - Compare-and-set conflicts on a stale source
//! - Annotation round trip, upsert and duplicate rejection
//! - Cursor pagination across the composite key
//! - Delete cascade
//!
//! Requires `DATABASE_URL`; each test runs in its own migrated database.

use std::collections::HashSet;

use assert_matches::assert_matches;
use sqlx::PgPool;
use custody_core::annotation::AnnotationInput;
use custody_core::error::CoreError;
use custody_core::ledger::MovementLedger;
use custody_core::listing::{CursorRequest, MovementQuery, PageRequest};
use custody_core::movement::{ApprovedTransfer, Destination};
use custody_core::types::EntityId;
use custody_core::validator::{AssetStateProvider, MovementValidator, TransferRequest};
use custody_db::models::directory::CreateAsset;
use custody_db::repositories::{AssetRepo, LocationRepo, UserRepo};
use custody_db::{PgDirectory, PgMovementLedger};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

struct Fixture {
    ledger: PgMovementLedger,
    directory: PgDirectory,
    asset: EntityId,
    l1: EntityId,
    l2: EntityId,
    u1: EntityId,
    actor: EntityId,
}

async fn fixture(pool: &PgPool) -> Fixture {
    let asset = AssetRepo::create(
        pool,
        &CreateAsset {
            tag: "LAPTOP-001".to_string(),
            serial_number: Some("SN-0001".to_string()),
        },
    )
    .await
    .unwrap();
    let l1 = LocationRepo::create(pool, "Warehouse A").await.unwrap();
    let l2 = LocationRepo::create(pool, "Warehouse B").await.unwrap();
    let u1 = UserRepo::create(pool, "Jane Doe").await.unwrap();
    let actor = UserRepo::create(pool, "Clerk").await.unwrap();

    Fixture {
        ledger: PgMovementLedger::new(pool.clone()),
        directory: PgDirectory::new(pool.clone()),
        asset: asset.id,
        l1: l1.id,
        l2: l2.id,
        u1: u1.id,
        actor: actor.id,
    }
}

impl Fixture {
    async fn transfer(
        &self,
        asset: EntityId,
        destination: Destination,
        annotations: &[AnnotationInput],
    ) -> Result<custody_core::movement::MovementEntry, CoreError> {
        let validator = MovementValidator::new(&self.directory, &self.directory);
        let approved = validator
            .validate(&TransferRequest {
                asset_id: asset,
                to_location_id: destination.location_id(),
                to_custodian_id: destination.custodian_id(),
                moved_by: self.actor,
            })
            .await?;
        self.ledger.append(approved, annotations).await
    }
}

fn note(lang: &str, title: &str) -> AnnotationInput {
    AnnotationInput {
        language: lang.to_string(),
        title: Some(title.to_string()),
        notes: None,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_append_derives_source_and_moves_asset(pool: PgPool) {
    let f = fixture(&pool).await;

    let first = f
        .transfer(f.asset, Destination::Location(f.l1), &[])
        .await
        .unwrap();
    assert_eq!(first.record.from_location_id, None);
    assert_eq!(first.labels.asset_tag, "LAPTOP-001");
    assert_eq!(first.labels.to_location_name.as_deref(), Some("Warehouse A"));

    assert_matches!(
        f.transfer(f.asset, Destination::Location(f.l1), &[]).await,
        Err(CoreError::NoOpMove { .. })
    );

    let third = f
        .transfer(f.asset, Destination::Custodian(f.u1), &[])
        .await
        .unwrap();
    assert_eq!(third.record.from_location_id, Some(f.l1));

    let state = f.directory.current_state(f.asset).await.unwrap();
    assert_eq!(state.custodian_id, Some(f.u1));
    assert_eq!(state.location_id, None);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_stale_source_conflicts(pool: PgPool) {
    let f = fixture(&pool).await;
    let validator = MovementValidator::new(&f.directory, &f.directory);
    let stale = validator
        .validate(&TransferRequest {
            asset_id: f.asset,
            to_location_id: Some(f.l1),
            to_custodian_id: None,
            moved_by: f.actor,
        })
        .await
        .unwrap();

    f.transfer(f.asset, Destination::Location(f.l2), &[])
        .await
        .unwrap();

    assert_matches!(
        f.ledger.append(stale, &[]).await,
        Err(CoreError::Conflict(_))
    );
    assert_eq!(f.ledger.count(&MovementQuery::default()).await.unwrap(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_annotations_round_trip_and_upsert(pool: PgPool) {
    let f = fixture(&pool).await;
    let entry = f
        .transfer(
            f.asset,
            Destination::Location(f.l1),
            &[note("en", "Moved"), note("pt-BR", "Movido")],
        )
        .await
        .unwrap();
    assert_eq!(entry.annotations.len(), 2);

    let amended = f
        .ledger
        .amend_destination(entry.record.id, None, &[note("en", "Corrected"), note("de", "Neu")])
        .await
        .unwrap();
    let titles: Vec<_> = amended
        .annotations
        .iter()
        .map(|a| (a.language.as_str(), a.title.as_deref()))
        .collect();
    assert!(titles.contains(&("en", Some("Corrected"))));
    assert!(titles.contains(&("pt-BR", Some("Movido"))));
    assert!(titles.contains(&("de", Some("Neu"))));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_amend_latest_moves_asset(pool: PgPool) {
    let f = fixture(&pool).await;
    let entry = f
        .transfer(f.asset, Destination::Location(f.l1), &[])
        .await
        .unwrap();

    let amended = f
        .ledger
        .amend_destination(entry.record.id, Some(Destination::Location(f.l2)), &[])
        .await
        .unwrap();
    assert_eq!(amended.record.destination, Destination::Location(f.l2));
    assert_eq!(amended.record.from_location_id, None);

    let state = f.directory.current_state(f.asset).await.unwrap();
    assert_eq!(state.location_id, Some(f.l2));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_cursor_pages_cover_all_rows(pool: PgPool) {
    let f = fixture(&pool).await;
    for i in 0..5 {
        let asset = AssetRepo::create(
            &pool,
            &CreateAsset {
                tag: format!("A-{i}"),
                serial_number: None,
            },
        )
        .await
        .unwrap();
        f.transfer(asset.id, Destination::Location(f.l1), &[])
            .await
            .unwrap();
        f.transfer(asset.id, Destination::Custodian(f.u1), &[])
            .await
            .unwrap();
    }

    let query = MovementQuery::default();
    let mut seen = Vec::new();
    let mut after = None;
    loop {
        let page = f
            .ledger
            .list_by_cursor(&query, CursorRequest::new(None, after, Some(4)).unwrap())
            .await
            .unwrap();
        seen.extend(page.items.iter().map(|e| (e.record.moved_at, e.record.id)));
        match page.next_cursor {
            Some(next) => after = Some(next),
            None => break,
        }
    }

    assert_eq!(seen.len(), 10);
    assert!(seen.windows(2).all(|w| w[0] > w[1]));

    let page = f
        .ledger
        .list_paginated(&query, PageRequest::new(Some(3), Some(9)))
        .await
        .unwrap();
    assert_eq!(page.total, 10);
    assert_eq!(page.items.len(), 1);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_cursor_breaks_shared_timestamps_by_id(pool: PgPool) {
    let f = fixture(&pool).await;
    let moved_at = chrono::Utc::now();
    for i in 0..10 {
        let asset = AssetRepo::create(
            &pool,
            &CreateAsset {
                tag: format!("T-{i}"),
                serial_number: None,
            },
        )
        .await
        .unwrap();
        let approved = ApprovedTransfer {
            asset_id: asset.id,
            from_location_id: None,
            from_custodian_id: None,
            destination: Destination::Location(f.l1),
            moved_by: f.actor,
            moved_at,
        };
        f.ledger.append(approved, &[]).await.unwrap();
    }

    let query = MovementQuery::default();
    let mut forward = Vec::new();
    let mut after = None;
    let mut last_page_first = None;
    loop {
        let page = f
            .ledger
            .list_by_cursor(&query, CursorRequest::new(None, after, Some(3)).unwrap())
            .await
            .unwrap();
        last_page_first = page.items.first().map(|e| e.record.id);
        forward.extend(page.items.iter().map(|e| e.record.id));
        match page.next_cursor {
            Some(next) => after = Some(next),
            None => break,
        }
    }

    assert_eq!(forward.len(), 10);
    assert_eq!(forward.iter().collect::<HashSet<_>>().len(), 10);
    assert!(forward.windows(2).all(|w| w[0] > w[1]));

    let mut backward = Vec::new();
    let mut before = last_page_first;
    while let Some(boundary) = before {
        let page = f
            .ledger
            .list_by_cursor(&query, CursorRequest::new(Some(boundary), None, Some(3)).unwrap())
            .await
            .unwrap();
        let mut ids: Vec<_> = page.items.iter().map(|e| e.record.id).collect();
        ids.extend(backward);
        backward = ids;
        before = page.prev_cursor;
    }

    let newer: Vec<_> = forward
        .iter()
        .copied()
        .take_while(|id| Some(*id) != last_page_first)
        .collect();
    assert_eq!(backward, newer);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_search_matches_serial_case_insensitively(pool: PgPool) {
    let f = fixture(&pool).await;
    f.transfer(f.asset, Destination::Location(f.l1), &[])
        .await
        .unwrap();

    let query = MovementQuery {
        search: Some("sn-00".into()),
        ..Default::default()
    };
    assert_eq!(f.ledger.count(&query).await.unwrap(), 1);

    let miss = MovementQuery {
        search: Some("printer".into()),
        ..Default::default()
    };
    assert_eq!(f.ledger.count(&miss).await.unwrap(), 0);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_remove_cascades_annotations(pool: PgPool) {
    let f = fixture(&pool).await;
    let entry = f
        .transfer(f.asset, Destination::Location(f.l1), &[note("en", "x")])
        .await
        .unwrap();

    f.ledger.remove(entry.record.id).await.unwrap();
    assert!(f.ledger.get_by_id(entry.record.id).await.unwrap().is_none());

    let orphans: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM movement_annotations")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(orphans.0, 0);

    assert_matches!(
        f.ledger.remove(entry.record.id).await,
        Err(CoreError::NotFound { .. })
    );
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn test_health_check(pool: PgPool) {
    custody_db::health_check(&pool).await.unwrap();
}
