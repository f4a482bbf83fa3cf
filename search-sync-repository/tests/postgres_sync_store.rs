//! Integration tests for the PostgreSQL sync store.
//!
//! These tests require a real PostgreSQL database (`DATABASE_URL`) and use
//! SQLx test macros for isolation and cleanup.
//!
//! Run with: `cargo test --test postgres_sync_store -- --ignored`

use chrono::{Duration, TimeZone, Utc};
use search_sync_repository::{FetchFilter, PostgresSyncStore, SyncStore};
use search_sync_shared::{EntityType, SyncWatermark};
use serde_json::json;
use std::collections::BTreeSet;

async fn seed_models(pool: &sqlx::PgPool) {
    sqlx::query(
        r#"INSERT INTO "Model" (id, name, type, "userId", status, "createdAt", "updatedAt") VALUES
            (1, 'Published', 'Checkpoint', 10, 'Published', '2024-01-01 00:00:00', '2024-01-01 00:00:00'),
            (2, 'Draft', 'Checkpoint', 10, 'Draft', '2024-01-01 00:00:00', '2024-06-01 00:00:00'),
            (3, 'Updated', 'LORA', 11, 'Published', '2024-01-01 00:00:00', '2024-06-01 00:00:00')"#,
    )
    .execute(pool)
    .await
    .unwrap();

    sqlx::query(r#"INSERT INTO "Tag" (id, name) VALUES (1, 'anime'), (2, 'portrait')"#)
        .execute(pool)
        .await
        .unwrap();
    sqlx::query(r#"INSERT INTO "TagsOnModels" ("modelId", "tagId") VALUES (1, 2), (1, 1)"#)
        .execute(pool)
        .await
        .unwrap();
    sqlx::query(
        r#"INSERT INTO "ModelMetric" ("modelId", timeframe, "downloadCount", rating)
        VALUES (1, 'AllTime', 120, 4.5), (1, 'Week', 3, 5)"#,
    )
    .execute(pool)
    .await
    .unwrap();
}

// ============================================================================
// Entity Reads
// ============================================================================

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore = "requires PostgreSQL"]
async fn test_full_scan_applies_inclusion_predicate(pool: sqlx::PgPool) {
    seed_models(&pool).await;
    let store = PostgresSyncStore::new(pool);

    let page = store
        .fetch_entities(EntityType::Models, &FetchFilter::full_scan(), 0, 1000)
        .await
        .unwrap();

    let ids: Vec<i64> = page.iter().map(|entity| entity.id).collect();
    assert_eq!(ids, vec![1, 3]);

    let first = &page[0];
    assert_eq!(first.columns["name"], json!("Published"));
    assert_eq!(first.tags.iter().map(|t| t.name.as_str()).collect::<Vec<_>>(), vec!["anime", "portrait"]);
    let all_time = first.all_time_metrics().unwrap();
    assert_eq!(all_time.values["downloadCount"], json!(120));
    assert!(!all_time.values.contains_key("modelId"));
}

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore = "requires PostgreSQL"]
async fn test_incremental_filter_and_dirty_ids(pool: sqlx::PgPool) {
    seed_models(&pool).await;
    let store = PostgresSyncStore::new(pool);
    let watermark = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();

    let changed = store
        .fetch_entities(
            EntityType::Models,
            &FetchFilter::incremental(watermark, BTreeSet::new()),
            0,
            1000,
        )
        .await
        .unwrap();
    assert_eq!(changed.iter().map(|e| e.id).collect::<Vec<_>>(), vec![3]);

    // Dirty membership never relaxes the inclusion predicate: 2 is a draft.
    let with_dirty = store
        .fetch_entities(
            EntityType::Models,
            &FetchFilter::incremental(watermark, BTreeSet::from([1, 2])),
            0,
            1000,
        )
        .await
        .unwrap();
    assert_eq!(with_dirty.iter().map(|e| e.id).collect::<Vec<_>>(), vec![1, 3]);
}

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore = "requires PostgreSQL"]
async fn test_paging_is_ordered_by_id(pool: sqlx::PgPool) {
    seed_models(&pool).await;
    let store = PostgresSyncStore::new(pool);

    let first = store
        .fetch_entities(EntityType::Models, &FetchFilter::full_scan(), 0, 1)
        .await
        .unwrap();
    let second = store
        .fetch_entities(EntityType::Models, &FetchFilter::full_scan(), 1, 1)
        .await
        .unwrap();
    let third = store
        .fetch_entities(EntityType::Models, &FetchFilter::full_scan(), 2, 1)
        .await
        .unwrap();

    assert_eq!(first[0].id, 1);
    assert_eq!(second[0].id, 3);
    assert!(third.is_empty());
}

// ============================================================================
// Queue, Ledger and Watermark
// ============================================================================

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore = "requires PostgreSQL"]
async fn test_dirty_queue_snapshot_and_bounded_removal(pool: sqlx::PgPool) {
    sqlx::query(
        r#"INSERT INTO "SearchIndexUpdateQueue" (type, id, action, "createdAt") VALUES
            ('models', 5, 'Update', '2024-01-01 00:00:00'),
            ('models', 5, 'Update', '2024-01-02 00:00:00'),
            ('models', 6, 'Update', '2024-02-01 00:00:00'),
            ('models', 7, 'Delete', '2024-01-01 00:00:00'),
            ('images', 5, 'Update', '2024-01-01 00:00:00')"#,
    )
    .execute(&pool)
    .await
    .unwrap();
    let store = PostgresSyncStore::new(pool);
    let snapshot = Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap();

    let entries = store.dirty_queue(EntityType::Models, snapshot).await.unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries.iter().all(|entry| entry.id == 5));

    let removed = store
        .remove_dirty_entries(EntityType::Models, &[5, 6], snapshot)
        .await
        .unwrap();
    assert_eq!(removed, 2);

    // Row 6 was enqueued after the snapshot and survives.
    let later = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let remaining = store.dirty_queue(EntityType::Models, later).await.unwrap();
    assert_eq!(remaining.iter().map(|e| e.id).collect::<Vec<_>>(), vec![6]);
}

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore = "requires PostgreSQL"]
async fn test_pending_deletions_round_trip(pool: sqlx::PgPool) {
    sqlx::query(
        r#"INSERT INTO "SearchIndexUpdateQueue" (type, id, action) VALUES
            ('articles', 9, 'Delete'), ('articles', 9, 'Delete'), ('articles', 10, 'Update')"#,
    )
    .execute(&pool)
    .await
    .unwrap();
    let store = PostgresSyncStore::new(pool);

    let pending = store.pending_deletions(EntityType::Articles).await.unwrap();
    assert_eq!(pending.len(), 2);

    let removed = store
        .remove_pending_deletions(EntityType::Articles, &[9])
        .await
        .unwrap();
    assert_eq!(removed, 2);
    assert!(store.pending_deletions(EntityType::Articles).await.unwrap().is_empty());
}

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore = "requires PostgreSQL"]
async fn test_writes_after_snapshot_stay_visible_despite_rounding(pool: sqlx::PgPool) {
    let store = PostgresSyncStore::new(pool.clone());
    let started_at = store.now().await.unwrap();
    assert_eq!(started_at.timestamp_subsec_micros() % 1000, 0);

    let database_now: chrono::DateTime<Utc> = sqlx::query_scalar("SELECT now()")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert!(started_at < database_now);

    // Written after the snapshot, rounded into the snapshot's millisecond at worst.
    sqlx::query(
        r#"INSERT INTO "Model" (id, name, type, "userId", status) VALUES (4, 'Late', 'LORA', 12, 'Published')"#,
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(r#"INSERT INTO "SearchIndexUpdateQueue" (type, id, action) VALUES ('models', 4, 'Update')"#)
        .execute(&pool)
        .await
        .unwrap();

    store
        .set_watermark(&SyncWatermark {
            entity_type: EntityType::Models,
            last_updated_at: started_at,
        })
        .await
        .unwrap();
    let watermark = store.get_watermark(EntityType::Models).await.unwrap().unwrap();
    assert_eq!(watermark.last_updated_at, started_at);

    let page = store
        .fetch_entities(
            EntityType::Models,
            &FetchFilter::incremental(watermark.last_updated_at, BTreeSet::new()),
            0,
            1000,
        )
        .await
        .unwrap();
    assert_eq!(page.iter().map(|e| e.id).collect::<Vec<_>>(), vec![4]);

    let snapshot = store.dirty_queue(EntityType::Models, started_at).await.unwrap();
    assert!(snapshot.is_empty());
}

#[sqlx::test(migrations = "src/postgres/migrations")]
#[ignore = "requires PostgreSQL"]
async fn test_watermark_never_moves_backwards(pool: sqlx::PgPool) {
    let store = PostgresSyncStore::new(pool);
    assert!(store.get_watermark(EntityType::Images).await.unwrap().is_none());

    let now = store.now().await.unwrap();
    let watermark = SyncWatermark {
        entity_type: EntityType::Images,
        last_updated_at: now,
    };
    store.set_watermark(&watermark).await.unwrap();
    store
        .set_watermark(&SyncWatermark {
            last_updated_at: now - Duration::hours(1),
            ..watermark
        })
        .await
        .unwrap();

    let stored = store.get_watermark(EntityType::Images).await.unwrap().unwrap();
    assert_eq!(stored.last_updated_at.timestamp_millis(), now.timestamp_millis());
}
