//! Integration tests for the sync orchestrator.
//!
//! These tests drive the real SyncOrchestrator against the in-memory store
//! and index service (MockSyncStore and MockSearchIndex) to check the
//! properties every pass must keep: idempotence, completeness, deletion
//! correctness, swap atomicity, batching and failure non-advancement.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde_json::json;

use search_sync::orchestrator::{OrchestratorConfig, SyncOrchestrator, SyncPhase};
use search_sync::waiter::BackoffPolicy;
use search_sync::SyncError;
use search_sync_repository::{MockSearchIndex, MockSyncStore};
use search_sync_shared::{EntityType, IndexDocument, IndexableEntity, SyncMode};

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap()
}

fn article(id: i64, at: DateTime<Utc>) -> IndexableEntity {
    IndexableEntity::new(id, at, at)
        .with_column("title", format!("Article {}", id))
        .with_column("nsfw", false)
        .with_column("userId", 1)
}

fn image(id: i64, at: DateTime<Utc>) -> IndexableEntity {
    IndexableEntity::new(id, at, at)
        .with_column("url", format!("https://cdn.example/{}.jpeg", id))
        .with_column("nsfw", false)
        .with_column("userId", 1)
}

struct Harness {
    store: Arc<MockSyncStore>,
    index: Arc<MockSearchIndex>,
    orchestrator: SyncOrchestrator,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(OrchestratorConfig {
            task_max_retries: 3,
            backoff: BackoffPolicy::Fixed(Duration::from_millis(500)),
            ..OrchestratorConfig::default()
        })
    }

    fn with_config(config: OrchestratorConfig) -> Self {
        let store = Arc::new(MockSyncStore::new(t0()));
        let index = Arc::new(MockSearchIndex::new());
        let orchestrator = SyncOrchestrator::new(store.clone(), index.clone(), config);
        Self {
            store,
            index,
            orchestrator,
        }
    }

    fn seed_articles(&self, ids: impl IntoIterator<Item = i64>, at: DateTime<Utc>) {
        for id in ids {
            self.store.upsert_entity(EntityType::Articles, article(id, at));
        }
    }

    fn title(&self, uid: &str, id: i64) -> Option<serde_json::Value> {
        self.index
            .document(uid, id)
            .and_then(|document| document.get("title").cloned())
    }
}

#[tokio::test]
async fn test_second_run_without_changes_is_a_no_op() {
    let harness = Harness::new();
    harness.seed_articles(1..=3, t0() - chrono::Duration::hours(1));

    let first = harness
        .orchestrator
        .run(EntityType::Articles, SyncMode::Incremental)
        .await
        .unwrap();
    assert_eq!(first.documents_indexed, 3);
    let batches_after_first = harness.index.document_batches().len();

    harness.store.advance_clock(chrono::Duration::minutes(5));
    let second = harness
        .orchestrator
        .run(EntityType::Articles, SyncMode::Incremental)
        .await
        .unwrap();

    assert_eq!(second.documents_indexed, 0);
    assert_eq!(harness.index.document_batches().len(), batches_after_first);
    assert_eq!(harness.index.document_ids("articles"), vec![1, 2, 3]);
    assert_eq!(
        harness.store.watermark(EntityType::Articles),
        Some(t0() + chrono::Duration::minutes(5))
    );
}

#[tokio::test]
async fn test_entity_updated_after_watermark_is_indexed_next_run() {
    let harness = Harness::new();
    harness.seed_articles(1..=2, t0() - chrono::Duration::hours(1));
    harness
        .orchestrator
        .run(EntityType::Articles, SyncMode::Incremental)
        .await
        .unwrap();
    assert_eq!(harness.store.watermark(EntityType::Articles), Some(t0()));

    harness
        .store
        .upsert_entity(EntityType::Articles, article(42, t0() + chrono::Duration::seconds(1)));
    harness.store.advance_clock(chrono::Duration::minutes(1));

    let report = harness
        .orchestrator
        .run(EntityType::Articles, SyncMode::Incremental)
        .await
        .unwrap();

    assert_eq!(report.documents_indexed, 1);
    assert_eq!(harness.index.document_ids("articles"), vec![1, 2, 42]);
}

#[tokio::test]
async fn test_dirty_entity_is_reindexed_despite_old_timestamps() {
    let harness = Harness::new();
    let old = t0() - chrono::Duration::days(1);
    harness.seed_articles(1..=3, old);
    harness
        .orchestrator
        .run(EntityType::Articles, SyncMode::Incremental)
        .await
        .unwrap();

    // A metrics change does not touch updatedAt; the mutation hook enqueues the id.
    harness.store.upsert_entity(
        EntityType::Articles,
        article(2, old).with_column("title", "Renamed"),
    );
    harness.store.advance_clock(chrono::Duration::minutes(1));
    harness.store.enqueue_dirty(EntityType::Articles, 2);
    harness.store.enqueue_dirty(EntityType::Articles, 2);

    let report = harness
        .orchestrator
        .run(EntityType::Articles, SyncMode::Incremental)
        .await
        .unwrap();

    assert_eq!(report.documents_indexed, 1);
    assert_eq!(harness.title("articles", 2), Some(json!("Renamed")));
    assert!(harness.store.dirty_ids(EntityType::Articles).is_empty());
}

#[tokio::test]
async fn test_dirty_rows_enqueued_after_snapshot_survive() {
    let harness = Harness::new();
    harness.seed_articles(1..=2, t0() - chrono::Duration::hours(1));
    harness.store.enqueue_dirty(EntityType::Articles, 1);
    harness.store.enqueue_dirty_at(
        EntityType::Articles,
        2,
        t0() + chrono::Duration::milliseconds(1),
    );

    harness
        .orchestrator
        .run(EntityType::Articles, SyncMode::Incremental)
        .await
        .unwrap();

    assert_eq!(harness.store.dirty_ids(EntityType::Articles), vec![2]);
}

#[tokio::test]
async fn test_deleted_and_unpublished_entities_are_removed() {
    let harness = Harness::new();
    harness.seed_articles(1..=3, t0() - chrono::Duration::hours(1));
    harness
        .orchestrator
        .run(EntityType::Articles, SyncMode::Incremental)
        .await
        .unwrap();

    harness.store.remove_entity(EntityType::Articles, 2);
    harness.store.enqueue_deletion(EntityType::Articles, 2);
    harness.store.upsert_ineligible_entity(
        EntityType::Articles,
        article(3, t0() + chrono::Duration::seconds(1)),
    );
    harness.store.enqueue_deletion(EntityType::Articles, 3);
    harness.store.advance_clock(chrono::Duration::minutes(1));

    let report = harness
        .orchestrator
        .run(EntityType::Articles, SyncMode::Incremental)
        .await
        .unwrap();

    assert_eq!(report.documents_deleted, 2);
    assert_eq!(report.documents_indexed, 0);
    assert_eq!(harness.index.document_ids("articles"), vec![1]);
    assert!(harness.store.deletion_ids(EntityType::Articles).is_empty());
}

#[tokio::test]
async fn test_full_rebuild_replaces_live_index() {
    let harness = Harness::new();
    harness
        .index
        .seed_index("articles", "id", vec![IndexDocument::new(99)]);
    harness.seed_articles(1..=2, t0() - chrono::Duration::hours(1));

    let report = harness
        .orchestrator
        .run(EntityType::Articles, SyncMode::FullRebuild)
        .await
        .unwrap();

    assert_eq!(report.mode, SyncMode::FullRebuild);
    assert_eq!(report.documents_indexed, 2);
    assert_eq!(harness.index.document_ids("articles"), vec![1, 2]);
    assert!(!harness.index.has_index("articles_new"));
    assert_eq!(
        harness.index.swaps(),
        vec![("articles".to_string(), "articles_new".to_string())]
    );
    // Every document was written to the shadow, never to the live index.
    assert!(harness
        .index
        .document_batches()
        .iter()
        .all(|(uid, _)| uid == "articles_new"));
}

#[tokio::test]
async fn test_full_rebuild_ignores_watermark() {
    let harness = Harness::new();
    harness.seed_articles(1..=2, t0() - chrono::Duration::hours(1));
    harness
        .orchestrator
        .run(EntityType::Articles, SyncMode::Incremental)
        .await
        .unwrap();
    harness.store.advance_clock(chrono::Duration::minutes(1));

    let report = harness
        .orchestrator
        .run(EntityType::Articles, SyncMode::FullRebuild)
        .await
        .unwrap();

    assert_eq!(report.documents_indexed, 2);
}

#[tokio::test]
async fn test_rejected_batch_during_rebuild_leaves_live_index_untouched() {
    let harness = Harness::new();
    harness
        .index
        .seed_index("articles", "id", vec![IndexDocument::new(99)]);
    harness.seed_articles(1..=2, t0() - chrono::Duration::hours(1));
    harness.index.reject_document_batches(&[2]);

    let err = harness
        .orchestrator
        .run(EntityType::Articles, SyncMode::FullRebuild)
        .await
        .unwrap_err();

    assert_eq!(err.phase, SyncPhase::SyncLoop);
    match &err.source {
        SyncError::TerminalTaskFailure {
            index_uid,
            batch_ids,
            ..
        } => {
            assert_eq!(index_uid.as_deref(), Some("articles_new"));
            assert_eq!(batch_ids, &vec![1, 2]);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(harness.index.document_ids("articles"), vec![99]);
    assert!(harness.index.swaps().is_empty());
    assert_eq!(harness.store.watermark(EntityType::Articles), None);
}

#[tokio::test]
async fn test_failed_swap_leaves_live_index_untouched() {
    let harness = Harness::new();
    harness
        .index
        .seed_index("articles", "id", vec![IndexDocument::new(99)]);
    harness.seed_articles(1..=2, t0() - chrono::Duration::hours(1));
    harness.index.fail_swap();

    let err = harness
        .orchestrator
        .run(EntityType::Articles, SyncMode::FullRebuild)
        .await
        .unwrap_err();

    assert_eq!(err.phase, SyncPhase::Swap);
    assert_eq!(err.offset, 2);
    assert_eq!(harness.index.document_ids("articles"), vec![99]);
    assert_eq!(harness.store.watermark(EntityType::Articles), None);

    // The next rebuild starts from a fresh shadow and succeeds.
    harness.index.heal();
    harness
        .orchestrator
        .run(EntityType::Articles, SyncMode::FullRebuild)
        .await
        .unwrap();
    assert_eq!(harness.index.document_ids("articles"), vec![1, 2]);
}

#[tokio::test]
async fn test_57_entities_are_written_in_batches_of_25_25_7() {
    let harness = Harness::new();
    harness.seed_articles(1..=57, t0() - chrono::Duration::hours(1));

    let report = harness
        .orchestrator
        .run(EntityType::Articles, SyncMode::Incremental)
        .await
        .unwrap();

    assert_eq!(report.pages, 1);
    let sizes: Vec<usize> = harness
        .index
        .document_batches()
        .iter()
        .map(|(_, ids)| ids.len())
        .collect();
    assert_eq!(sizes, vec![25, 25, 7]);
}

#[tokio::test]
async fn test_pages_advance_by_page_length() {
    let harness = Harness::with_config(OrchestratorConfig {
        read_batch_size: 10,
        ..OrchestratorConfig::default()
    });
    harness.seed_articles(1..=25, t0() - chrono::Duration::hours(1));

    let report = harness
        .orchestrator
        .run(EntityType::Articles, SyncMode::Incremental)
        .await
        .unwrap();

    assert_eq!(report.pages, 3);
    let offsets: Vec<i64> = harness
        .store
        .fetch_calls()
        .iter()
        .map(|call| call.offset)
        .collect();
    assert_eq!(offsets, vec![0, 10, 20, 25]);
}

#[tokio::test(start_paused = true)]
async fn test_stalled_tasks_do_not_advance_watermark() {
    let harness = Harness::new();
    harness.seed_articles(1..=2, t0() - chrono::Duration::hours(1));
    harness
        .orchestrator
        .run(EntityType::Articles, SyncMode::Incremental)
        .await
        .unwrap();

    harness.seed_articles([5], t0() + chrono::Duration::seconds(1));
    harness.store.enqueue_dirty(EntityType::Articles, 1);
    harness.store.advance_clock(chrono::Duration::minutes(1));
    harness.index.stall_tasks();

    let err = harness
        .orchestrator
        .run(EntityType::Articles, SyncMode::Incremental)
        .await
        .unwrap_err();

    assert_eq!(err.phase, SyncPhase::SyncLoop);
    assert!(matches!(err.source, SyncError::TransientIndex(_)));
    assert!(err.is_retryable());
    assert_eq!(harness.store.watermark(EntityType::Articles), Some(t0()));
    assert_eq!(harness.store.dirty_ids(EntityType::Articles), vec![1]);

    harness.index.heal();
    let report = harness
        .orchestrator
        .run(EntityType::Articles, SyncMode::Incremental)
        .await
        .unwrap();

    assert_eq!(report.documents_indexed, 2);
    assert_eq!(
        harness.store.watermark(EntityType::Articles),
        Some(t0() + chrono::Duration::minutes(1))
    );
    assert!(harness.store.dirty_ids(EntityType::Articles).is_empty());
}

#[tokio::test]
async fn test_failed_submission_keeps_watermark_and_dirty_queue() {
    let harness = Harness::new();
    harness.seed_articles(1..=30, t0() - chrono::Duration::hours(1));
    harness.store.enqueue_dirty(EntityType::Articles, 3);
    // The first sub-batch is accepted, the second request fails.
    harness.index.fail_add_documents_on_call(2);

    let err = harness
        .orchestrator
        .run(EntityType::Articles, SyncMode::Incremental)
        .await
        .unwrap_err();

    assert_eq!(err.phase, SyncPhase::SyncLoop);
    assert_eq!(err.offset, 0);
    assert!(matches!(err.source, SyncError::TransientIndex(_)));
    assert_eq!(harness.store.watermark(EntityType::Articles), None);
    assert_eq!(harness.store.dirty_ids(EntityType::Articles), vec![3]);
    assert_eq!(
        harness.index.document_ids("articles"),
        (1..=25).collect::<Vec<i64>>()
    );

    harness.index.heal();
    let report = harness
        .orchestrator
        .run(EntityType::Articles, SyncMode::Incremental)
        .await
        .unwrap();

    assert_eq!(report.documents_indexed, 30);
    assert_eq!(harness.store.watermark(EntityType::Articles), Some(t0()));
    assert!(harness.store.dirty_ids(EntityType::Articles).is_empty());
}

#[tokio::test]
async fn test_terminal_failure_names_the_rejected_batch() {
    let harness = Harness::new();
    harness.seed_articles(1..=30, t0() - chrono::Duration::hours(1));
    harness.index.reject_document_batches(&[27]);

    let err = harness
        .orchestrator
        .run(EntityType::Articles, SyncMode::Incremental)
        .await
        .unwrap_err();

    assert!(!err.is_retryable());
    assert_eq!(err.offset, 0);
    assert!(err
        .to_string()
        .starts_with("articles sync failed during sync at offset 0"));
    match err.source {
        SyncError::TerminalTaskFailure { batch_ids, .. } => {
            assert_eq!(batch_ids, (26..=30).collect::<Vec<i64>>());
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_pass_for_same_entity_type_is_rejected() {
    let harness = Harness::new();
    harness.seed_articles(1..=2, t0() - chrono::Duration::hours(1));
    // Keep the first pass suspended in its first task wait.
    harness.index.set_pending_polls(1);

    let results = harness
        .orchestrator
        .run_all(&[EntityType::Articles, EntityType::Articles], SyncMode::Incremental)
        .await;

    assert!(results[0].is_ok());
    let err = results[1].as_ref().unwrap_err();
    assert!(matches!(err.source, SyncError::AlreadyRunning(EntityType::Articles)));
    assert_eq!(err.phase, SyncPhase::Setup);
}

#[tokio::test]
async fn test_one_entity_type_failing_does_not_affect_others() {
    let harness = Harness::with_config(OrchestratorConfig {
        read_batch_size: 2,
        ..OrchestratorConfig::default()
    });
    harness.seed_articles(1..=3, t0() - chrono::Duration::hours(1));
    harness
        .store
        .upsert_entity(EntityType::Images, image(1, t0() - chrono::Duration::hours(1)));
    // Only the articles pass reads a second page.
    harness.store.fail_fetch_at_offset(2);

    let results = harness
        .orchestrator
        .run_all(&EntityType::ALL, SyncMode::Incremental)
        .await;

    let articles = results[0].as_ref().unwrap_err();
    assert_eq!(articles.entity_type, EntityType::Articles);
    assert_eq!(articles.offset, 2);
    assert!(matches!(articles.source, SyncError::StoreRead(_)));

    assert_eq!(results[1].as_ref().unwrap().documents_indexed, 1);
    assert_eq!(results[2].as_ref().unwrap().documents_indexed, 0);

    assert_eq!(harness.store.watermark(EntityType::Articles), None);
    assert_eq!(harness.store.watermark(EntityType::Images), Some(t0()));
    assert_eq!(harness.index.document_ids("images"), vec![1]);
}
