//! Behavioural tests for the in-memory registry and task queue.
//!
//! The Postgres implementations run the same scenarios in `postgres_test.rs`
//! when `DATABASE_URL` is set.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use mirror_core::{AssetDescriptor, AssetKind, AssetRecord};
use mirror_db::{AssetRegistry, InMemoryAssetRegistry, InMemoryTaskQueue, TaskQueue, TaskStatus};

fn plugin(slug: &str, version: Option<&str>) -> AssetDescriptor {
    let file_name = match version {
        Some(v) => format!("{slug}.{v}.zip"),
        None => format!("{slug}.zip"),
    };
    AssetDescriptor::new(
        AssetKind::PluginZip,
        Some(slug.to_string()),
        file_name,
        version.map(str::to_string),
        None,
    )
    .unwrap()
}

fn record(d: &AssetDescriptor) -> AssetRecord {
    AssetRecord::from_descriptor(d, format!("https://downloads.wordpress.org/plugin/{}", d.file_name))
}

// ── Registry ─────────────────────────────────────────────────────────

#[tokio::test]
async fn upsert_same_key_keeps_identity_and_refreshes_fields() {
    let registry = InMemoryAssetRegistry::new();
    let d = plugin("akismet", Some("5.3"));

    let first = registry.upsert(record(&d)).await.unwrap();
    let mut again = record(&d);
    again.upstream_url = "https://mirror.example/plugin/akismet.5.3.zip".into();
    let second = registry.upsert(again).await.unwrap();

    assert_eq!(registry.len(), 1);
    assert_eq!(second.id, first.id);
    assert_eq!(second.created_at, first.created_at);
    assert!(second.updated_at >= first.updated_at);
    assert_eq!(second.upstream_url, "https://mirror.example/plugin/akismet.5.3.zip");
}

#[tokio::test]
async fn null_components_compare_equal() {
    let registry = InMemoryAssetRegistry::new();
    let core = AssetDescriptor::new(AssetKind::CoreZip, None, "wordpress-6.4.2.zip", None, None)
        .unwrap();
    registry.upsert(record(&core)).await.unwrap();
    registry.upsert(record(&core)).await.unwrap();
    assert_eq!(registry.len(), 1);
}

#[tokio::test]
async fn concurrent_upserts_converge_on_one_record() {
    let registry = Arc::new(InMemoryAssetRegistry::new());
    let d = plugin("hello-dolly", Some("1.7.2"));

    let handles: Vec<_> = (0..32)
        .map(|_| {
            let registry = registry.clone();
            let r = record(&d);
            tokio::spawn(async move { registry.upsert(r).await.unwrap() })
        })
        .collect();
    let mut ids = Vec::new();
    for h in handles {
        ids.push(h.await.unwrap().id);
    }

    assert_eq!(registry.len(), 1);
    ids.dedup();
    assert_eq!(ids.len(), 1, "every upsert must return the surviving row");
}

#[tokio::test]
async fn distinct_revisions_are_distinct_records_and_latest_wins_lookup() {
    let registry = InMemoryAssetRegistry::new();
    let older = AssetDescriptor::new(
        AssetKind::Icon,
        Some("akismet".into()),
        "icon-256x256.png",
        None,
        Some("100".into()),
    )
    .unwrap();
    let newer = AssetDescriptor {
        revision: Some("200".into()),
        ..older.clone()
    };
    registry.upsert(record(&older)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    registry.upsert(record(&newer)).await.unwrap();

    assert_eq!(registry.len(), 2);
    let found = registry
        .find_by_descriptor(AssetKind::Icon, Some("akismet"), None, "icon-256x256.png")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.revision.as_deref(), Some("200"));
}

#[tokio::test]
async fn find_without_version_matches_resolved_version() {
    let registry = InMemoryAssetRegistry::new();
    let resolved = AssetDescriptor::new(
        AssetKind::PluginZip,
        Some("akismet".into()),
        "akismet.zip",
        Some("5.3".into()),
        None,
    )
    .unwrap();
    registry.upsert(record(&resolved)).await.unwrap();

    let found = registry
        .find_by_descriptor(AssetKind::PluginZip, Some("akismet"), None, "akismet.zip")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.version.as_deref(), Some("5.3"));
    let other = registry
        .find_by_descriptor(AssetKind::PluginZip, Some("akismet"), Some("5.2"), "akismet.zip")
        .await
        .unwrap();
    assert!(other.is_none());
}

#[tokio::test]
async fn find_misses_on_other_version() {
    let registry = InMemoryAssetRegistry::new();
    registry
        .upsert(record(&plugin("akismet", Some("5.3"))))
        .await
        .unwrap();
    let found = registry
        .find_by_descriptor(AssetKind::PluginZip, Some("akismet"), Some("5.2"), "akismet.5.3.zip")
        .await
        .unwrap();
    assert!(found.is_none());
}

#[tokio::test]
async fn slug_listing_is_sorted_searchable_and_paged() {
    let registry = InMemoryAssetRegistry::new();
    for slug in ["woocommerce", "akismet", "wordfence", "jetpack"] {
        registry.upsert(record(&plugin(slug, Some("1.0")))).await.unwrap();
    }
    registry
        .upsert(record(&plugin("akismet", Some("2.0"))))
        .await
        .unwrap();

    let all = registry
        .list_slugs(AssetKind::PluginZip, None, 2, 0)
        .await
        .unwrap();
    assert_eq!(all.total, 4);
    assert_eq!(all.slugs, vec!["akismet", "jetpack"]);

    let page2 = registry
        .list_slugs(AssetKind::PluginZip, None, 2, 2)
        .await
        .unwrap();
    assert_eq!(page2.slugs, vec!["woocommerce", "wordfence"]);

    let search = registry
        .list_slugs(AssetKind::PluginZip, Some("WO"), 10, 0)
        .await
        .unwrap();
    assert_eq!(search.total, 2);

    let versions = registry
        .list_by_slug(AssetKind::PluginZip, "akismet")
        .await
        .unwrap();
    assert_eq!(versions.len(), 2);
}

// ── Queue ────────────────────────────────────────────────────────────

#[tokio::test]
async fn claim_hands_out_each_task_once() {
    let queue = InMemoryTaskQueue::new();
    let id = queue.enqueue(&plugin("akismet", None)).await.unwrap();

    let claimed = queue.claim().await.unwrap().unwrap();
    assert_eq!(claimed.id, id);
    assert_eq!(claimed.attempts, 0);
    assert_eq!(claimed.descriptor().unwrap(), plugin("akismet", None));
    assert!(queue.claim().await.unwrap().is_none());

    queue.complete(id).await.unwrap();
    assert_eq!(queue.get(id).await.unwrap().unwrap().status, TaskStatus::Done);
    assert_eq!(queue.pending(), 0);
}

#[tokio::test]
async fn expired_lease_makes_task_claimable_again() {
    let queue = InMemoryTaskQueue::with_lease(Duration::from_millis(20));
    let id = queue.enqueue(&plugin("akismet", None)).await.unwrap();

    queue.claim().await.unwrap().unwrap();
    assert!(queue.claim().await.unwrap().is_none());
    tokio::time::sleep(Duration::from_millis(40)).await;

    let reclaimed = queue.claim().await.unwrap().unwrap();
    assert_eq!(reclaimed.id, id);
}

#[tokio::test]
async fn failure_delays_retry_and_keeps_attempt_count() {
    let queue = InMemoryTaskQueue::new();
    let id = queue.enqueue(&plugin("akismet", None)).await.unwrap();
    queue.claim().await.unwrap().unwrap();

    let later = Utc::now() + chrono::Duration::seconds(60);
    queue.record_failure(id, 1, "origin timed out", later).await.unwrap();
    assert!(queue.claim().await.unwrap().is_none(), "not yet available");

    queue
        .record_failure(id, 1, "origin timed out", Utc::now())
        .await
        .unwrap();
    let claimed = queue.claim().await.unwrap().unwrap();
    assert_eq!(claimed.attempts, 1);

    let task = queue.get(id).await.unwrap().unwrap();
    assert_eq!(task.last_error.as_deref(), Some("origin timed out"));
}

#[tokio::test]
async fn dead_letters_are_listed_newest_first() {
    let queue = InMemoryTaskQueue::new();
    let a = queue.enqueue(&plugin("a", None)).await.unwrap();
    let b = queue.enqueue(&plugin("b", None)).await.unwrap();
    queue.enqueue(&plugin("c", None)).await.unwrap();

    queue.dead_letter(a, 5, "exhausted").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    queue.dead_letter(b, 1, "origin returned 404").await.unwrap();

    let failed = queue.list_failed(10).await.unwrap();
    assert_eq!(failed.len(), 2);
    assert_eq!(failed[0].id, b);
    assert_eq!(failed[1].attempts, 5);
    assert_eq!(queue.list_failed(1).await.unwrap().len(), 1);
}

#[tokio::test]
async fn updating_unknown_task_is_not_found() {
    let queue = InMemoryTaskQueue::new();
    let err = queue.complete(uuid::Uuid::new_v4()).await.unwrap_err();
    assert!(matches!(err, mirror_db::QueueError::NotFound(_)));
}
