//! Postgres-backed registry and queue tests.
//!
//! Skipped unless `DATABASE_URL` points at a PostgreSQL 15+ database. Each
//! test uses unique slugs so runs do not interfere.

use std::sync::Arc;
use std::time::Duration;

use mirror_core::{AssetDescriptor, AssetKind, AssetRecord};
use mirror_db::{AssetRegistry, PgAssetRegistry, PgTaskQueue, TaskQueue, TaskStatus};
use sqlx::PgPool;
use uuid::Uuid;

async fn pool() -> Option<PgPool> {
    let url = std::env::var("DATABASE_URL").ok()?;
    Some(mirror_db::connect(&url).await.expect("connect to DATABASE_URL"))
}

fn unique_slug(prefix: &str) -> String {
    format!("{prefix}-{}", Uuid::new_v4().simple())
}

fn plugin(slug: &str, version: &str) -> AssetDescriptor {
    AssetDescriptor::new(
        AssetKind::PluginZip,
        Some(slug.to_string()),
        format!("{slug}.{version}.zip"),
        Some(version.to_string()),
        None,
    )
    .unwrap()
}

fn record(d: &AssetDescriptor) -> AssetRecord {
    AssetRecord::from_descriptor(d, format!("https://downloads.wordpress.org/plugin/{}", d.file_name))
}

#[tokio::test]
async fn pg_upsert_is_idempotent_under_concurrency() {
    let Some(pool) = pool().await else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };
    let registry = Arc::new(PgAssetRegistry::new(pool));
    let slug = unique_slug("race");
    let d = plugin(&slug, "1.0.0");

    let handles: Vec<_> = (0..16)
        .map(|_| {
            let registry = registry.clone();
            let r = record(&d);
            tokio::spawn(async move { registry.upsert(r).await.unwrap().id })
        })
        .collect();
    let mut ids = Vec::new();
    for h in handles {
        ids.push(h.await.unwrap());
    }
    ids.dedup();
    assert_eq!(ids.len(), 1);

    let rows = registry
        .list_by_slug(AssetKind::PluginZip, &slug)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn pg_nulls_are_not_distinct() {
    let Some(pool) = pool().await else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };
    let registry = PgAssetRegistry::new(pool);
    let slug = unique_slug("nulls");
    let d = AssetDescriptor::new(
        AssetKind::PluginZip,
        Some(slug.clone()),
        format!("{slug}.zip"),
        None,
        None,
    )
    .unwrap();
    let first = registry.upsert(record(&d)).await.unwrap();
    let second = registry.upsert(record(&d)).await.unwrap();
    assert_eq!(first.id, second.id);

    let found = registry
        .find_by_descriptor(AssetKind::PluginZip, Some(&slug), None, &d.file_name)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, first.id);
}

#[tokio::test]
async fn pg_slug_search_escapes_wildcards() {
    let Some(pool) = pool().await else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };
    let registry = PgAssetRegistry::new(pool);
    let slug = unique_slug("search");
    registry.upsert(record(&plugin(&slug, "1.0"))).await.unwrap();

    let page = registry
        .list_slugs(AssetKind::PluginZip, Some(&slug), 10, 0)
        .await
        .unwrap();
    assert_eq!(page.slugs, vec![slug.clone()]);
    assert_eq!(page.total, 1);

    let page = registry
        .list_slugs(AssetKind::PluginZip, Some("%"), 10, 0)
        .await
        .unwrap();
    assert!(!page.slugs.contains(&slug));
}

#[tokio::test]
async fn pg_queue_lifecycle() {
    let Some(pool) = pool().await else {
        eprintln!("DATABASE_URL not set, skipping");
        return;
    };
    let queue = PgTaskQueue::with_lease(pool, Duration::from_secs(60));
    let d = plugin(&unique_slug("queue"), "2.0");
    let id = queue.enqueue(&d).await.unwrap();

    // Other tests may have left tasks behind; claim until ours comes up.
    let mut ours = None;
    while let Some(task) = queue.claim().await.unwrap() {
        if task.id == id {
            ours = Some(task);
            break;
        }
        queue.complete(task.id).await.unwrap();
    }
    let task = ours.expect("enqueued task is claimable");
    assert_eq!(task.descriptor().unwrap(), d);

    queue
        .record_failure(id, 1, "origin returned 503", chrono::Utc::now())
        .await
        .unwrap();
    queue.dead_letter(id, 2, "origin returned 404").await.unwrap();

    let stored = queue.get(id).await.unwrap().unwrap();
    assert_eq!(stored.status, TaskStatus::Failed);
    assert_eq!(stored.attempts, 2);
    assert_eq!(stored.last_error.as_deref(), Some("origin returned 404"));
    assert!(queue
        .list_failed(100)
        .await
        .unwrap()
        .iter()
        .any(|t| t.id == id));
}
