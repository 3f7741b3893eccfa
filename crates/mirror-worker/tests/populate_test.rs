//! Population worker tests against a mock origin, a temporary local storage
//! root, and the in-memory registry and queue.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::TryStreamExt;
use mirror_core::{identify, AssetDescriptor, AssetKind};
use mirror_db::{AssetRegistry, InMemoryAssetRegistry, InMemoryTaskQueue, TaskQueue, TaskStatus};
use mirror_origin::{OriginClient, OriginConfig};
use mirror_storage::{LocalStorage, StorageBackend};
use mirror_worker::{
    PopulateError, PopulateOutcome, PopulationWorker, RetryPolicy, TaskOutcome, TaskRunner,
    WorkerPool,
};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    dir: TempDir,
    storage: Arc<LocalStorage>,
    registry: Arc<InMemoryAssetRegistry>,
    queue: Arc<InMemoryTaskQueue>,
    worker: PopulationWorker,
}

impl Harness {
    fn new(server: &MockServer, timeout: Duration) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let storage = Arc::new(LocalStorage::new(dir.path()));
        let registry = Arc::new(InMemoryAssetRegistry::new());
        let queue = Arc::new(InMemoryTaskQueue::new());
        let origin =
            OriginClient::new(OriginConfig::single_host(&server.uri(), timeout).unwrap()).unwrap();
        let worker = PopulationWorker::new(storage.clone(), registry.clone(), origin);
        Self {
            dir,
            storage,
            registry,
            queue,
            worker,
        }
    }

    fn runner(&self, policy: RetryPolicy) -> TaskRunner {
        TaskRunner::new(self.worker.clone(), self.queue.clone(), policy)
    }

    async fn stored_bytes(&self, path: &str) -> Vec<u8> {
        let object = self.storage.open_read(path).await.unwrap();
        let chunks: Vec<Bytes> = object.stream.try_collect().await.unwrap();
        chunks.concat()
    }
}

fn d(path: &str) -> AssetDescriptor {
    identify(path, None).unwrap()
}

#[tokio::test]
async fn populate_stores_bytes_and_records_asset() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/plugin/test-plugin.2.1.0.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"PK-plugin".to_vec()))
        .expect(1)
        .mount(&server)
        .await;
    let h = Harness::new(&server, Duration::from_secs(5));

    let outcome = h
        .worker
        .populate(&d("/plugin/test-plugin.2.1.0.zip"))
        .await
        .unwrap();
    let PopulateOutcome::Stored { record, bytes } = outcome else {
        panic!("expected Stored, got {outcome:?}");
    };
    assert_eq!(bytes, 9);
    assert_eq!(record.storage_path, "plugins/test-plugin/test-plugin.2.1.0.zip");
    assert_eq!(record.version.as_deref(), Some("2.1.0"));
    assert_eq!(record.repository, "plugin");
    assert!(record.upstream_url.ends_with("/plugin/test-plugin.2.1.0.zip"));
    assert_eq!(
        h.stored_bytes("plugins/test-plugin/test-plugin.2.1.0.zip").await,
        b"PK-plugin"
    );
    assert_eq!(h.registry.len(), 1);
}

#[tokio::test]
async fn version_comes_from_content_disposition_when_request_has_none() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/plugin/akismet.zip"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-disposition", "attachment; filename=akismet.5.3.zip")
                .set_body_bytes(b"zip".to_vec()),
        )
        .mount(&server)
        .await;
    let h = Harness::new(&server, Duration::from_secs(5));

    let outcome = h.worker.populate(&d("/plugin/akismet.zip")).await.unwrap();
    assert_eq!(outcome.record().version.as_deref(), Some("5.3"));
    assert_eq!(outcome.record().storage_path, "plugins/akismet/akismet.zip");
}

#[tokio::test]
async fn repopulating_versionless_download_keeps_one_record() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/plugin/akismet.zip"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-disposition", "attachment; filename=akismet.5.3.zip")
                .set_body_bytes(b"zip".to_vec()),
        )
        .expect(1)
        .mount(&server)
        .await;
    let h = Harness::new(&server, Duration::from_secs(5));
    let descriptor = d("/plugin/akismet.zip");

    let first = h.worker.populate(&descriptor).await.unwrap();
    let second = h.worker.populate(&descriptor).await.unwrap();

    assert!(matches!(first, PopulateOutcome::Stored { .. }));
    assert!(matches!(second, PopulateOutcome::AlreadyCached { .. }));
    assert_eq!(second.record().version.as_deref(), Some("5.3"));
    assert_eq!(second.record().id, first.record().id);
    assert_eq!(second.record().upstream_url, first.record().upstream_url);
    assert_eq!(h.registry.len(), 1);
}

#[tokio::test]
async fn version_falls_back_to_final_url_after_redirect() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/theme/linnet.zip"))
        .respond_with(
            ResponseTemplate::new(302)
                .insert_header("location", format!("{}/theme/linnet.1.0.15.zip", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/theme/linnet.1.0.15.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"theme".to_vec()))
        .mount(&server)
        .await;
    let h = Harness::new(&server, Duration::from_secs(5));

    let outcome = h.worker.populate(&d("/theme/linnet.zip")).await.unwrap();
    assert_eq!(outcome.record().kind, AssetKind::ThemeZip);
    assert_eq!(outcome.record().version.as_deref(), Some("1.0.15"));
    assert_eq!(h.stored_bytes("themes/linnet/linnet.zip").await, b"theme");
}

#[tokio::test]
async fn already_cached_object_only_refreshes_registry() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"new".to_vec()))
        .expect(0)
        .mount(&server)
        .await;
    let h = Harness::new(&server, Duration::from_secs(5));
    h.storage
        .write_atomic(
            "core/wordpress-6.4.2.zip",
            mirror_core::single_chunk("old"),
            None,
        )
        .await
        .unwrap();

    let outcome = h
        .worker
        .populate(&d("/wordpress-6.4.2.zip"))
        .await
        .unwrap();
    assert!(matches!(outcome, PopulateOutcome::AlreadyCached { .. }));
    assert_eq!(outcome.record().version.as_deref(), Some("6.4.2"));
    assert_eq!(h.stored_bytes("core/wordpress-6.4.2.zip").await, b"old");
    assert_eq!(h.registry.len(), 1);
}

#[tokio::test]
async fn origin_404_is_fatal_and_dead_lettered_on_first_attempt() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .expect(2)
        .mount(&server)
        .await;
    let h = Harness::new(&server, Duration::from_secs(5));

    let err = h.worker.populate(&d("/plugin/gone.zip")).await.unwrap_err();
    assert!(matches!(err, PopulateError::Fatal(_)));

    let id = h.queue.enqueue(&d("/plugin/gone.zip")).await.unwrap();
    let outcome = h.runner(RetryPolicy::immediate(5)).run_once().await.unwrap();
    assert_eq!(outcome, Some(TaskOutcome::DeadLettered { attempts: 1 }));

    let task = h.queue.get(id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert!(task.last_error.unwrap().contains("404"));
    assert!(!h.storage.exists("plugins/gone/gone.zip").await.unwrap());
}

#[tokio::test]
async fn transient_failure_is_retried_then_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"ok".to_vec()))
        .mount(&server)
        .await;
    let h = Harness::new(&server, Duration::from_secs(5));
    let id = h.queue.enqueue(&d("/plugin/flaky.1.0.zip")).await.unwrap();

    let runner = h.runner(RetryPolicy::immediate(5));
    assert_eq!(
        runner.run_once().await.unwrap(),
        Some(TaskOutcome::Retrying { attempts: 1 })
    );
    assert_eq!(
        runner.run_once().await.unwrap(),
        Some(TaskOutcome::Retrying { attempts: 2 })
    );
    assert_eq!(runner.run_once().await.unwrap(), Some(TaskOutcome::Completed));

    let task = h.queue.get(id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Done);
    assert_eq!(task.attempts, 2);
    assert_eq!(h.stored_bytes("plugins/flaky/flaky.1.0.zip").await, b"ok");
}

#[tokio::test]
async fn exhausted_retries_dead_letter_the_task() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&server)
        .await;
    let h = Harness::new(&server, Duration::from_secs(5));
    let id = h.queue.enqueue(&d("/plugin/broken.zip")).await.unwrap();

    let handled = h.runner(RetryPolicy::immediate(3)).drain().await.unwrap();
    assert_eq!(handled, 3);
    let failed = h.queue.list_failed(10).await.unwrap();
    assert_eq!(failed.len(), 1);
    assert_eq!(failed[0].id, id);
    assert_eq!(failed[0].attempts, 3);
}

#[tokio::test]
async fn backoff_schedules_retry_in_the_future() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(502))
        .mount(&server)
        .await;
    let h = Harness::new(&server, Duration::from_secs(5));
    let id = h.queue.enqueue(&d("/plugin/slow.zip")).await.unwrap();

    let handled = h.runner(RetryPolicy::default()).drain().await.unwrap();
    assert_eq!(handled, 1, "the retry is not due yet");
    let task = h.queue.get(id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Queued);
    assert_eq!(task.attempts, 1);
    assert!(task.available_at > task.created_at);
}

#[tokio::test]
async fn undecodable_payload_is_dead_lettered() {
    let server = MockServer::start().await;
    let h = Harness::new(&server, Duration::from_secs(5));
    let mut bogus = d("/plugin/akismet.zip");
    bogus.file_name = "../../etc/passwd".into();
    h.queue.enqueue(&bogus).await.unwrap();

    let outcome = h.runner(RetryPolicy::immediate(5)).run_once().await.unwrap();
    assert_eq!(outcome, Some(TaskOutcome::DeadLettered { attempts: 1 }));
}

#[tokio::test]
async fn origin_timeout_is_retryable_and_leaves_no_partial_file() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_bytes(b"late".to_vec())
                .set_delay(Duration::from_secs(2)),
        )
        .mount(&server)
        .await;
    let h = Harness::new(&server, Duration::from_millis(200));
    let id = h.queue.enqueue(&d("/wordpress-6.4.2.zip")).await.unwrap();

    let outcome = h.runner(RetryPolicy::default()).run_once().await.unwrap();
    assert_eq!(outcome, Some(TaskOutcome::Retrying { attempts: 1 }));
    let task = h.queue.get(id).await.unwrap().unwrap();
    assert!(task.last_error.unwrap().contains("timed out"));
    assert!(!h.storage.exists("core/wordpress-6.4.2.zip").await.unwrap());
    assert!(!h.dir.path().join("core").exists());
}

#[tokio::test]
async fn concurrent_populations_converge_on_one_record_and_complete_file() {
    let server = MockServer::start().await;
    let body = vec![7u8; 256 * 1024];
    Mock::given(method("GET"))
        .and(path("/plugin/popular.3.0.zip"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
        .mount(&server)
        .await;
    let h = Harness::new(&server, Duration::from_secs(5));
    let descriptor = d("/plugin/popular.3.0.zip");

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let worker = h.worker.clone();
            let descriptor = descriptor.clone();
            tokio::spawn(async move { worker.populate(&descriptor).await.unwrap() })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(h.registry.len(), 1);
    assert_eq!(h.stored_bytes("plugins/popular/popular.3.0.zip").await, body);
    let found = h
        .registry
        .find_by_descriptor(
            AssetKind::PluginZip,
            Some("popular"),
            Some("3.0"),
            "popular.3.0.zip",
        )
        .await
        .unwrap();
    assert!(found.is_some());
}

#[tokio::test]
async fn pool_drains_queue_and_stops_on_cancel() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(b"x".to_vec()))
        .mount(&server)
        .await;
    let h = Harness::new(&server, Duration::from_secs(5));
    for slug in ["a", "b", "c", "d", "e"] {
        h.queue
            .enqueue(&d(&format!("/plugin/{slug}.1.0.zip")))
            .await
            .unwrap();
    }

    let pool = WorkerPool::new(
        h.runner(RetryPolicy::immediate(3)),
        3,
        Duration::from_millis(10),
    );
    let cancel = CancellationToken::new();
    let handles = pool.spawn(cancel.clone());

    tokio::time::timeout(Duration::from_secs(5), async {
        while h.queue.pending() > 0 {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("pool drains the queue");
    cancel.cancel();
    for handle in handles {
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .expect("worker loop stops after cancel")
            .unwrap();
    }

    assert_eq!(h.registry.len(), 5);
}
