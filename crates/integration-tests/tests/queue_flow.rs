// End-to-end queue flow: enqueue, execute, outcomes

use queuectl_core::application::enqueue::{self, EnqueueRequest};
use queuectl_core::application::Worker;
use queuectl_core::domain::JobState;
use queuectl_core::port::id_provider::UuidProvider;
use queuectl_core::port::time_provider::SystemTimeProvider;
use queuectl_core::port::{CommandExecutor, ConfigStore, JobStore};
use queuectl_infra_sqlite::{create_pool, run_migrations, SqliteConfigStore, SqliteJobStore};
use queuectl_infra_system::ShellExecutor;
use std::sync::Arc;

struct Harness {
    store: Arc<SqliteJobStore>,
    config: Arc<SqliteConfigStore>,
}

impl Harness {
    async fn new() -> Self {
        let pool = create_pool("sqlite::memory:").await.unwrap();
        run_migrations(&pool).await.unwrap();
        Self {
            store: Arc::new(SqliteJobStore::new(pool.clone(), Arc::new(SystemTimeProvider))),
            config: Arc::new(SqliteConfigStore::new(pool)),
        }
    }

    async fn enqueue(&self, json: &str) -> String {
        let req: EnqueueRequest = serde_json::from_str(json).unwrap();
        enqueue::execute(
            self.store.as_ref(),
            self.config.as_ref(),
            &UuidProvider,
            &SystemTimeProvider,
            req,
        )
        .await
        .unwrap()
    }

    fn worker(&self, id: &str) -> Worker {
        let executor: Arc<dyn CommandExecutor> =
            Arc::new(ShellExecutor::new(Arc::new(SystemTimeProvider)));
        Worker::new(id, self.store.clone(), self.config.clone(), executor)
    }
}

#[tokio::test]
async fn test_echo_job_completes_with_output() {
    let harness = Harness::new().await;
    let job_id = harness.enqueue(r#"{"command": "echo test"}"#).await;

    let worker = harness.worker("w-1");
    assert!(worker.process_next_job().await.unwrap());

    let job = harness.store.find_by_id(&job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Completed);
    assert_eq!(job.exit_code, Some(0));
    assert!(job.stdout.unwrap().contains("test"));
    assert!(job.worker_id.is_none());
    assert!(job.finished_at.is_some());
}

#[tokio::test]
async fn test_high_priority_dispatches_first() {
    let harness = Harness::new().await;
    let low = harness
        .enqueue(r#"{"command": "echo low", "priority": 3}"#)
        .await;
    let high = harness
        .enqueue(r#"{"command": "echo high", "priority": 1}"#)
        .await;

    let worker = harness.worker("w-1");
    assert!(worker.process_next_job().await.unwrap());

    // The later-enqueued high-priority job finished first
    let high_job = harness.store.find_by_id(&high).await.unwrap().unwrap();
    let low_job = harness.store.find_by_id(&low).await.unwrap().unwrap();
    assert_eq!(high_job.state, JobState::Completed);
    assert_eq!(low_job.state, JobState::Pending);

    assert!(worker.process_next_job().await.unwrap());
    let low_job = harness.store.find_by_id(&low).await.unwrap().unwrap();
    assert_eq!(low_job.state, JobState::Completed);
}

#[tokio::test]
async fn test_failing_job_lands_in_dlq_and_retries_from_it() {
    let harness = Harness::new().await;
    harness.config.set("max-retries", 0).await.unwrap();

    let job_id = harness.enqueue(r#"{"command": "exit 1"}"#).await;

    let worker = harness.worker("w-1");
    assert!(worker.process_next_job().await.unwrap());

    let job = harness.store.find_by_id(&job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Dead);
    assert_eq!(job.attempts, 1);
    assert_eq!(job.error.as_deref(), Some("command failed (exit code 1)"));

    let dlq = harness.store.dead_letters().await.unwrap();
    assert_eq!(dlq.len(), 1);
    assert_eq!(dlq[0].id, job_id);

    // Operator re-enqueue: attempts reset, error fields cleared
    harness.store.retry_dead(&job_id).await.unwrap();
    let job = harness.store.find_by_id(&job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Pending);
    assert_eq!(job.attempts, 0);
    assert!(job.error.is_none());

    // It promptly dies again for the same reason
    assert!(worker.process_next_job().await.unwrap());
    let job = harness.store.find_by_id(&job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Dead);
}

#[tokio::test]
async fn test_timeout_is_recorded_and_dead_letters() {
    let harness = Harness::new().await;
    harness.config.set("max-retries", 0).await.unwrap();
    harness.config.set("job-timeout", 1).await.unwrap();

    let job_id = harness.enqueue(r#"{"command": "sleep 10"}"#).await;

    let worker = harness.worker("w-1");
    assert!(worker.process_next_job().await.unwrap());

    let job = harness.store.find_by_id(&job_id).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Dead);
    assert_eq!(job.error.as_deref(), Some("timeout"));
}

#[tokio::test]
async fn test_explicit_id_and_bad_input_rejected() {
    let harness = Harness::new().await;

    let job_id = harness
        .enqueue(r#"{"id": "my-job", "command": "echo hi"}"#)
        .await;
    assert_eq!(job_id, "my-job");

    let bad = serde_json::from_str::<EnqueueRequest>(r#"{"command": ""}"#).unwrap();
    let err = enqueue::execute(
        harness.store.as_ref(),
        harness.config.as_ref(),
        &UuidProvider,
        &SystemTimeProvider,
        bad,
    )
    .await;
    assert!(err.is_err());

    let bad_priority = serde_json::from_str::<EnqueueRequest>(
        r#"{"command": "echo hi", "priority": 7}"#,
    )
    .unwrap();
    let err = enqueue::execute(
        harness.store.as_ref(),
        harness.config.as_ref(),
        &UuidProvider,
        &SystemTimeProvider,
        bad_priority,
    )
    .await;
    assert!(err.is_err());

    // Nothing beyond the valid job was inserted
    assert_eq!(harness.store.list(None).await.unwrap().len(), 1);
}
