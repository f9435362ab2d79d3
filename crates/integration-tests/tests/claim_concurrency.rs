// Concurrency: dispatch uniqueness under parallel workers

use queuectl_core::application::Worker;
use queuectl_core::domain::{Job, JobState};
use queuectl_core::port::command_executor::mocks::MockCommandExecutor;
use queuectl_core::port::time_provider::SystemTimeProvider;
use queuectl_core::port::{CommandExecutor, JobStore, TimeProvider};
use queuectl_infra_sqlite::{create_pool, run_migrations, SqliteConfigStore, SqliteJobStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;

async fn setup_file_store(name: &str) -> (Arc<SqliteJobStore>, Arc<SqliteConfigStore>) {
    let db_path = format!("/tmp/queuectl_test_{}.db", name);
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{}", db_path, suffix));
    }
    let pool = create_pool(&db_path).await.unwrap();
    run_migrations(&pool).await.unwrap();
    (
        Arc::new(SqliteJobStore::new(pool.clone(), Arc::new(SystemTimeProvider))),
        Arc::new(SqliteConfigStore::new(pool)),
    )
}

fn job(id: &str) -> Job {
    let now = SystemTimeProvider.now_millis();
    Job::new(id, format!("echo {}", id), 2, 3, now - 10, now - 10)
}

#[tokio::test]
async fn test_single_job_claimed_exactly_once() {
    let (store, _config) = setup_file_store("claim_once").await;
    store.insert(&job("only")).await.unwrap();

    let mut tasks = JoinSet::new();
    for i in 0..10 {
        let store = store.clone();
        tasks.spawn(async move { store.claim(&format!("w-{}", i)).await.unwrap() });
    }

    let mut winners = 0;
    while let Some(result) = tasks.join_next().await {
        if result.unwrap().is_some() {
            winners += 1;
        }
    }
    assert_eq!(winners, 1, "exactly one concurrent claim may win");
}

#[tokio::test]
async fn test_parallel_workers_no_duplicates_no_orphans() {
    let (store, config) = setup_file_store("parallel_pool").await;

    for i in 0..10 {
        store.insert(&job(&format!("job-{:02}", i))).await.unwrap();
    }

    let mut tasks = JoinSet::new();
    for w in 0..5 {
        let store = store.clone();
        let config = config.clone();
        tasks.spawn(async move {
            let executor: Arc<dyn CommandExecutor> = Arc::new(MockCommandExecutor::new_success());
            let worker = Worker::new(format!("w-{}", w), store, config, executor);
            let mut processed = 0;
            loop {
                match worker.process_next_job().await {
                    Ok(true) => processed += 1,
                    Ok(false) => break,
                    Err(e) => panic!("worker error: {}", e),
                }
            }
            processed
        });
    }

    let mut total = 0;
    while let Some(result) = tasks.join_next().await {
        total += result.unwrap();
    }

    // Every job dispatched exactly once across the pool
    assert_eq!(total, 10);
    assert_eq!(store.count_by_state(JobState::Completed).await.unwrap(), 10);
    assert_eq!(store.count_by_state(JobState::Processing).await.unwrap(), 0);
    assert_eq!(store.count_by_state(JobState::Pending).await.unwrap(), 0);

    for job in store.list(None).await.unwrap() {
        assert_eq!(job.state, JobState::Completed);
        assert_eq!(job.attempts, 0, "successful first attempts do not bump the counter");
    }
}

#[tokio::test]
async fn test_worker_run_loop_drains_queue_and_shuts_down() {
    use queuectl_core::application::worker::Shutdown;

    let (store, config) = setup_file_store("run_loop").await;
    for i in 0..5 {
        store.insert(&job(&format!("job-{}", i))).await.unwrap();
    }

    let (shutdown_handle, shutdown) = Shutdown::channel();
    let executor: Arc<dyn CommandExecutor> = Arc::new(MockCommandExecutor::new_success());
    let worker = Worker::new("w-loop", store.clone(), config, executor);

    let handle = tokio::spawn(async move { worker.run(shutdown).await });

    // Wait for the queue to drain
    for _ in 0..50 {
        if store.count_by_state(JobState::Completed).await.unwrap() == 5 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert_eq!(store.count_by_state(JobState::Completed).await.unwrap(), 5);

    shutdown_handle.request();
    let result = tokio::time::timeout(Duration::from_secs(2), handle).await;
    assert!(result.is_ok(), "worker should shut down within 2 seconds");
    assert!(result.unwrap().unwrap().is_ok());
}
