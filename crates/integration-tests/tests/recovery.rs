// Orphan recovery and persistence across store reopen

use queuectl_core::application::RecoveryService;
use queuectl_core::domain::{Job, JobState};
use queuectl_core::port::process_control::mocks::MockProcessControl;
use queuectl_core::port::time_provider::SystemTimeProvider;
use queuectl_core::port::worker_registry::mocks::InMemoryWorkerRegistry;
use queuectl_core::port::{JobStore, ProcessControl, TimeProvider, WorkerEntry, WorkerRegistry};
use queuectl_infra_sqlite::{create_pool, run_migrations, SqliteJobStore, SqliteWorkerRegistry};
use std::sync::Arc;

fn now() -> i64 {
    SystemTimeProvider.now_millis()
}

fn job(id: &str) -> Job {
    let t = now();
    Job::new(id, format!("echo {}", id), 2, 3, t - 10, t - 10)
}

#[tokio::test]
async fn test_orphan_returns_to_pending_preserving_attempts() {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    let store = Arc::new(SqliteJobStore::new(pool.clone(), Arc::new(SystemTimeProvider)));
    let registry = Arc::new(SqliteWorkerRegistry::new(pool));
    let process = Arc::new(MockProcessControl::new());

    store.insert(&job("orphaned")).await.unwrap();
    let claimed = store.claim("w-crashed").await.unwrap().unwrap();
    assert_eq!(claimed.state, JobState::Processing);

    // The dead worker left a registry entry pointing at a gone PID
    registry
        .register(&WorkerEntry {
            worker_id: "w-crashed".to_string(),
            pid: 999_999,
            started_at: now(),
        })
        .await
        .unwrap();

    let recovery = RecoveryService::new(store.clone(), registry, process);
    let recovered = recovery.recover_orphans().await.unwrap();
    assert_eq!(recovered, 1);

    let job = store.find_by_id(&"orphaned".to_string()).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Pending);
    assert_eq!(job.attempts, 0, "attempts preserved across recovery");
    assert!(job.worker_id.is_none());
    assert!(job.started_at.is_none());

    // And the row is claimable again
    assert!(store.claim("w-new").await.unwrap().is_some());
}

#[tokio::test]
async fn test_recovery_leaves_live_workers_claims_alone() {
    let pool = create_pool("sqlite::memory:").await.unwrap();
    run_migrations(&pool).await.unwrap();
    let store = Arc::new(SqliteJobStore::new(pool, Arc::new(SystemTimeProvider)));
    let registry = Arc::new(InMemoryWorkerRegistry::new());
    let process = Arc::new(MockProcessControl::new());

    // A live peer holds a claim
    let live_pid = process.spawn_worker("w-live").await.unwrap();
    registry
        .register(&WorkerEntry {
            worker_id: "w-live".to_string(),
            pid: live_pid,
            started_at: now(),
        })
        .await
        .unwrap();

    store.insert(&job("in-flight")).await.unwrap();
    store.claim("w-live").await.unwrap().unwrap();

    let recovery = RecoveryService::new(store.clone(), registry, process);
    assert_eq!(recovery.recover_orphans().await.unwrap(), 0);

    let job = store.find_by_id(&"in-flight".to_string()).await.unwrap().unwrap();
    assert_eq!(job.state, JobState::Processing, "live claim must not be stolen");
}

#[tokio::test]
async fn test_jobs_persist_across_store_reopen() {
    let db_path = "/tmp/queuectl_test_persistence.db";
    for suffix in ["", "-wal", "-shm"] {
        let _ = std::fs::remove_file(format!("{}{}", db_path, suffix));
    }

    // First open: enqueue and leave one row processing
    {
        let pool = create_pool(db_path).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let store = SqliteJobStore::new(pool, Arc::new(SystemTimeProvider));

        store.insert(&job("survivor")).await.unwrap();
        store.insert(&job("abandoned")).await.unwrap();
        store.claim("w-gone").await.unwrap().unwrap();
    }

    // Second open: data survived; recovery reclaims the abandoned row
    {
        let pool = create_pool(db_path).await.unwrap();
        run_migrations(&pool).await.unwrap();
        let store = Arc::new(SqliteJobStore::new(pool.clone(), Arc::new(SystemTimeProvider)));
        let registry = Arc::new(SqliteWorkerRegistry::new(pool));
        let process = Arc::new(MockProcessControl::new());

        assert_eq!(store.list(None).await.unwrap().len(), 2);

        let recovery = RecoveryService::new(store.clone(), registry, process);
        assert_eq!(recovery.recover_orphans().await.unwrap(), 1);
        assert_eq!(store.count_by_state(JobState::Pending).await.unwrap(), 2);
    }

    let _ = std::fs::remove_file(db_path);
}
