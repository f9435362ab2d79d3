// Worker Registry Port (Interface)

use crate::error::Result;
use async_trait::async_trait;

/// One live (or recently live) worker process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerEntry {
    pub worker_id: String,
    pub pid: i32,
    pub started_at: i64,
}

/// Persisted set of currently known worker identities and OS PIDs.
#[async_trait]
pub trait WorkerRegistry: Send + Sync {
    async fn register(&self, entry: &WorkerEntry) -> Result<()>;

    async fn remove(&self, worker_id: &str) -> Result<()>;

    async fn clear(&self) -> Result<()>;

    async fn entries(&self) -> Result<Vec<WorkerEntry>>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// In-memory registry for supervisor and recovery tests.
    #[derive(Default)]
    pub struct InMemoryWorkerRegistry {
        entries: Mutex<Vec<WorkerEntry>>,
    }

    impl InMemoryWorkerRegistry {
        pub fn new() -> Self {
            Self::default()
        }
    }

    #[async_trait]
    impl WorkerRegistry for InMemoryWorkerRegistry {
        async fn register(&self, entry: &WorkerEntry) -> Result<()> {
            let mut entries = self.entries.lock().unwrap();
            entries.retain(|e| e.worker_id != entry.worker_id);
            entries.push(entry.clone());
            Ok(())
        }

        async fn remove(&self, worker_id: &str) -> Result<()> {
            self.entries
                .lock()
                .unwrap()
                .retain(|e| e.worker_id != worker_id);
            Ok(())
        }

        async fn clear(&self) -> Result<()> {
            self.entries.lock().unwrap().clear();
            Ok(())
        }

        async fn entries(&self) -> Result<Vec<WorkerEntry>> {
            Ok(self.entries.lock().unwrap().clone())
        }
    }
}
