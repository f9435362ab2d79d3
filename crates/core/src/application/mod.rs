// Application layer - services over the ports

pub mod enqueue;
pub mod recovery;
pub mod retry;
pub mod supervisor;
pub mod worker;

pub use enqueue::EnqueueRequest;
pub use recovery::RecoveryService;
pub use retry::{RetryDecision, RetryPolicy};
pub use supervisor::{Supervisor, WorkerStatus};
pub use worker::{Shutdown, ShutdownHandle, Worker};
