// Port Layer - Interfaces for external dependencies

pub mod command_executor;
pub mod config_store;
pub mod id_provider;
pub mod job_store;
pub mod process_control;
pub mod time_provider;
pub mod worker_registry;

// Re-exports
pub use command_executor::{CommandExecutor, ExecutionReport};
pub use config_store::ConfigStore;
pub use id_provider::IdProvider;
pub use job_store::{FailOutcome, FailureReport, JobStore, QueueMetrics};
pub use process_control::ProcessControl;
pub use time_provider::TimeProvider;
pub use worker_registry::{WorkerEntry, WorkerRegistry};
