// Domain layer

pub mod config;
pub mod error;
mod job;

pub use config::QueueConfig;
pub use error::DomainError;
pub use job::{
    validate_priority, Job, JobId, JobState, Priority, DEFAULT_PRIORITY, PRIORITY_HIGH,
    PRIORITY_LOW,
};
