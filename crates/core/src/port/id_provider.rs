// Identifier generation for jobs and workers

/// Identity source for new jobs and worker processes (seam for
/// deterministic tests).
pub trait IdProvider: Send + Sync {
    /// Opaque unique job id, stable for the life of the job.
    fn job_id(&self) -> String;

    /// Short worker identity, recorded in the registry and stamped onto
    /// claimed rows.
    fn worker_id(&self) -> String;
}

/// UUID-backed provider (production)
pub struct UuidProvider;

impl IdProvider for UuidProvider {
    fn job_id(&self) -> String {
        uuid::Uuid::new_v4().to_string()
    }

    fn worker_id(&self) -> String {
        // Eight hex chars are plenty for one host's pool and keep log lines
        // and status tables readable
        let id = uuid::Uuid::new_v4().simple().to_string();
        format!("worker-{}", &id[..8])
    }
}
