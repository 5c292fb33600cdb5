//! Duplicate and limit checks.

use super::{Collected, Orchestrator, StageResult};
use crate::error::JobFailure;
use crate::job::Job;
use crate::remote::RemovalRequest;

impl Orchestrator {
    /// Run the application's duplicate check, then its limit check
    ///
    /// A duplicate is removed from the pending list and forgotten. A job
    /// over its limit is only reported: its pending links and registry
    /// entry stay until the next reset clears them.
    pub(super) async fn check_policies(&self, job: &Job, collected: &Collected) -> StageResult<()> {
        let policy = &self.collaborators.policy;

        if let Some(rejection) = policy.check_duplicate(job).await {
            tracing::info!(job_id = job.id.0, name = %job.name, "Duplicate download rejected");
            let failure = JobFailure::DuplicateDetected {
                message: rejection.message,
                action: rejection.action,
            };
            let err = self.abort(job, failure).await;
            self.remove_best_effort(job.id, RemovalRequest::packages(collected.online.iter().copied()))
                .await;
            self.shared.registry.lock().await.remove(job.id);
            return Err(err);
        }

        if let Some(message) = policy.check_limits(job).await {
            tracing::info!(
                job_id = job.id.0,
                name = %job.name,
                size = job.size,
                "Download limit exceeded"
            );
            return Err(self.abort(job, JobFailure::QuotaExceeded(message)).await);
        }

        Ok(())
    }
}
