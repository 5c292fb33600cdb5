//! Pending-list reset, link submission and the resolution wait.

use base64::Engine as _;

use super::{Orchestrator, StageResult};
use crate::error::JobFailure;
use crate::job::{Job, JobSource};
use crate::registry::JobRegistry;
use crate::remote::{AddLinksRequest, PackageQuery, RemovalRequest};

impl Orchestrator {
    /// Clear leftovers from earlier jobs without touching tracked ones
    ///
    /// With nothing tracked the whole pending list and download list are
    /// wiped. Otherwise only pending packages still saving to the default
    /// root are removed: every tracked job's packages were redirected away
    /// from it during collection.
    pub(super) async fn reset_pending_list(&self, registry: &JobRegistry) -> StageResult<()> {
        if registry.is_empty() {
            self.remote.clear_pending_links().await?;
            let active = self
                .remote
                .query_active_packages(PackageQuery::save_paths())
                .await?;
            let ids: Vec<_> = active.iter().map(|package| package.uuid).collect();
            self.remote.remove_active_packages(&ids).await?;
            tracing::debug!(removed_active = ids.len(), "Remote lists reset");
            return Ok(());
        }

        let default_root = &self.config.remote.default_root;
        let pending = self
            .remote
            .query_pending_packages(PackageQuery::save_paths())
            .await?;
        let stale = RemovalRequest::packages(
            pending
                .iter()
                .filter(|package| package.save_to.starts_with(default_root))
                .map(|package| package.uuid),
        );
        if !stale.is_empty() {
            tracing::debug!(
                packages = stale.package_ids.len(),
                tracked_jobs = registry.len(),
                "Removing stale pending packages"
            );
            self.remote.remove_pending_links(&stale).await?;
        }
        Ok(())
    }

    /// Submit the job's links or container to the pending list
    pub(super) async fn submit_source(&self, job: &Job) -> StageResult<()> {
        match &job.source {
            JobSource::Container(path) => {
                let content = match tokio::fs::read(path).await {
                    Ok(content) => content,
                    Err(e) => {
                        let failure = JobFailure::Container {
                            path: path.clone(),
                            reason: e.to_string(),
                        };
                        return Err(self.abort(job, failure).await);
                    }
                };
                let payload = format!(
                    ";base64,{}",
                    base64::engine::general_purpose::STANDARD.encode(&content)
                );
                tracing::info!(
                    job_id = job.id.0,
                    path = %path.display(),
                    bytes = content.len(),
                    "Submitting container"
                );
                self.remote
                    .add_container(&self.config.remote.container_kind, &payload)
                    .await?;
            }
            JobSource::Links(links) => {
                tracing::info!(job_id = job.id.0, links = links.len(), "Submitting links");
                self.remote
                    .add_links(AddLinksRequest::new(links, &job.name))
                    .await?;
            }
        }
        Ok(())
    }

    /// Wait until the service stops resolving the submitted links
    pub(super) async fn wait_until_resolved(&self, job: &Job) -> StageResult<()> {
        let timing = &self.config.timing;
        tokio::time::sleep(timing.submit_settle).await;

        for _ in 0..timing.resolve_max_polls {
            if !self.remote.is_resolving_links().await? {
                return Ok(());
            }
            tokio::time::sleep(timing.resolve_poll_interval).await;
        }

        let failure = JobFailure::ResolveTimeout {
            polls: timing.resolve_max_polls,
        };
        Err(self.abort(job, failure).await)
    }
}
