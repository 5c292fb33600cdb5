//! Promotion into the download list and force start.

use super::{Collected, Orchestrator, StageResult};
use crate::error::JobFailure;
use crate::job::Job;
use crate::remote::PackageQuery;
use crate::types::{Activation, Event, ExternalId, TaskStatus};

impl Orchestrator {
    /// Promote the job's packages and start them
    ///
    /// Promotion gives packages new ids, so the job's identity is looked up
    /// again by save path and the registry record is replaced. If nothing is
    /// found under the job's directory the packages were removed by hand in
    /// the web console in the meantime.
    pub(super) async fn activate(
        &self,
        job: &Job,
        collected: &Collected,
        was_queued: bool,
    ) -> StageResult<Activation> {
        self.remote
            .promote_to_download_list(&collected.online)
            .await?;
        tokio::time::sleep(self.config.timing.activation_settle).await;

        let active = self
            .remote
            .query_active_packages(PackageQuery::save_paths())
            .await?;
        let packages: Vec<ExternalId> = active
            .iter()
            .filter(|package| package.is_under(&job.target_dir))
            .map(|package| package.uuid)
            .collect();

        let Some(&correlation_id) = packages.first() else {
            tracing::warn!(
                job_id = job.id.0,
                target = %job.target_dir.display(),
                "No active package under target directory"
            );
            let err = self.abort(job, JobFailure::ManualRemoval).await;
            self.forget_job(job.id).await;
            return Err(err);
        };

        self.shared.registry.lock().await.promote(
            job.id,
            correlation_id,
            packages.iter().copied().collect(),
        );

        self.remote.force_start(&packages).await?;

        self.shared.statuses.lock().await.insert(
            job.id,
            TaskStatus::Active {
                correlation_id,
                name: job.name.clone(),
                size: job.size,
            },
        );
        self.emit(Event::Activated {
            job: job.id,
            package: correlation_id,
            path: job.target_dir.clone(),
        });

        if !was_queued {
            tracing::info!(job_id = job.id.0, name = %job.name, "Download started");
            job.listener().on_download_started().await;
            if job.multiplicity <= 1 {
                job.listener().send_status_message().await;
            }
        }

        Ok(Activation {
            correlation_id,
            packages,
            was_queued,
        })
    }
}
