//! Download slot admission.

use super::{Collected, Orchestrator, StageError, StageResult};
use crate::admission::Admission;
use crate::error::JobFailure;
use crate::job::Job;
use crate::remote::RemovalRequest;
use crate::types::{Event, TaskStatus};

impl Orchestrator {
    /// Wait for a download slot; returns whether the job had to queue
    ///
    /// A job cancelled while queued is withdrawn and forgotten without a
    /// failure report. A slot handed over to it in the meantime is given back.
    pub(super) async fn wait_for_slot(&self, job: &Job, collected: &Collected) -> StageResult<bool> {
        let admission = &self.collaborators.admission;

        let mut signal = match admission.admit(job).await {
            Admission::Immediate => {
                self.shared.running.lock().await.insert(job.id);
                return Ok(false);
            }
            Admission::Queued(signal) => signal,
        };

        let correlation_id = {
            let registry = self.shared.registry.lock().await;
            registry
                .get(job.id)
                .map(|record| record.correlation_id)
                .or_else(|| collected.online.first().copied())
        };
        if let Some(correlation_id) = correlation_id {
            self.shared.statuses.lock().await.insert(
                job.id,
                TaskStatus::Queued {
                    correlation_id,
                    name: job.name.clone(),
                },
            );
        }

        tracing::info!(job_id = job.id.0, name = %job.name, "Added to download queue");
        self.emit(Event::Queued {
            job: job.id,
            name: job.name.clone(),
        });
        job.listener().on_download_started().await;
        if job.multiplicity <= 1 {
            job.listener().send_status_message().await;
        }

        let cancel = job.cancel_token();
        let released = tokio::select! {
            released = signal.released() => released,
            _ = cancel.cancelled() => false,
        };

        if !released || job.is_cancelled() {
            job.cancel();
            admission.withdraw(job.id).await;
            // The slot may have been handed over before the cancel was seen
            if released || signal.is_released() {
                admission.finish(job.id).await;
            }
            self.shared.statuses.lock().await.remove(&job.id);
            self.remove_best_effort(job.id, RemovalRequest::packages(collected.online.iter().copied()))
                .await;
            self.shared.registry.lock().await.remove(job.id);
            tracing::info!(job_id = job.id.0, "Queued job cancelled");
            self.emit(Event::Cancelled { job: job.id });
            return Err(StageError::Aborted(JobFailure::CancelledWhileQueued));
        }

        tracing::info!(job_id = job.id.0, name = %job.name, "Starting queued download");
        self.shared.running.lock().await.insert(job.id);
        Ok(true)
    }
}
