//! Job orchestration split into one submodule per pipeline stage.
//!
//! The `Orchestrator` drives a job through these stages:
//! - [`connection`] - Session liveness probe and reconnect sequence
//! - [`submit`] - Idempotent pending-list reset, submission, resolution wait
//! - [`collect`] - Collection polling, redirect, join and job naming
//! - [`sanitize`] - Removal of corrupted packages and offline links
//! - [`gate`] - Duplicate and limit checks
//! - [`selection`] - Interactive selection prompt
//! - [`queue`] - Download slot admission
//! - [`activate`] - Promotion, identity re-resolution and force start
//!
//! Stages 1 to 4 run while holding the global orchestration lock, which
//! guards both the [`JobRegistry`] and the remote service's shared pending
//! list. Later stages only re-acquire it for short registry updates.

mod activate;
mod collect;
mod connection;
mod gate;
mod queue;
mod sanitize;
mod selection;
mod submit;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

pub(crate) use collect::Collected;

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::admission::{AdmissionController, AdmissionPolicy, AllowAll, SlotAdmission};
use crate::config::Config;
use crate::error::{JobFailure, RemoteError, Result};
use crate::job::Job;
use crate::registry::{JobRegistry, PackageRecord};
use crate::remote::{RemoteClient, RemoteSession, RemovalRequest};
use crate::selection::SelectionUi;
use crate::types::{Activation, Event, ExternalId, JobId, Stage, TaskStatus};

/// State shared by every job driven by one orchestrator
#[derive(Clone)]
pub(crate) struct SharedState {
    /// Global orchestration lock; the guard owns the registry and the remote pending list
    pub(crate) registry: Arc<tokio::sync::Mutex<JobRegistry>>,
    /// Status board rendered by the messaging layer
    pub(crate) statuses: Arc<tokio::sync::Mutex<HashMap<JobId, TaskStatus>>>,
    /// Jobs that hold a download slot
    pub(crate) running: Arc<tokio::sync::Mutex<HashSet<JobId>>>,
}

impl SharedState {
    fn new() -> Self {
        Self {
            registry: Arc::new(tokio::sync::Mutex::new(JobRegistry::new())),
            statuses: Arc::new(tokio::sync::Mutex::new(HashMap::new())),
            running: Arc::new(tokio::sync::Mutex::new(HashSet::new())),
        }
    }
}

/// Collaborators owned by the surrounding application
#[derive(Clone)]
pub(crate) struct Collaborators {
    /// Duplicate and limit checks
    pub(crate) policy: Arc<dyn AdmissionPolicy>,
    /// Download slot controller
    pub(crate) admission: Arc<dyn AdmissionController>,
    /// Messaging layer for the selection prompt
    pub(crate) ui: Arc<dyn SelectionUi>,
}

/// Why a stage stopped the pipeline
#[derive(Debug)]
pub(crate) enum StageError {
    /// Already reported to the listener and cleaned up
    Aborted(JobFailure),
    /// Remote call failed after retries; not reported yet
    Remote(RemoteError),
}

impl From<RemoteError> for StageError {
    fn from(error: RemoteError) -> Self {
        StageError::Remote(error)
    }
}

type StageResult<T> = std::result::Result<T, StageError>;

/// Drives download jobs from submission to an active transfer (cloneable - all fields are Arc-wrapped)
#[derive(Clone)]
pub struct Orchestrator {
    /// Configuration (wrapped in Arc for sharing across tasks)
    pub(crate) config: Arc<Config>,
    /// Remote service with retrying calls
    pub(crate) remote: RemoteClient,
    /// Application-side collaborators
    pub(crate) collaborators: Collaborators,
    /// Registry, status board and running set
    pub(crate) shared: SharedState,
    /// Event broadcast channel sender (multiple subscribers supported)
    pub(crate) event_tx: tokio::sync::broadcast::Sender<Event>,
}

impl Orchestrator {
    /// Create an orchestrator that admits every job and bounds slots per [`QueueConfig`](crate::config::QueueConfig)
    pub fn new(
        config: Config,
        session: Arc<dyn RemoteSession>,
        ui: Arc<dyn SelectionUi>,
    ) -> Result<Self> {
        config.validate()?;

        let (event_tx, _rx) = tokio::sync::broadcast::channel(1000);
        let remote = RemoteClient::new(session, config.retry.clone());
        let admission = Arc::new(SlotAdmission::new(config.queue.max_concurrent_downloads));

        Ok(Self {
            config: Arc::new(config),
            remote,
            collaborators: Collaborators {
                policy: Arc::new(AllowAll),
                admission,
                ui,
            },
            shared: SharedState::new(),
            event_tx,
        })
    }

    /// Use the application's duplicate and limit checks
    pub fn with_policy(mut self, policy: Arc<dyn AdmissionPolicy>) -> Self {
        self.collaborators.policy = policy;
        self
    }

    /// Use the application's download slot controller
    pub fn with_admission(mut self, admission: Arc<dyn AdmissionController>) -> Self {
        self.collaborators.admission = admission;
        self
    }

    /// Subscribe to orchestrator events
    ///
    /// Events are dropped for subscribers that fall more than 1000 events behind.
    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Copy of the registry
    pub async fn registry_snapshot(&self) -> HashMap<JobId, PackageRecord> {
        self.shared.registry.lock().await.snapshot()
    }

    /// Status board entry of a job
    pub async fn status_of(&self, job: JobId) -> Option<TaskStatus> {
        self.shared.statuses.lock().await.get(&job).cloned()
    }

    /// Whether the job holds a download slot
    pub async fn is_running(&self, job: JobId) -> bool {
        self.shared.running.lock().await.contains(&job)
    }

    /// Forget a job whose transfer finished or was stopped, freeing its slot
    pub async fn finish_job(&self, job: JobId) {
        self.forget_job(job).await;
    }

    /// Run a job through every stage until its transfer is active
    ///
    /// Failures are reported once through the job's listener before they are
    /// returned, and the job's registry entry is gone unless the limit check
    /// rejected it.
    pub async fn run(&self, job: &mut Job) -> std::result::Result<Activation, JobFailure> {
        tracing::info!(job_id = job.id.0, target = %job.target_dir.display(), "Starting job");

        match self.run_stages(job).await {
            Ok(activation) => Ok(activation),
            Err(StageError::Aborted(failure)) => Err(failure),
            Err(StageError::Remote(error)) => {
                let failure = JobFailure::Remote(error);
                self.report(job, &failure).await;
                self.remove_tracked_packages(job.id).await;
                self.forget_job(job.id).await;
                Err(failure)
            }
        }
    }

    async fn run_stages(&self, job: &mut Job) -> StageResult<Activation> {
        let mut collected = {
            let mut registry = self.shared.registry.lock().await;
            self.ensure_connected(job).await?;
            self.reset_pending_list(&registry).await?;
            self.submit_source(job).await?;
            self.wait_until_resolved(job).await?;
            let mut collected = self.collect_packages(&mut registry, job).await?;
            self.sanitize(&mut collected).await?;
            collected
        };

        if job.name.is_empty() {
            job.name = std::mem::take(&mut collected.derived_name);
        }
        tracing::debug!(
            job_id = job.id.0,
            name = %job.name,
            size = job.size,
            packages = collected.online.len(),
            "Packages collected"
        );

        self.check_policies(job, &collected).await?;
        self.select_files(job, &collected).await?;
        let was_queued = self.wait_for_slot(job, &collected).await?;
        self.activate(job, &collected, was_queued).await
    }

    /// Report a failure through the listener and the event stream
    pub(crate) async fn report(&self, job: &Job, failure: &JobFailure) {
        let message = failure.message();
        tracing::error!(job_id = job.id.0, code = failure.code(), error = %failure, "Job aborted");

        job.listener()
            .on_download_failed(&message, failure.action())
            .await;

        let event = if failure.is_cancellation() {
            Event::Cancelled { job: job.id }
        } else {
            Event::Failed {
                job: job.id,
                code: failure.code().to_string(),
                error: message,
            }
        };
        self.emit(event);
    }

    /// Report a failure and turn it into a [`StageError::Aborted`]
    pub(crate) async fn abort(&self, job: &Job, failure: JobFailure) -> StageError {
        self.report(job, &failure).await;
        StageError::Aborted(failure)
    }

    pub(crate) fn emit(&self, event: Event) {
        // No subscribers is fine
        self.event_tx.send(event).ok();
    }

    /// Remove pending links during cleanup; a failure is logged, never reported
    pub(crate) async fn remove_best_effort(&self, job: JobId, request: RemovalRequest) {
        if let Err(e) = self.remote.remove_pending_links(&request).await {
            tracing::warn!(
                job_id = job.0,
                error = %e,
                packages = request.package_ids.len(),
                "Failed to remove pending links during cleanup"
            );
        }
    }

    /// Remove whatever the registry still attributes to a job; failures are logged
    async fn remove_tracked_packages(&self, job: JobId) {
        let Some(record) = self.shared.registry.lock().await.get(job).cloned() else {
            return;
        };
        match record.stage {
            Stage::Collecting => {
                self.remove_best_effort(job, RemovalRequest::packages(record.members))
                    .await;
            }
            Stage::Downloading => {
                let packages: Vec<ExternalId> = record.members.into_iter().collect();
                if let Err(e) = self.remote.remove_active_packages(&packages).await {
                    tracing::warn!(
                        job_id = job.0,
                        error = %e,
                        packages = packages.len(),
                        "Failed to remove download packages during cleanup"
                    );
                }
            }
        }
    }

    /// Drop every trace of a job from the shared state, freeing its slot
    pub(crate) async fn forget_job(&self, job: JobId) {
        self.shared.registry.lock().await.remove(job);
        self.shared.statuses.lock().await.remove(&job);
        let held_slot = self.shared.running.lock().await.remove(&job);
        if held_slot {
            self.collaborators.admission.finish(job).await;
        }
    }
}
