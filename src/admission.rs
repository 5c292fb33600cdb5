//! Admission policies and the download-slot controller.
//!
//! [`AdmissionPolicy`] wraps the duplicate and quota checks owned by the
//! surrounding application. [`AdmissionController`] decides whether a job
//! may start now or has to wait for a slot; [`SlotAdmission`] is the
//! built-in bounded implementation.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;
use tokio::sync::oneshot;

use crate::error::UserAction;
use crate::job::Job;
use crate::types::JobId;

/// Duplicate check result that blocks a job
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DuplicateRejection {
    /// Message shown to the user
    pub message: String,
    /// Optional button, e.g. a link to the existing upload
    pub action: Option<UserAction>,
}

/// Policy checks run after the job's packages are resolved
#[async_trait]
pub trait AdmissionPolicy: Send + Sync {
    /// Reject the job if the same content was already downloaded
    async fn check_duplicate(&self, job: &Job) -> Option<DuplicateRejection>;

    /// Reject the job if a size or count limit is exceeded; returns the message
    async fn check_limits(&self, job: &Job) -> Option<String>;
}

/// Policy that admits everything
#[derive(Clone, Copy, Debug, Default)]
pub struct AllowAll;

#[async_trait]
impl AdmissionPolicy for AllowAll {
    async fn check_duplicate(&self, _job: &Job) -> Option<DuplicateRejection> {
        None
    }

    async fn check_limits(&self, _job: &Job) -> Option<String> {
        None
    }
}

/// Signal that releases a queued job
#[derive(Debug)]
pub struct ReleaseSignal(oneshot::Receiver<()>);

impl ReleaseSignal {
    /// Create a signal and the handle that fires it
    pub fn channel() -> (oneshot::Sender<()>, Self) {
        let (tx, rx) = oneshot::channel();
        (tx, Self(rx))
    }

    /// Wait until released; false if the releasing side went away instead
    pub async fn released(&mut self) -> bool {
        (&mut self.0).await.is_ok()
    }

    /// Whether the slot was already handed over, without waiting
    pub fn is_released(&mut self) -> bool {
        self.0.try_recv().is_ok()
    }
}

/// Decision of the admission controller
#[derive(Debug)]
pub enum Admission {
    /// Start right away
    Immediate,
    /// Wait for the signal before starting
    Queued(ReleaseSignal),
}

/// Decides, under a global concurrency bound, whether a job must queue
#[async_trait]
pub trait AdmissionController: Send + Sync {
    /// Admit a job or hand back the signal it must wait for
    async fn admit(&self, job: &Job) -> Admission;

    /// Forget a queued job that was cancelled before release
    async fn withdraw(&self, job: JobId);

    /// A job holding a slot finished or was aborted
    async fn finish(&self, job: JobId);
}

#[derive(Debug, Default)]
struct SlotState {
    running: usize,
    waiting: VecDeque<(JobId, oneshot::Sender<()>)>,
}

/// Bounded download slots with a FIFO of waiting jobs
///
/// Call [`release`](SlotAdmission::release) when a running download finishes;
/// the slot is handed to the oldest waiter still listening.
#[derive(Debug)]
pub struct SlotAdmission {
    limit: Option<usize>,
    state: Mutex<SlotState>,
}

impl SlotAdmission {
    /// Create a controller; `None` means unlimited
    pub fn new(limit: Option<usize>) -> Self {
        Self {
            limit,
            state: Mutex::new(SlotState::default()),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, SlotState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Free a slot, waking the next queued job if any
    pub fn release(&self) {
        let mut state = self.state();
        while let Some((job, waiter)) = state.waiting.pop_front() {
            if waiter.send(()).is_ok() {
                tracing::debug!(job_id = job.0, "Released queued job");
                return;
            }
        }
        state.running = state.running.saturating_sub(1);
    }

    /// Number of jobs holding a slot
    pub fn running(&self) -> usize {
        self.state().running
    }

    /// Number of jobs waiting for a slot
    pub fn queued(&self) -> usize {
        self.state().waiting.len()
    }
}

#[async_trait]
impl AdmissionController for SlotAdmission {
    async fn admit(&self, job: &Job) -> Admission {
        let mut state = self.state();
        match self.limit {
            Some(limit) if state.running >= limit => {
                let (tx, signal) = ReleaseSignal::channel();
                state.waiting.push_back((job.id, tx));
                tracing::debug!(
                    job_id = job.id.0,
                    running = state.running,
                    limit,
                    "All download slots busy, queueing job"
                );
                Admission::Queued(signal)
            }
            _ => {
                state.running += 1;
                Admission::Immediate
            }
        }
    }

    async fn withdraw(&self, job: JobId) {
        self.state().waiting.retain(|(queued, _)| *queued != job);
    }

    async fn finish(&self, job: JobId) {
        tracing::debug!(job_id = job.0, "Download slot freed");
        self.release();
    }
}
