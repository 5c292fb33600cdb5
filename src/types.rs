//! Core types for remote-dl

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Stable identifier of a job inside this process
///
/// Chosen by the caller (e.g. the id of the message that requested the
/// download) and never changes, unlike the remote service's package ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl JobId {
    /// Create a new JobId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier assigned by the remote service to a package or link
///
/// Not stable across stages: promoting a package into the download list
/// gives it a new id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExternalId(pub u64);

impl From<u64> for ExternalId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for ExternalId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Which remote list a tracked job currently lives in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Links are being resolved in the pending (linkgrabber) list
    Collecting,
    /// Packages were promoted into the active download list
    Downloading,
}

/// Entry of the shared task status board
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    /// Waiting for a download slot
    Queued {
        /// Correlation id at the time the job was queued
        correlation_id: ExternalId,
        /// Display name of the job
        name: String,
    },
    /// Transfer running on the remote service
    Active {
        /// Correlation id re-resolved after activation
        correlation_id: ExternalId,
        /// Display name of the job
        name: String,
        /// Accumulated size in bytes
        size: u64,
    },
}

impl TaskStatus {
    /// Correlation id the status refers to
    pub fn correlation_id(&self) -> ExternalId {
        match self {
            TaskStatus::Queued { correlation_id, .. } | TaskStatus::Active { correlation_id, .. } => {
                *correlation_id
            }
        }
    }
}

/// Outcome of a job that reached the active download stage
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Activation {
    /// Correlation id after re-resolution in the download list
    pub correlation_id: ExternalId,
    /// All download-list packages attributed to the job
    pub packages: Vec<ExternalId>,
    /// Whether the job had to wait for a download slot
    pub was_queued: bool,
}

/// Events emitted by the orchestrator
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Job is waiting for a download slot
    Queued {
        /// Job ID
        job: JobId,
        /// Job name
        name: String,
    },

    /// Job's packages were force-started on the remote service
    Activated {
        /// Job ID
        job: JobId,
        /// Correlation id in the download list
        package: ExternalId,
        /// Where the packages are saved
        path: PathBuf,
    },

    /// Job aborted with an error
    Failed {
        /// Job ID
        job: JobId,
        /// Machine-readable failure code
        code: String,
        /// Message reported to the user
        error: String,
    },

    /// Job was cancelled by the user or by a timeout
    Cancelled {
        /// Job ID
        job: JobId,
    },
}
