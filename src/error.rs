//! Error types for remote-dl
//!
//! This module provides the error handling for the library:
//! - [`RemoteError`] for failures of individual calls against the remote service
//! - [`JobFailure`] for the reasons a job can be aborted by the orchestrator
//! - [`Error`] for construction and configuration problems
//!
//! Job failures are never raised past the orchestrator. They are reported
//! once through the job's listener and also returned to the caller for
//! inspection.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for remote-dl operations
pub type Result<T> = std::result::Result<T, Error>;

/// Message used when collection times out before the job could be named
pub const NOT_ADDED_MESSAGE: &str = "Download Not Added! Maybe some issues in jdownloader or site!";

/// Message used when activated packages vanished from the remote console
pub const REMOVED_MANUALLY_MESSAGE: &str = "This Download have been removed manually!";

/// Main error type for remote-dl
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "timing.collection_budget")
        key: Option<String>,
    },

    /// Remote service call failed
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Failure of a single call against the remote download service
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RemoteError {
    /// Transport-level failure (connection reset, DNS, TLS, ...)
    #[error("transport failure: {0}")]
    Transport(String),

    /// The call did not complete within its per-call timeout
    #[error("call {operation} timed out")]
    Timeout {
        /// Name of the remote operation that timed out
        operation: String,
    },

    /// The service answered with an application error
    #[error("API error {code}: {message}")]
    Api {
        /// Service-specific error code
        code: u16,
        /// Error message returned by the service
        message: String,
    },

    /// The download device is offline or busy
    #[error("device unavailable: {0}")]
    DeviceUnavailable(String),

    /// No session has been established with the service
    #[error("not connected to the remote service")]
    NotConnected,
}

/// Reasons a job is aborted before its transfer is activated
#[derive(Debug, Error)]
pub enum JobFailure {
    /// Session unreachable after the reconnect sequence
    #[error("connection failure: {0}")]
    ConnectionFailure(String),

    /// The service never finished resolving the submitted links
    #[error("link resolution did not finish after {polls} polls")]
    ResolveTimeout {
        /// Number of resolution polls performed
        polls: u32,
    },

    /// No package confirmed online within the collection budget
    #[error("collection timed out: {message}")]
    CollectionTimeout {
        /// Derived job name if known, otherwise [`NOT_ADDED_MESSAGE`]
        message: String,
    },

    /// Every discovered package has zero online links
    #[error("all links corrupted: {package_name}")]
    AllLinksCorrupted {
        /// Name of the last package reported with no online links
        package_name: String,
    },

    /// The duplicate checker matched an existing download
    #[error("duplicate detected: {message}")]
    DuplicateDetected {
        /// Message shown to the user
        message: String,
        /// Optional follow-up action offered to the user
        action: Option<UserAction>,
    },

    /// A per-user or global limit rejected the job
    #[error("limit exceeded: {0}")]
    QuotaExceeded(String),

    /// The user pressed cancel on the selection prompt
    #[error("selection cancelled")]
    SelectionCancelled,

    /// Nobody answered the selection prompt in time
    #[error("selection timed out")]
    SelectionTimedOut,

    /// The job was cancelled while waiting for a download slot
    #[error("cancelled while queued")]
    CancelledWhileQueued,

    /// Packages vanished between promotion and activation
    #[error("{}", REMOVED_MANUALLY_MESSAGE)]
    ManualRemoval,

    /// The local container file could not be read
    #[error("failed to read container {path}: {reason}")]
    Container {
        /// Container file path
        path: PathBuf,
        /// Underlying I/O failure
        reason: String,
    },

    /// A remote call kept failing after all retries
    #[error("remote error: {0}")]
    Remote(#[from] RemoteError),
}

impl JobFailure {
    /// Text handed to the job's failure callback
    pub fn message(&self) -> String {
        match self {
            JobFailure::ConnectionFailure(msg) => msg.clone(),
            JobFailure::CollectionTimeout { message } => message.clone(),
            JobFailure::AllLinksCorrupted { package_name } => package_name.clone(),
            JobFailure::DuplicateDetected { message, .. } => message.clone(),
            JobFailure::QuotaExceeded(msg) => msg.clone(),
            JobFailure::SelectionCancelled => "Task has been cancelled.".to_string(),
            JobFailure::SelectionTimedOut => "Timed Out. Task has been cancelled!".to_string(),
            other => other.to_string(),
        }
    }

    /// Follow-up action attached to the failure, if any
    pub fn action(&self) -> Option<&UserAction> {
        match self {
            JobFailure::DuplicateDetected { action, .. } => action.as_ref(),
            _ => None,
        }
    }

    /// Whether the job was cancelled rather than failed
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            JobFailure::SelectionCancelled
                | JobFailure::SelectionTimedOut
                | JobFailure::CancelledWhileQueued
        )
    }

    /// Machine-readable failure code
    pub fn code(&self) -> &'static str {
        match self {
            JobFailure::ConnectionFailure(_) => "connection_failure",
            JobFailure::ResolveTimeout { .. } => "resolve_timeout",
            JobFailure::CollectionTimeout { .. } => "collection_timeout",
            JobFailure::AllLinksCorrupted { .. } => "all_links_corrupted",
            JobFailure::DuplicateDetected { .. } => "duplicate_detected",
            JobFailure::QuotaExceeded(_) => "quota_exceeded",
            JobFailure::SelectionCancelled => "selection_cancelled",
            JobFailure::SelectionTimedOut => "selection_timed_out",
            JobFailure::CancelledWhileQueued => "cancelled_while_queued",
            JobFailure::ManualRemoval => "manual_removal",
            JobFailure::Container { .. } => "container_unreadable",
            JobFailure::Remote(_) => "remote_error",
        }
    }
}

/// A button-style action offered alongside a failure message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserAction {
    /// Button label
    pub label: String,
    /// URL or callback payload behind the button
    pub target: String,
}
