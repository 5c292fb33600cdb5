//! # remote-dl
//!
//! Orchestrates download jobs on a remote download manager (JDownloader-style
//! linkgrabber plus download list) on behalf of a chat bot.
//!
//! ## Design Philosophy
//!
//! remote-dl is designed to be:
//! - **Library-first** - The RPC transport and the messaging layer are traits
//!   implemented by the embedding application
//! - **Serialized where it matters** - One global lock guards the remote
//!   pending list while a job is submitted and collected
//! - **Event-driven** - Consumers subscribe to events, no polling required
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use remote_dl::{Config, Job, JobId, JobListener, JobSource, Orchestrator, RemoteSession, SelectionUi, UserId};
//!
//! async fn start(
//!     session: Arc<dyn RemoteSession>,
//!     ui: Arc<dyn SelectionUi>,
//!     listener: Arc<dyn JobListener>,
//! ) -> Result<(), Box<dyn std::error::Error>> {
//!     let orchestrator = Orchestrator::new(Config::default(), session, ui)?;
//!
//!     let mut events = orchestrator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let source = JobSource::detect("https://example.com/file.iso").await;
//!     let mut job = Job::new(JobId(1), source, "/data/1", UserId(42), listener);
//!     orchestrator.run(&mut job).await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Duplicate/limit policies and download slot admission
pub mod admission;
/// Configuration types
pub mod config;
/// Error types
pub mod error;
/// Download jobs and their listener callbacks
pub mod job;
/// Job orchestration pipeline (decomposed into one submodule per stage)
pub mod orchestrator;
/// Registry of jobs tracked on the remote service
pub mod registry;
/// Remote download service interface
pub mod remote;
/// Retry logic with exponential backoff
pub mod retry;
/// Interactive selection prompt
pub mod selection;
/// Core types and events
pub mod types;

// Re-export commonly used types
pub use admission::{
    Admission, AdmissionController, AdmissionPolicy, AllowAll, DuplicateRejection, ReleaseSignal,
    SlotAdmission,
};
pub use config::{Config, QueueConfig, RemoteConfig, RetryConfig, TimingConfig};
pub use error::{Error, JobFailure, RemoteError, Result, UserAction};
pub use job::{Job, JobListener, JobSource, SameDirGroup, UserId};
pub use orchestrator::Orchestrator;
pub use registry::{JobRegistry, PackageRecord};
pub use remote::{RemoteClient, RemoteSession};
pub use selection::{HandlerId, Prompt, PromptButton, PromptId, SelectionAction, SelectionUi};
pub use types::{Activation, Event, ExternalId, JobId, Stage, TaskStatus};
