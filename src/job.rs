//! Download jobs and the callbacks they report through.

use async_trait::async_trait;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

use crate::error::UserAction;
use crate::types::JobId;

/// Identity of the user who owns a job
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub i64);

/// What the remote service is asked to download
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobSource {
    /// Plain links, submitted as-is
    Links(Vec<String>),
    /// Local container file, uploaded as a base64 blob
    Container(PathBuf),
}

impl JobSource {
    /// Classify a user-supplied source: an existing local file is a container
    pub async fn detect(source: &str) -> Self {
        let path = Path::new(source);
        match tokio::fs::try_exists(path).await {
            Ok(true) => JobSource::Container(path.to_path_buf()),
            _ => JobSource::Links(
                source
                    .split_whitespace()
                    .map(str::to_string)
                    .collect(),
            ),
        }
    }
}

/// Callbacks into the messaging layer that owns the job
#[async_trait]
pub trait JobListener: Send + Sync {
    /// The job was accepted (queued or started)
    async fn on_download_started(&self);

    /// The job was aborted; called exactly once per failure
    async fn on_download_failed(&self, message: &str, action: Option<&UserAction>);

    /// Render or refresh the shared status message
    async fn send_status_message(&self);
}

/// Jobs submitted together that must land in one directory
///
/// Their resolved packages are merged into a single package named after
/// the group.
#[derive(Debug)]
pub struct SameDirGroup {
    name: String,
    members: Mutex<BTreeSet<JobId>>,
}

impl SameDirGroup {
    /// Create a group with the given directory name and members
    pub fn new(name: impl Into<String>, members: impl IntoIterator<Item = JobId>) -> Self {
        Self {
            name: name.into(),
            members: Mutex::new(members.into_iter().collect()),
        }
    }

    /// Directory and merged package name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Remove a job from the group so the others stop waiting for it
    pub fn detach(&self, job: JobId) -> bool {
        match self.members.lock() {
            Ok(mut members) => members.remove(&job),
            Err(poisoned) => poisoned.into_inner().remove(&job),
        }
    }

    /// Whether the job is still attached to the group
    pub fn contains(&self, job: JobId) -> bool {
        match self.members.lock() {
            Ok(members) => members.contains(&job),
            Err(poisoned) => poisoned.into_inner().contains(&job),
        }
    }

    /// Jobs still attached to the group
    pub fn members(&self) -> Vec<JobId> {
        match self.members.lock() {
            Ok(members) => members.iter().copied().collect(),
            Err(poisoned) => poisoned.into_inner().iter().copied().collect(),
        }
    }
}

/// A user's download request
///
/// Created by the caller, mutated by every pipeline stage, and dropped once
/// [`Orchestrator::run`](crate::Orchestrator::run) returns.
pub struct Job {
    /// Stable id of the job
    pub id: JobId,
    /// Links or container to submit
    pub source: JobSource,
    /// Display name; derived from the resolved packages when empty
    pub name: String,
    /// Directory the downloaded files must land in
    pub target_dir: PathBuf,
    /// Ask the user to pick files on the web console before starting
    pub interactive_select: bool,
    /// Merge resolved packages with the rest of the same-directory group
    pub join_into_same_dir: bool,
    /// Total size in bytes of the online packages
    pub size: u64,
    /// Owner of the job
    pub user: UserId,
    /// Number of jobs submitted together with this one
    pub multiplicity: u32,
    /// Group for joined jobs
    pub same_dir: Option<Arc<SameDirGroup>>,
    cancel: CancellationToken,
    listener: Arc<dyn JobListener>,
}

impl Job {
    /// Create a job with default flags
    pub fn new(
        id: JobId,
        source: JobSource,
        target_dir: impl Into<PathBuf>,
        user: UserId,
        listener: Arc<dyn JobListener>,
    ) -> Self {
        Self {
            id,
            source,
            name: String::new(),
            target_dir: target_dir.into(),
            interactive_select: false,
            join_into_same_dir: false,
            size: 0,
            user,
            multiplicity: 1,
            same_dir: None,
            cancel: CancellationToken::new(),
            listener,
        }
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Require the interactive selection prompt
    pub fn with_interactive_select(mut self, enabled: bool) -> Self {
        self.interactive_select = enabled;
        self
    }

    /// Join the job into a same-directory group
    pub fn with_same_dir(mut self, group: Arc<SameDirGroup>) -> Self {
        self.join_into_same_dir = true;
        self.same_dir = Some(group);
        self
    }

    /// Set how many jobs were submitted together
    pub fn with_multiplicity(mut self, multiplicity: u32) -> Self {
        self.multiplicity = multiplicity;
        self
    }

    /// Cancel the job; observed at the next resumption point
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the job was cancelled
    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Handle that cancels this job, for use from other tasks
    pub fn cancel_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Listener the job reports through
    pub fn listener(&self) -> &Arc<dyn JobListener> {
        &self.listener
    }

    /// Detach the job from its same-directory group, if any
    pub fn remove_from_same_dir(&self) {
        if let Some(group) = &self.same_dir {
            group.detach(self.id);
        }
    }
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("id", &self.id)
            .field("source", &self.source)
            .field("name", &self.name)
            .field("target_dir", &self.target_dir)
            .field("interactive_select", &self.interactive_select)
            .field("join_into_same_dir", &self.join_into_same_dir)
            .field("size", &self.size)
            .field("cancelled", &self.is_cancelled())
            .finish_non_exhaustive()
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    struct SilentListener;

    #[async_trait]
    impl JobListener for SilentListener {
        async fn on_download_started(&self) {}
        async fn on_download_failed(&self, _message: &str, _action: Option<&UserAction>) {}
        async fn send_status_message(&self) {}
    }

    fn job() -> Job {
        Job::new(
            JobId(1),
            JobSource::Links(vec!["https://example.com/a".into()]),
            "/data/1",
            UserId(7),
            Arc::new(SilentListener),
        )
    }

    #[tokio::test]
    async fn detect_existing_file_as_container() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("links.dlc");
        std::fs::write(&path, b"container").unwrap();

        let source = JobSource::detect(path.to_str().unwrap()).await;
        assert_eq!(source, JobSource::Container(path));
    }

    #[tokio::test]
    async fn detect_urls_as_links() {
        let source = JobSource::detect("https://a.example/1 https://b.example/2").await;
        assert_eq!(
            source,
            JobSource::Links(vec![
                "https://a.example/1".to_string(),
                "https://b.example/2".to_string()
            ])
        );
    }

    #[test]
    fn cancel_token_is_shared() {
        let job = job();
        let token = job.cancel_token();
        assert!(!job.is_cancelled());
        token.cancel();
        assert!(job.is_cancelled());
    }

    #[test]
    fn same_dir_join_sets_flag_and_detaches() {
        let group = Arc::new(SameDirGroup::new("season-1", [JobId(1), JobId(2)]));
        let job = job().with_same_dir(group.clone());
        assert!(job.join_into_same_dir);

        job.remove_from_same_dir();
        assert_eq!(group.members(), vec![JobId(2)]);
        assert!(!group.detach(JobId(1)), "second detach is a no-op");
    }
}
