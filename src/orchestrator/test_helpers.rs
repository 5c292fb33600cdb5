//! Shared test helpers for driving an Orchestrator against scripted collaborators.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::admission::{AdmissionPolicy, DuplicateRejection};
use crate::config::{Config, RetryConfig, TimingConfig};
use crate::error::{RemoteError, UserAction};
use crate::job::{Job, JobListener, JobSource, UserId};
use crate::orchestrator::Orchestrator;
use crate::remote::{
    ActivePackage, AddLinksRequest, LinkQuery, PackageQuery, PendingLink, PendingPackage,
    RemoteResult, RemoteSession, RemovalRequest,
};
use crate::selection::{HandlerId, Prompt, PromptId, SelectionAction, SelectionUi};
use crate::types::{ExternalId, JobId};

pub(crate) const DEFAULT_ROOT: &str = "/root/Downloads";

/// Every call the orchestrator made against the mock, in order
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum RemoteCall {
    GetVersion,
    Authenticate,
    Reboot,
    ConnectDevice,
    ClearPending,
    QueryPending(PackageQuery),
    AddLinks(AddLinksRequest),
    AddContainer { kind: String, payload: String },
    RemovePending(RemovalRequest),
    SetDirectory { dir: PathBuf, ids: Vec<ExternalId> },
    Merge { name: String, dir: PathBuf, ids: Vec<ExternalId> },
    IsResolving,
    QueryLinks(LinkQuery),
    Promote(Vec<ExternalId>),
    QueryActive(PackageQuery),
    RemoveActive(Vec<ExternalId>),
    ForceStart(Vec<ExternalId>),
}

/// Remote session answering from scripted responses
///
/// Collection polls pop the pending script front to back; the last entry
/// keeps being returned once the script is exhausted.
pub(crate) struct MockRemote {
    calls: Mutex<Vec<RemoteCall>>,
    device: AtomicBool,
    version_errors: Mutex<VecDeque<RemoteError>>,
    failing_reconnect_step: Mutex<Option<&'static str>>,
    collection_polls: Mutex<VecDeque<Vec<PendingPackage>>>,
    existing_pending: Mutex<Vec<PendingPackage>>,
    resolving_answers: AtomicU32,
    links: Mutex<Vec<PendingLink>>,
    active: Mutex<Vec<ActivePackage>>,
    force_start_error: Mutex<Option<RemoteError>>,
    merge_error: Mutex<Option<RemoteError>>,
}

impl MockRemote {
    pub(crate) fn new() -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            device: AtomicBool::new(true),
            version_errors: Mutex::new(VecDeque::new()),
            failing_reconnect_step: Mutex::new(None),
            collection_polls: Mutex::new(VecDeque::new()),
            existing_pending: Mutex::new(Vec::new()),
            resolving_answers: AtomicU32::new(0),
            links: Mutex::new(Vec::new()),
            active: Mutex::new(Vec::new()),
            force_start_error: Mutex::new(None),
            merge_error: Mutex::new(None),
        }
    }

    /// Script the answers to successive collection polls
    pub(crate) fn with_collection_polls(self, polls: Vec<Vec<PendingPackage>>) -> Self {
        *self.collection_polls.lock().unwrap() = polls.into();
        self
    }

    /// Packages already in the pending list when the reset runs
    pub(crate) fn with_existing_pending(self, packages: Vec<PendingPackage>) -> Self {
        *self.existing_pending.lock().unwrap() = packages;
        self
    }

    /// Download-list packages returned after promotion
    pub(crate) fn with_active(self, packages: Vec<ActivePackage>) -> Self {
        *self.active.lock().unwrap() = packages;
        self
    }

    pub(crate) fn with_links(self, links: Vec<PendingLink>) -> Self {
        *self.links.lock().unwrap() = links;
        self
    }

    /// Answer "still resolving" this many times
    pub(crate) fn with_resolving_answers(self, count: u32) -> Self {
        self.resolving_answers.store(count, Ordering::SeqCst);
        self
    }

    pub(crate) fn without_device(self) -> Self {
        self.device.store(false, Ordering::SeqCst);
        self
    }

    pub(crate) fn with_version_error(self, error: RemoteError) -> Self {
        self.version_errors.lock().unwrap().push_back(error);
        self
    }

    pub(crate) fn with_failing_reconnect_step(self, step: &'static str) -> Self {
        *self.failing_reconnect_step.lock().unwrap() = Some(step);
        self
    }

    pub(crate) fn with_force_start_error(self, error: RemoteError) -> Self {
        *self.force_start_error.lock().unwrap() = Some(error);
        self
    }

    pub(crate) fn with_merge_error(self, error: RemoteError) -> Self {
        *self.merge_error.lock().unwrap() = Some(error);
        self
    }

    pub(crate) fn calls(&self) -> Vec<RemoteCall> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn count(&self, matches: impl Fn(&RemoteCall) -> bool) -> usize {
        self.calls().iter().filter(|call| matches(call)).count()
    }

    pub(crate) fn removals(&self) -> Vec<RemovalRequest> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::RemovePending(request) => Some(request),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn force_starts(&self) -> Vec<Vec<ExternalId>> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                RemoteCall::ForceStart(ids) => Some(ids),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: RemoteCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn reconnect_step(&self, step: &'static str, call: RemoteCall) -> RemoteResult<()> {
        self.record(call);
        if *self.failing_reconnect_step.lock().unwrap() == Some(step) {
            return Err(RemoteError::Api {
                code: 403,
                message: format!("{step} rejected"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteSession for MockRemote {
    fn has_device(&self) -> bool {
        self.device.load(Ordering::SeqCst)
    }

    fn last_error(&self) -> String {
        "device offline".to_string()
    }

    async fn get_version(&self) -> RemoteResult<String> {
        self.record(RemoteCall::GetVersion);
        match self.version_errors.lock().unwrap().pop_front() {
            Some(error) => Err(error),
            None => Ok("2.0".to_string()),
        }
    }

    async fn authenticate(&self) -> RemoteResult<()> {
        self.reconnect_step("authenticate", RemoteCall::Authenticate)
    }

    async fn reboot(&self) -> RemoteResult<()> {
        self.reconnect_step("reboot", RemoteCall::Reboot)
    }

    async fn connect_device(&self) -> RemoteResult<()> {
        self.reconnect_step("connect_device", RemoteCall::ConnectDevice)
    }

    async fn clear_pending_links(&self) -> RemoteResult<()> {
        self.record(RemoteCall::ClearPending);
        Ok(())
    }

    async fn query_pending_packages(&self, query: PackageQuery) -> RemoteResult<Vec<PendingPackage>> {
        self.record(RemoteCall::QueryPending(query));
        if query != PackageQuery::collection() {
            return Ok(self.existing_pending.lock().unwrap().clone());
        }
        let mut polls = self.collection_polls.lock().unwrap();
        let answer = if polls.len() > 1 {
            polls.pop_front()
        } else {
            polls.front().cloned()
        };
        Ok(answer.unwrap_or_default())
    }

    async fn add_links(&self, request: AddLinksRequest) -> RemoteResult<()> {
        self.record(RemoteCall::AddLinks(request));
        Ok(())
    }

    async fn add_container(&self, kind: &str, payload: &str) -> RemoteResult<()> {
        self.record(RemoteCall::AddContainer {
            kind: kind.to_string(),
            payload: payload.to_string(),
        });
        Ok(())
    }

    async fn remove_pending_links(&self, request: &RemovalRequest) -> RemoteResult<()> {
        self.record(RemoteCall::RemovePending(request.clone()));
        Ok(())
    }

    async fn set_package_directory(&self, dir: &Path, package_ids: &[ExternalId]) -> RemoteResult<()> {
        self.record(RemoteCall::SetDirectory {
            dir: dir.to_path_buf(),
            ids: package_ids.to_vec(),
        });
        Ok(())
    }

    async fn merge_packages_into_new(
        &self,
        name: &str,
        dir: &Path,
        package_ids: &[ExternalId],
    ) -> RemoteResult<()> {
        self.record(RemoteCall::Merge {
            name: name.to_string(),
            dir: dir.to_path_buf(),
            ids: package_ids.to_vec(),
        });
        match self.merge_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    async fn is_resolving_links(&self) -> RemoteResult<bool> {
        self.record(RemoteCall::IsResolving);
        let remaining = self.resolving_answers.load(Ordering::SeqCst);
        if remaining == 0 {
            return Ok(false);
        }
        self.resolving_answers.store(remaining - 1, Ordering::SeqCst);
        Ok(true)
    }

    async fn query_pending_links(&self, query: LinkQuery) -> RemoteResult<Vec<PendingLink>> {
        self.record(RemoteCall::QueryLinks(query));
        Ok(self.links.lock().unwrap().clone())
    }

    async fn promote_to_download_list(&self, package_ids: &[ExternalId]) -> RemoteResult<()> {
        self.record(RemoteCall::Promote(package_ids.to_vec()));
        Ok(())
    }

    async fn query_active_packages(&self, query: PackageQuery) -> RemoteResult<Vec<ActivePackage>> {
        self.record(RemoteCall::QueryActive(query));
        Ok(self.active.lock().unwrap().clone())
    }

    async fn remove_active_packages(&self, package_ids: &[ExternalId]) -> RemoteResult<()> {
        self.record(RemoteCall::RemoveActive(package_ids.to_vec()));
        Ok(())
    }

    async fn force_start(&self, package_ids: &[ExternalId]) -> RemoteResult<()> {
        self.record(RemoteCall::ForceStart(package_ids.to_vec()));
        match self.force_start_error.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

/// Selection UI that answers every registered handler with a fixed action
pub(crate) struct MockUi {
    answer: Mutex<Option<SelectionAction>>,
    fail_send: AtomicBool,
    pub(crate) prompts: Mutex<Vec<(UserId, Prompt)>>,
    pub(crate) edits: Mutex<Vec<(PromptId, String)>>,
    pub(crate) deleted: Mutex<Vec<PromptId>>,
    pub(crate) scheduled: Mutex<Vec<PromptId>>,
    handlers: Mutex<HashMap<HandlerId, mpsc::UnboundedSender<SelectionAction>>>,
    pub(crate) removed_handlers: Mutex<Vec<HandlerId>>,
    next_id: AtomicU64,
}

impl MockUi {
    pub(crate) fn new() -> Self {
        Self {
            answer: Mutex::new(None),
            fail_send: AtomicBool::new(false),
            prompts: Mutex::new(Vec::new()),
            edits: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            scheduled: Mutex::new(Vec::new()),
            handlers: Mutex::new(HashMap::new()),
            removed_handlers: Mutex::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Press this button as soon as a handler is registered
    pub(crate) fn answer_with(&self, action: SelectionAction) {
        *self.answer.lock().unwrap() = Some(action);
    }

    pub(crate) fn fail_sending(&self) {
        self.fail_send.store(true, Ordering::SeqCst);
    }

    pub(crate) fn live_handlers(&self) -> usize {
        self.handlers.lock().unwrap().len()
    }

    pub(crate) fn edited_texts(&self) -> Vec<String> {
        self.edits
            .lock()
            .unwrap()
            .iter()
            .map(|(_, text)| text.clone())
            .collect()
    }
}

#[async_trait]
impl SelectionUi for MockUi {
    async fn send_prompt(&self, user: UserId, prompt: Prompt) -> crate::Result<PromptId> {
        if self.fail_send.load(Ordering::SeqCst) {
            return Err(crate::Error::Io(std::io::Error::other("chat unreachable")));
        }
        self.prompts.lock().unwrap().push((user, prompt));
        Ok(PromptId(self.next_id.fetch_add(1, Ordering::SeqCst) as i64))
    }

    async fn edit_prompt(&self, prompt: PromptId, text: &str) -> crate::Result<()> {
        self.edits.lock().unwrap().push((prompt, text.to_string()));
        Ok(())
    }

    async fn delete_prompt(&self, prompt: PromptId) -> crate::Result<()> {
        self.deleted.lock().unwrap().push(prompt);
        Ok(())
    }

    async fn schedule_delete(&self, prompt: PromptId) {
        self.scheduled.lock().unwrap().push(prompt);
    }

    fn register_handler(
        &self,
        _user: UserId,
        sink: mpsc::UnboundedSender<SelectionAction>,
    ) -> HandlerId {
        if let Some(action) = *self.answer.lock().unwrap() {
            sink.send(action).unwrap();
        }
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::SeqCst));
        self.handlers.lock().unwrap().insert(id, sink);
        id
    }

    fn remove_handler(&self, handler: HandlerId) {
        self.handlers.lock().unwrap().remove(&handler);
        self.removed_handlers.lock().unwrap().push(handler);
    }
}

/// Listener recording every callback
#[derive(Default)]
pub(crate) struct RecordingListener {
    pub(crate) started: AtomicU32,
    pub(crate) status_messages: AtomicU32,
    pub(crate) failures: Mutex<Vec<(String, Option<UserAction>)>>,
}

impl RecordingListener {
    pub(crate) fn started(&self) -> u32 {
        self.started.load(Ordering::SeqCst)
    }

    pub(crate) fn status_messages(&self) -> u32 {
        self.status_messages.load(Ordering::SeqCst)
    }

    pub(crate) fn failures(&self) -> Vec<String> {
        self.failures
            .lock()
            .unwrap()
            .iter()
            .map(|(message, _)| message.clone())
            .collect()
    }
}

#[async_trait]
impl JobListener for RecordingListener {
    async fn on_download_started(&self) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    async fn on_download_failed(&self, message: &str, action: Option<&UserAction>) {
        self.failures
            .lock()
            .unwrap()
            .push((message.to_string(), action.cloned()));
    }

    async fn send_status_message(&self) {
        self.status_messages.fetch_add(1, Ordering::SeqCst);
    }
}

/// Policy with fixed answers
#[derive(Default)]
pub(crate) struct StubPolicy {
    pub(crate) duplicate: Option<DuplicateRejection>,
    pub(crate) limit: Option<String>,
}

#[async_trait]
impl AdmissionPolicy for StubPolicy {
    async fn check_duplicate(&self, _job: &Job) -> Option<DuplicateRejection> {
        self.duplicate.clone()
    }

    async fn check_limits(&self, _job: &Job) -> Option<String> {
        self.limit.clone()
    }
}

/// Config with millisecond timings and no retries
pub(crate) fn fast_config() -> Config {
    Config {
        timing: TimingConfig {
            version_timeout: Duration::from_millis(200),
            submit_settle: Duration::from_millis(1),
            resolve_poll_interval: Duration::from_millis(1),
            resolve_max_polls: 5,
            collection_budget: Duration::from_millis(150),
            collection_poll_interval: Duration::from_millis(5),
            activation_settle: Duration::from_millis(1),
            selection_timeout: Duration::from_millis(100),
        },
        retry: RetryConfig {
            max_attempts: 0,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
            jitter: false,
            call_timeout: None,
        },
        ..Config::default()
    }
}

/// Orchestrator over the given mock remote, with a fresh [`MockUi`]
pub(crate) fn create_test_orchestrator(remote: Arc<MockRemote>) -> (Orchestrator, Arc<MockUi>) {
    let ui = Arc::new(MockUi::new());
    let orchestrator = Orchestrator::new(fast_config(), remote, ui.clone()).unwrap();
    (orchestrator, ui)
}

/// Link job targeting `/data/{id}`
pub(crate) fn test_job(id: u64, listener: Arc<RecordingListener>) -> Job {
    Job::new(
        JobId(id),
        JobSource::Links(vec![format!("https://host.example/file-{id}")]),
        format!("/data/{id}"),
        UserId(42),
        listener,
    )
}

/// Pending package with one online link
pub(crate) fn online_package(uuid: u64, name: &str, save_to: &str, bytes: u64) -> PendingPackage {
    PendingPackage {
        uuid: ExternalId(uuid),
        name: name.to_string(),
        save_to: PathBuf::from(save_to),
        bytes_total: bytes,
        online_count: 1,
        temp_unknown_count: 0,
        unknown_count: 0,
    }
}

/// Pending package without any online link
pub(crate) fn corrupted_package(uuid: u64, name: &str) -> PendingPackage {
    PendingPackage {
        online_count: 0,
        ..online_package(uuid, name, &format!("{DEFAULT_ROOT}/{name}"), 0)
    }
}

pub(crate) fn active_package(uuid: u64, save_to: &str) -> ActivePackage {
    ActivePackage {
        uuid: ExternalId(uuid),
        save_to: PathBuf::from(save_to),
    }
}

pub(crate) fn ids(values: &[u64]) -> Vec<ExternalId> {
    values.iter().copied().map(ExternalId).collect()
}
