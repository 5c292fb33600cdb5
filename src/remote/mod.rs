//! Remote download service seam.
//!
//! [`RemoteSession`] is the interface the orchestrator consumes; the RPC
//! transport behind it lives outside this crate. [`RemoteClient`] wraps a
//! session so that every operation goes through the retrying caller.

mod types;

pub use types::{
    ActivePackage, AddLinksRequest, LinkQuery, PackageQuery, PendingLink, PendingPackage,
    RemovalRequest,
};

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;

use crate::config::RetryConfig;
use crate::error::RemoteError;
use crate::retry::call_with_retry;
use crate::types::ExternalId;

/// Result of a single remote call
pub type RemoteResult<T> = std::result::Result<T, RemoteError>;

/// Operations of the remote download service
///
/// Implementations must be idempotent enough to be retried: the orchestrator
/// may repeat any call after a transient failure.
#[async_trait]
pub trait RemoteSession: Send + Sync {
    /// Whether a device is attached to the session at all
    fn has_device(&self) -> bool;

    /// Last connection error, used as the user-facing failure message
    fn last_error(&self) -> String;

    /// Liveness probe
    async fn get_version(&self) -> RemoteResult<String>;

    /// Re-authenticate against the service
    async fn authenticate(&self) -> RemoteResult<()>;

    /// Restart the local session state
    async fn reboot(&self) -> RemoteResult<()>;

    /// Reconnect to the download device
    async fn connect_device(&self) -> RemoteResult<()>;

    /// Drop every entry of the pending list
    async fn clear_pending_links(&self) -> RemoteResult<()>;

    /// List pending packages with the selected fields
    async fn query_pending_packages(&self, query: PackageQuery) -> RemoteResult<Vec<PendingPackage>>;

    /// Add plain links to the pending list
    async fn add_links(&self, request: AddLinksRequest) -> RemoteResult<()>;

    /// Add a base64 container blob to the pending list
    async fn add_container(&self, kind: &str, payload: &str) -> RemoteResult<()>;

    /// Remove pending links and/or packages
    async fn remove_pending_links(&self, request: &RemovalRequest) -> RemoteResult<()>;

    /// Change where pending packages will be saved
    async fn set_package_directory(&self, dir: &Path, package_ids: &[ExternalId]) -> RemoteResult<()>;

    /// Merge pending packages into one new package
    async fn merge_packages_into_new(
        &self,
        name: &str,
        dir: &Path,
        package_ids: &[ExternalId],
    ) -> RemoteResult<()>;

    /// Whether the service is still resolving submitted links
    async fn is_resolving_links(&self) -> RemoteResult<bool>;

    /// List pending links with the selected fields
    async fn query_pending_links(&self, query: LinkQuery) -> RemoteResult<Vec<PendingLink>>;

    /// Move pending packages into the download list
    async fn promote_to_download_list(&self, package_ids: &[ExternalId]) -> RemoteResult<()>;

    /// List packages of the download list with the selected fields
    async fn query_active_packages(&self, query: PackageQuery) -> RemoteResult<Vec<ActivePackage>>;

    /// Remove packages from the download list
    async fn remove_active_packages(&self, package_ids: &[ExternalId]) -> RemoteResult<()>;

    /// Start downloading packages regardless of the service's own limits
    async fn force_start(&self, package_ids: &[ExternalId]) -> RemoteResult<()>;
}

/// A [`RemoteSession`] whose operations are retried per [`RetryConfig`]
#[derive(Clone)]
pub struct RemoteClient {
    session: Arc<dyn RemoteSession>,
    retry: RetryConfig,
}

impl RemoteClient {
    /// Wrap a session
    pub fn new(session: Arc<dyn RemoteSession>, retry: RetryConfig) -> Self {
        Self { session, retry }
    }

    /// The wrapped session, for calls that must not be retried
    pub fn session(&self) -> &Arc<dyn RemoteSession> {
        &self.session
    }

    /// Retrying [`RemoteSession::get_version`]
    pub async fn get_version(&self) -> RemoteResult<String> {
        call_with_retry(&self.retry, "get_version", || self.session.get_version()).await
    }

    /// Retrying [`RemoteSession::clear_pending_links`]
    pub async fn clear_pending_links(&self) -> RemoteResult<()> {
        call_with_retry(&self.retry, "clear_pending_links", || {
            self.session.clear_pending_links()
        })
        .await
    }

    /// Retrying [`RemoteSession::query_pending_packages`]
    pub async fn query_pending_packages(&self, query: PackageQuery) -> RemoteResult<Vec<PendingPackage>> {
        call_with_retry(&self.retry, "query_pending_packages", || {
            self.session.query_pending_packages(query)
        })
        .await
    }

    /// Retrying [`RemoteSession::add_links`]
    pub async fn add_links(&self, request: AddLinksRequest) -> RemoteResult<()> {
        call_with_retry(&self.retry, "add_links", || {
            self.session.add_links(request.clone())
        })
        .await
    }

    /// Retrying [`RemoteSession::add_container`]
    pub async fn add_container(&self, kind: &str, payload: &str) -> RemoteResult<()> {
        call_with_retry(&self.retry, "add_container", || {
            self.session.add_container(kind, payload)
        })
        .await
    }

    /// Remove pending links; an empty request is not sent
    pub async fn remove_pending_links(&self, request: &RemovalRequest) -> RemoteResult<()> {
        if request.is_empty() {
            return Ok(());
        }
        call_with_retry(&self.retry, "remove_pending_links", || {
            self.session.remove_pending_links(request)
        })
        .await
    }

    /// Retrying [`RemoteSession::set_package_directory`]
    pub async fn set_package_directory(&self, dir: &Path, package_ids: &[ExternalId]) -> RemoteResult<()> {
        call_with_retry(&self.retry, "set_package_directory", || {
            self.session.set_package_directory(dir, package_ids)
        })
        .await
    }

    /// Retrying [`RemoteSession::merge_packages_into_new`]
    pub async fn merge_packages_into_new(
        &self,
        name: &str,
        dir: &Path,
        package_ids: &[ExternalId],
    ) -> RemoteResult<()> {
        call_with_retry(&self.retry, "merge_packages_into_new", || {
            self.session.merge_packages_into_new(name, dir, package_ids)
        })
        .await
    }

    /// Retrying [`RemoteSession::is_resolving_links`]
    pub async fn is_resolving_links(&self) -> RemoteResult<bool> {
        call_with_retry(&self.retry, "is_resolving_links", || {
            self.session.is_resolving_links()
        })
        .await
    }

    /// Retrying [`RemoteSession::query_pending_links`]
    pub async fn query_pending_links(&self, query: LinkQuery) -> RemoteResult<Vec<PendingLink>> {
        call_with_retry(&self.retry, "query_pending_links", || {
            self.session.query_pending_links(query.clone())
        })
        .await
    }

    /// Retrying [`RemoteSession::promote_to_download_list`]
    pub async fn promote_to_download_list(&self, package_ids: &[ExternalId]) -> RemoteResult<()> {
        call_with_retry(&self.retry, "promote_to_download_list", || {
            self.session.promote_to_download_list(package_ids)
        })
        .await
    }

    /// Retrying [`RemoteSession::query_active_packages`]
    pub async fn query_active_packages(&self, query: PackageQuery) -> RemoteResult<Vec<ActivePackage>> {
        call_with_retry(&self.retry, "query_active_packages", || {
            self.session.query_active_packages(query)
        })
        .await
    }

    /// Retrying [`RemoteSession::remove_active_packages`]
    pub async fn remove_active_packages(&self, package_ids: &[ExternalId]) -> RemoteResult<()> {
        if package_ids.is_empty() {
            return Ok(());
        }
        call_with_retry(&self.retry, "remove_active_packages", || {
            self.session.remove_active_packages(package_ids)
        })
        .await
    }

    /// Retrying [`RemoteSession::force_start`]
    pub async fn force_start(&self, package_ids: &[ExternalId]) -> RemoteResult<()> {
        call_with_retry(&self.retry, "force_start", || {
            self.session.force_start(package_ids)
        })
        .await
    }
}
