//! Collection polling: finds the job's packages in the pending list.
//!
//! Every poll looks at the full pending list. Packages with no online link
//! are remembered as corrupted; the others become the job's online set,
//! redirected from the default root into the job's target directory. Jobs
//! of a same-directory group get their online packages merged into one
//! package first, which shows up as a new package on a later poll. Packages
//! of other jobs are left alone unless those jobs are in the same group.

use std::path::Path;

use tokio::time::Instant;

use super::{Orchestrator, StageResult};
use crate::error::{JobFailure, NOT_ADDED_MESSAGE};
use crate::job::Job;
use crate::registry::{JobRegistry, PackageRecord};
use crate::remote::{PackageQuery, PendingPackage, RemovalRequest};
use crate::types::{ExternalId, JobId};

/// Packages attributed to a job once collection succeeds
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Collected {
    /// Pending packages with at least one online link
    pub(crate) online: Vec<ExternalId>,
    /// Pending packages without any online link
    pub(crate) corrupted: Vec<ExternalId>,
    /// Some online package still has links of unknown availability
    pub(crate) needs_sanitize: bool,
    /// Name taken from the first online package's save path
    pub(crate) derived_name: String,
    /// Offline links removed by the sanitizer
    pub(crate) removed_links: Vec<ExternalId>,
}

impl Orchestrator {
    /// Poll the pending list until the job's packages are online
    ///
    /// Gives up early when every package seen so far is corrupted, and
    /// after the collection budget otherwise. Both paths remove what was
    /// found and drop the job's registry entry.
    pub(super) async fn collect_packages(
        &self,
        registry: &mut JobRegistry,
        job: &mut Job,
    ) -> StageResult<Collected> {
        let timing = &self.config.timing;
        let default_root = &self.config.remote.default_root;
        let started = Instant::now();

        let mut collected = Collected::default();
        let mut ever_online = false;
        let mut tracked = false;
        let mut last_corrupted: Option<String> = None;

        while started.elapsed() < timing.collection_budget {
            let packages = self
                .remote
                .query_pending_packages(PackageQuery::collection())
                .await?;

            if !ever_online
                && !collected.corrupted.is_empty()
                && let Some(package_name) = last_corrupted.take()
            {
                let err = self
                    .abort(job, JobFailure::AllLinksCorrupted { package_name })
                    .await;
                self.remove_best_effort(job.id, RemovalRequest::packages(collected.corrupted))
                    .await;
                registry.remove(job.id);
                return Err(err);
            }

            collected.online.clear();
            job.size = 0;

            for package in &packages {
                if let Some(owner) = registry.find_by_external(package.uuid)
                    && owner != job.id
                {
                    if !shares_group(job, owner) || package.is_corrupted() {
                        continue;
                    }
                    tracing::debug!(
                        job_id = job.id.0,
                        owner = owner.0,
                        package_id = package.uuid.0,
                        "Claiming package of same-directory group member"
                    );
                    registry.release_member(owner, package.uuid);
                }

                if package.is_corrupted() {
                    tracing::error!(
                        job_id = job.id.0,
                        package_id = package.uuid.0,
                        name = %package.name,
                        "Package has no online links"
                    );
                    if !package.name.is_empty() {
                        last_corrupted = Some(package.name.clone());
                    }
                    if !collected.corrupted.contains(&package.uuid) {
                        collected.corrupted.push(package.uuid);
                    }
                    continue;
                }

                if !tracked {
                    tracked = true;
                    registry.insert(job.id, PackageRecord::collecting(package.uuid));
                    collected.derived_name =
                        derive_job_name(&package.save_to, default_root, &job.target_dir);
                }

                registry.add_member(job.id, package.uuid);

                collected.needs_sanitize |= package.has_unknown_links();
                job.size += package.bytes_total;
                collected.online.push(package.uuid);

                self.redirect(job, package).await?;
            }

            if !collected.online.is_empty() {
                ever_online = true;

                if job.join_into_same_dir && collected.online.len() > 1 {
                    self.merge_into_group(job, &collected).await?;
                    tokio::time::sleep(timing.collection_poll_interval).await;
                    continue;
                }

                registry.set_members(job.id, collected.online.iter().copied().collect());
                return Ok(collected);
            }

            tokio::time::sleep(timing.collection_poll_interval).await;
        }

        let message = if collected.derived_name.is_empty() {
            NOT_ADDED_MESSAGE.to_string()
        } else {
            collected.derived_name.clone()
        };
        tracing::warn!(
            job_id = job.id.0,
            budget_ms = timing.collection_budget.as_millis() as u64,
            "No online package within collection budget"
        );
        let err = self
            .abort(job, JobFailure::CollectionTimeout { message })
            .await;

        let leftovers = collected
            .corrupted
            .iter()
            .chain(collected.online.iter())
            .copied();
        self.remove_best_effort(job.id, RemovalRequest::packages(leftovers))
            .await;
        registry.remove(job.id);
        Err(err)
    }

    /// Move a package saving under the default root into the job's directory
    async fn redirect(&self, job: &Job, package: &PendingPackage) -> StageResult<()> {
        let default_root = &self.config.remote.default_root;
        if let Ok(relative) = package.save_to.strip_prefix(default_root) {
            let dir = job.target_dir.join(relative);
            tracing::debug!(
                package_id = package.uuid.0,
                dir = %dir.display(),
                "Redirecting package"
            );
            self.remote
                .set_package_directory(&dir, &[package.uuid])
                .await?;
        }
        Ok(())
    }

    /// Merge the job's online packages into one named after its group
    async fn merge_into_group(&self, job: &mut Job, collected: &Collected) -> StageResult<()> {
        let name = match &job.same_dir {
            Some(group) => group.name().to_string(),
            None if !job.name.is_empty() => job.name.clone(),
            None => collected.derived_name.clone(),
        };
        let dir = job.target_dir.join(&name);
        tracing::info!(
            job_id = job.id.0,
            packages = collected.online.len(),
            name = %name,
            "Merging packages into same-directory group"
        );
        self.remote
            .merge_packages_into_new(&name, &dir, &collected.online)
            .await?;
        job.name = name;
        Ok(())
    }
}

/// Whether packages of `owner` get merged into `job`'s package
fn shares_group(job: &Job, owner: JobId) -> bool {
    job.join_into_same_dir
        && job
            .same_dir
            .as_ref()
            .is_some_and(|group| group.contains(owner))
}

/// First path component below the default root or the target directory
pub(crate) fn derive_job_name(save_to: &Path, default_root: &Path, target_dir: &Path) -> String {
    save_to
        .strip_prefix(default_root)
        .or_else(|_| save_to.strip_prefix(target_dir))
        .ok()
        .and_then(|relative| relative.components().next())
        .map(|first| first.as_os_str().to_string_lossy().into_owned())
        .unwrap_or_default()
}
