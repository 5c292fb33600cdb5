//! In-memory registry of jobs tracked on the remote service.
//!
//! The registry lives inside the global orchestration lock: holding the
//! [`tokio::sync::MutexGuard`] is both the right to mutate the registry and
//! the right to touch the remote service's shared pending list.

use std::collections::{BTreeSet, HashMap};

use crate::types::{ExternalId, JobId, Stage};

/// Remote-side packages currently attributed to a job
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackageRecord {
    /// Current reference into the remote service (re-resolved per stage)
    pub correlation_id: ExternalId,
    /// Which remote list the packages live in
    pub stage: Stage,
    /// Exact set of remote package ids attributable to the job
    pub members: BTreeSet<ExternalId>,
}

impl PackageRecord {
    /// Record created when the first package of a job is observed
    pub fn collecting(correlation_id: ExternalId) -> Self {
        Self {
            correlation_id,
            stage: Stage::Collecting,
            members: BTreeSet::from([correlation_id]),
        }
    }
}

/// Map from job id to its package record
#[derive(Debug, Default)]
pub struct JobRegistry {
    records: HashMap<JobId, PackageRecord>,
}

impl JobRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// True when no job is tracked, i.e. a full remote reset is safe
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Number of tracked jobs
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Start tracking a job. Replaces any earlier record of the same job.
    pub fn insert(&mut self, job: JobId, record: PackageRecord) {
        self.records.insert(job, record);
    }

    /// Replace the member set of a tracked job; returns false if untracked
    ///
    /// The correlation id moves to the first member when the old one is no
    /// longer part of the set (e.g. after packages were merged).
    pub fn set_members(&mut self, job: JobId, members: BTreeSet<ExternalId>) -> bool {
        let Some(record) = self.records.get_mut(&job) else {
            return false;
        };
        if !members.contains(&record.correlation_id)
            && let Some(first) = members.first()
        {
            record.correlation_id = *first;
        }
        record.members = members;
        true
    }

    /// Attribute one more package to a tracked job; returns false if untracked
    pub fn add_member(&mut self, job: JobId, id: ExternalId) -> bool {
        let Some(record) = self.records.get_mut(&job) else {
            return false;
        };
        record.members.insert(id);
        true
    }

    /// Swap a job's record for its download-list identity
    ///
    /// The old correlation id and members are discarded, never merged.
    pub fn promote(&mut self, job: JobId, correlation_id: ExternalId, members: BTreeSet<ExternalId>) {
        self.records.insert(
            job,
            PackageRecord {
                correlation_id,
                stage: Stage::Downloading,
                members,
            },
        );
    }

    /// Stop tracking a job
    pub fn remove(&mut self, job: JobId) -> Option<PackageRecord> {
        self.records.remove(&job)
    }

    /// Record of a job, if tracked
    pub fn get(&self, job: JobId) -> Option<&PackageRecord> {
        self.records.get(&job)
    }

    /// Job whose record currently owns the given remote package
    pub fn find_by_external(&self, id: ExternalId) -> Option<JobId> {
        self.records
            .iter()
            .find(|(_, record)| record.members.contains(&id))
            .map(|(job, _)| *job)
    }

    /// Take a package away from a job, e.g. when a group member merges it
    ///
    /// The record itself stays so its owner still finds it. Returns false
    /// if the job did not own the package.
    pub fn release_member(&mut self, job: JobId, id: ExternalId) -> bool {
        let Some(record) = self.records.get_mut(&job) else {
            return false;
        };
        if !record.members.remove(&id) {
            return false;
        }
        if record.correlation_id == id
            && let Some(first) = record.members.first()
        {
            record.correlation_id = *first;
        }
        true
    }

    /// Copy of every tracked record
    pub fn snapshot(&self) -> HashMap<JobId, PackageRecord> {
        self.records.clone()
    }
}
