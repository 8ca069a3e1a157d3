// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Bookkeeping of submitted jobs, grouped into dependency chains.
//!
//! Jobs that share a `command_group` form a chain: each one is submitted with
//! a dependency on the job appended to the chain before it. Jobs without a
//! group are tracked in a separate bucket that never produces dependencies.
//!
//! Owned by the single orchestration task; no locking.

use std::collections::HashMap;

use crate::config::JobHandle;
use crate::slurm::types::JobId;

/// One accepted submission
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub job_id: JobId,
    pub job: JobHandle,
    complete: bool,
}

impl SubmissionRecord {
    fn new(job_id: JobId, job: JobHandle) -> Self {
        Self {
            job_id,
            job,
            complete: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.complete
    }

    /// Flip to complete. Returns false if it already was; there is no way back.
    pub fn mark_complete(&mut self) -> bool {
        let changed = !self.complete;
        self.complete = true;
        changed
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum GroupKey {
    Named(String),
    Independent,
}

impl GroupKey {
    fn of(group: Option<&str>) -> Self {
        match group {
            Some(name) => GroupKey::Named(name.to_string()),
            None => GroupKey::Independent,
        }
    }
}

#[derive(Debug)]
struct Chain {
    key: GroupKey,
    records: Vec<SubmissionRecord>,
}

/// Group name → ordered submissions, in first-seen group order
#[derive(Debug, Default)]
pub struct DependencyTracker {
    chains: Vec<Chain>,
    index: HashMap<GroupKey, usize>,
}

impl DependencyTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Job a new submission into `group` has to wait for
    pub fn dependency_for(&self, group: Option<&str>) -> Option<JobId> {
        let name = group?;
        let chain = self.index.get(&GroupKey::Named(name.to_string()))?;
        self.chains[*chain].records.last().map(|r| r.job_id)
    }

    /// Append an accepted submission to its chain
    pub fn record(&mut self, group: Option<&str>, job_id: JobId, job: JobHandle) {
        let key = GroupKey::of(group);
        let slot = match self.index.get(&key) {
            Some(&slot) => slot,
            None => {
                self.chains.push(Chain {
                    key: key.clone(),
                    records: Vec::new(),
                });
                self.index.insert(key, self.chains.len() - 1);
                self.chains.len() - 1
            }
        };
        self.chains[slot].records.push(SubmissionRecord::new(job_id, job));
    }

    /// Number of tracked submissions
    pub fn total(&self) -> usize {
        self.chains.iter().map(|c| c.records.len()).sum()
    }

    pub fn completed(&self) -> usize {
        self.records().filter(|r| r.is_complete()).count()
    }

    /// Records of one named group, in submission order
    pub fn group(&self, name: &str) -> &[SubmissionRecord] {
        self.index
            .get(&GroupKey::Named(name.to_string()))
            .map(|&slot| self.chains[slot].records.as_slice())
            .unwrap_or(&[])
    }

    pub fn records(&self) -> impl Iterator<Item = &SubmissionRecord> {
        self.chains.iter().flat_map(|c| c.records.iter())
    }

    /// Records still waiting for a terminal state, group by group
    pub fn pending_mut(&mut self) -> impl Iterator<Item = &mut SubmissionRecord> {
        self.chains
            .iter_mut()
            .flat_map(|c| c.records.iter_mut())
            .filter(|r| !r.is_complete())
    }

    /// Group names in the order they were first submitted to
    pub fn group_names(&self) -> impl Iterator<Item = &str> {
        self.chains.iter().filter_map(|c| match &c.key {
            GroupKey::Named(name) => Some(name.as_str()),
            GroupKey::Independent => None,
        })
    }
}
