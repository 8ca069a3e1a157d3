// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Scheduler-side identifiers and states.

use std::fmt;
use std::str::FromStr;

/// Job identifier assigned by sbatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(JobId)
    }
}

/// Job state as reported by sacct
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Suspended,
    Completing,
    Completed,
    Cancelled,
    Failed,
    Timeout,
    NodeFail,
    OutOfMemory,
    /// No accounting row yet (job not visible to sacct)
    NotVisible,
    Unknown(String),
}

impl From<&str> for JobState {
    fn from(s: &str) -> Self {
        // sacct prints e.g. "CANCELLED by 1000" and truncates with a trailing '+'
        let word = s.split_whitespace().next().unwrap_or("");
        let word = word.trim_end_matches('+');
        match word.to_uppercase().as_str() {
            "" => JobState::NotVisible,
            "PENDING" | "PD" => JobState::Pending,
            "RUNNING" | "R" => JobState::Running,
            "SUSPENDED" | "S" => JobState::Suspended,
            "COMPLETING" | "CG" => JobState::Completing,
            "COMPLETED" | "CD" => JobState::Completed,
            "CANCELLED" | "CA" => JobState::Cancelled,
            "FAILED" | "F" => JobState::Failed,
            "TIMEOUT" | "TO" => JobState::Timeout,
            "NODE_FAIL" | "NF" => JobState::NodeFail,
            "OUT_OF_MEMORY" | "OUT_OF_ME" | "OOM" => JobState::OutOfMemory,
            other => JobState::Unknown(other.to_string()),
        }
    }
}

impl JobState {
    /// Terminal for the orchestrator: results are harvested only in these states.
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }

    /// Finished from Slurm's point of view, but not harvested by the poller
    pub fn is_stuck_final(&self) -> bool {
        matches!(
            self,
            JobState::Cancelled | JobState::Timeout | JobState::NodeFail | JobState::OutOfMemory
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "PENDING",
            JobState::Running => "RUNNING",
            JobState::Suspended => "SUSPENDED",
            JobState::Completing => "COMPLETING",
            JobState::Completed => "COMPLETED",
            JobState::Cancelled => "CANCELLED",
            JobState::Failed => "FAILED",
            JobState::Timeout => "TIMEOUT",
            JobState::NodeFail => "NODE_FAIL",
            JobState::OutOfMemory => "OUT_OF_MEMORY",
            JobState::NotVisible => "(not in accounting)",
            JobState::Unknown(s) => s,
        };
        write!(f, "{}", s)
    }
}
