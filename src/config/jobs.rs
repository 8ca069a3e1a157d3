// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! The job list (`{"tests": [...]}`) and per-job result fields.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::settings::RunSettings;
use crate::error::{Error, Result};

/// Exit code recorded until the real one is known
pub const PENDING_EXIT_CODE: i32 = 999;

/// One test or benchmark to run.
///
/// Result fields start out empty, get provisional values at submission and
/// final values once the scheduler reports the job terminal. Keys this type
/// does not know about are kept in `extra` and written back unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Working directory, relative to the workspace; also holds stdout/stderr
    pub output_directory: String,
    /// Batch script (or command, in local mode), relative to the workspace
    pub execution_command: String,
    /// Jobs in the same group run one after another
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_group: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stdout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_sha: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub datetime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gpu_count: Option<u32>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Job {
    pub fn new(output_directory: impl Into<String>, execution_command: impl Into<String>) -> Self {
        Self {
            output_directory: output_directory.into(),
            execution_command: execution_command.into(),
            ..Default::default()
        }
    }

    pub fn in_group(mut self, group: impl Into<String>) -> Self {
        self.command_group = Some(group.into());
        self
    }

    pub fn on_partition(mut self, partition: impl Into<String>) -> Self {
        self.partition = Some(partition.into());
        self
    }

    /// Stamp run-wide metadata and reset the outcome to "not yet known"
    pub fn stamp_provisional(&mut self, settings: &RunSettings, datetime: &str) {
        self.stdout = Some(String::new());
        self.stderr = Some(String::new());
        self.exit_code = Some(PENDING_EXIT_CODE);
        self.build_id = Some(settings.build_id.clone());
        self.git_sha = Some(settings.git_sha.clone());
        self.datetime = Some(datetime.to_string());
        self.node_count = Some(settings.node_count);
        self.machine_type = Some(settings.machine_type.clone());
        self.gpu_type = settings.gpu_type.clone();
        self.gpu_count = Some(settings.gpu_count);
    }

    /// Whether a final exit code has been recorded
    pub fn is_resolved(&self) -> bool {
        matches!(self.exit_code, Some(code) if code != PENDING_EXIT_CODE)
    }
}

/// Stable reference to a job in a [`JobList`].
///
/// Only handed out by the list itself; the list never removes or reorders
/// entries, so a handle stays valid for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobHandle(usize);

/// The job list document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobList {
    tests: Vec<Job>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobList {
    pub fn new(tests: Vec<Job>) -> Self {
        Self {
            tests,
            extra: Map::new(),
        }
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn len(&self) -> usize {
        self.tests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tests.is_empty()
    }

    /// Handles of all jobs, in list order
    pub fn handles(&self) -> impl Iterator<Item = JobHandle> {
        (0..self.tests.len()).map(JobHandle)
    }

    #[cfg(test)]
    pub fn get(&self, handle: JobHandle) -> &Job {
        &self.tests[handle.0]
    }

    pub fn get_mut(&mut self, handle: JobHandle) -> &mut Job {
        &mut self.tests[handle.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.tests.iter()
    }
}
