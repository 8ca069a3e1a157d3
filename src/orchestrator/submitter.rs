// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Submission phase: one sbatch call per job, strictly in list order.

use std::time::Duration;

use tracing::{info, warn};

use super::tracker::DependencyTracker;
use crate::config::{Job, JobHandle, JobList, RunSettings, Workspace};
use crate::error::Result;
use crate::process::CommandRunner;
use crate::slurm::{SlurmClient, SubmitOutcome, SubmitRequest};

/// Pause after each sbatch call so the controller is not flooded
pub const DEFAULT_SUBMIT_DELAY: Duration = Duration::from_millis(500);

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubmitSummary {
    pub accepted: usize,
    pub rejected: usize,
}

pub struct Submitter<'a, R> {
    slurm: &'a SlurmClient<R>,
    workspace: &'a Workspace,
    settings: &'a RunSettings,
    datetime: &'a str,
    delay: Duration,
}

impl<'a, R: CommandRunner> Submitter<'a, R> {
    pub fn new(
        slurm: &'a SlurmClient<R>,
        workspace: &'a Workspace,
        settings: &'a RunSettings,
        datetime: &'a str,
    ) -> Self {
        Self {
            slurm,
            workspace,
            settings,
            datetime,
            delay: DEFAULT_SUBMIT_DELAY,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Submit every job once, recording accepted ones in `tracker`.
    ///
    /// A rejected submission is written onto the job and does not stop the
    /// run; a working directory that cannot be created does.
    pub async fn submit_all(&self, jobs: &mut JobList, tracker: &mut DependencyTracker) -> Result<SubmitSummary> {
        let mut summary = SubmitSummary::default();
        let handles: Vec<JobHandle> = jobs.handles().collect();

        for handle in handles {
            let accepted = self.submit_one(jobs.get_mut(handle), handle, tracker).await?;
            if accepted {
                summary.accepted += 1;
            } else {
                summary.rejected += 1;
            }
            tokio::time::sleep(self.delay).await;
        }

        info!(
            accepted = summary.accepted,
            rejected = summary.rejected,
            "submission finished"
        );
        Ok(summary)
    }

    async fn submit_one(&self, job: &mut Job, handle: JobHandle, tracker: &mut DependencyTracker) -> Result<bool> {
        let dir = self.workspace.ensure_job_dir(job)?;
        info!(dir = %dir.display(), "prepared working directory");

        let group = job.command_group.clone();
        let request = SubmitRequest {
            script: self.workspace.resolve(&job.execution_command),
            after_any: tracker.dependency_for(group.as_deref()),
            partition: job.partition.clone(),
            stdout: self.workspace.stdout_path(job),
            stderr: self.workspace.stderr_path(job),
        };

        match &request.partition {
            Some(p) => info!(command = %job.execution_command, partition = %p, "submitting"),
            None => info!(command = %job.execution_command, "submitting to default partition"),
        }

        let outcome = self.slurm.submit(&request).await?;
        job.stamp_provisional(self.settings, self.datetime);

        match outcome {
            SubmitOutcome::Accepted(job_id) => {
                info!(
                    job_id = %job_id,
                    group = group.as_deref().unwrap_or("-"),
                    after = ?request.after_any.map(|id| id.0),
                    "submitted"
                );
                tracker.record(group.as_deref(), job_id, handle);
                Ok(true)
            }
            SubmitOutcome::Rejected(output) => {
                warn!(
                    command = %job.execution_command,
                    exit_code = output.exit_code,
                    stderr = %output.stderr.trim(),
                    "sbatch rejected job"
                );
                job.stdout = Some(format!("sbatch stdout : {}", output.stdout));
                job.stderr = Some(format!("sbatch stderr : {}", output.stderr));
                job.exit_code = Some(output.exit_code);
                Ok(false)
            }
        }
    }
}
