// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Local mode: run each job sequentially on this host, without a scheduler.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::config::{Job, JobHandle, JobList, RunSettings, Workspace};
use crate::error::{Error, Result};
use crate::process::{CommandRunner, Invocation};

const SINGULARITY: &str = "singularity";

/// Shell command line for one job, wrapped in a container and MPI launcher
/// as the run settings ask for
pub fn compose_command(settings: &RunSettings, workspace: &Workspace, job: &Job) -> String {
    if settings.artifact_type.as_deref() != Some(SINGULARITY) {
        return job.execution_command.clone();
    }

    let root = workspace.root().display();
    let image = workspace.resolve(settings.singularity_image.as_deref().unwrap_or_default());
    let bind = format!("--bind {}:{}", root, root);

    if settings.mpi {
        format!(
            "mpirun -np {} {} singularity exec {} {} {}",
            settings.nproc,
            settings.task_affinity,
            bind,
            image.display(),
            job.execution_command
        )
    } else if settings.gpu_count > 0 {
        format!("singularity exec --nv {} {} {}", bind, image.display(), job.execution_command)
    } else {
        format!("singularity exec {} {} {}", bind, image.display(), job.execution_command)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalReport {
    pub executed: usize,
    /// Jobs not started because of a shutdown request
    pub skipped: usize,
}

pub struct LocalRunner<'a, R> {
    runner: R,
    workspace: &'a Workspace,
    settings: &'a RunSettings,
    datetime: &'a str,
    shutdown: &'a AtomicBool,
}

impl<'a, R: CommandRunner> LocalRunner<'a, R> {
    pub fn new(
        runner: R,
        workspace: &'a Workspace,
        settings: &'a RunSettings,
        datetime: &'a str,
        shutdown: &'a AtomicBool,
    ) -> Self {
        Self {
            runner,
            workspace,
            settings,
            datetime,
            shutdown,
        }
    }

    /// Run every job in list order through `sh -c` inside its working directory
    pub async fn run_all(&self, jobs: &mut JobList) -> Result<LocalReport> {
        let mut report = LocalReport::default();
        let handles: Vec<JobHandle> = jobs.handles().collect();

        for handle in handles {
            if self.shutdown.load(Ordering::SeqCst) {
                report.skipped += 1;
                continue;
            }
            self.run_one(jobs.get_mut(handle)).await?;
            report.executed += 1;
        }

        if report.skipped > 0 {
            warn!(executed = report.executed, skipped = report.skipped, "local run cancelled");
        }
        Ok(report)
    }

    async fn run_one(&self, job: &mut Job) -> Result<()> {
        let dir = self.workspace.ensure_job_dir(job)?;
        info!(dir = %dir.display(), "prepared working directory");

        let cmd = compose_command(self.settings, self.workspace, job);
        info!(command = %cmd, "running");

        let inv = Invocation::new("sh").arg("-c").arg(&cmd).current_dir(&dir);
        let output = self.runner.run(&inv).await.map_err(|source| Error::Spawn {
            program: inv.program.clone(),
            source,
        })?;
        debug!(stdout = %output.stdout, stderr = %output.stderr, "captured");

        job.stamp_provisional(self.settings, self.datetime);
        job.stdout = Some(output.stdout);
        job.stderr = Some(output.stderr);
        job.exit_code = Some(output.exit_code);

        info!(exit_code = output.exit_code, "job finished");
        Ok(())
    }
}
