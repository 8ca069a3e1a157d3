// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Harvests the results of a job that reached a terminal state.

use std::path::Path;

use tracing::{debug, info};

use crate::config::{Job, Workspace};
use crate::error::{Error, Result};
use crate::process::CommandRunner;
use crate::slurm::instances::{LazyInstanceTable, NodePrefix, TrailingSegments};
use crate::slurm::types::JobId;
use crate::slurm::SlurmClient;

pub struct AccountingResolver {
    instances: LazyInstanceTable,
    prefix: Box<dyn NodePrefix>,
}

impl AccountingResolver {
    pub fn new(instances: LazyInstanceTable) -> Self {
        Self {
            instances,
            prefix: Box::new(TrailingSegments::default()),
        }
    }

    pub fn with_prefix_strategy(mut self, prefix: impl NodePrefix + 'static) -> Self {
        self.prefix = Box::new(prefix);
        self
    }

    /// Fill in the final result fields of `job` from accounting and its
    /// captured output files.
    ///
    /// Hardware fields keep their provisional values when the node is not
    /// in the instance table.
    pub async fn resolve<R: CommandRunner>(
        &mut self,
        slurm: &SlurmClient<R>,
        workspace: &Workspace,
        job_id: JobId,
        job: &mut Job,
    ) -> Result<()> {
        let exit_code = slurm.exit_code(job_id).await?;
        let node_count = slurm.node_count(job_id).await?;
        let node_list = slurm.node_list(job_id).await?;

        job.exit_code = Some(exit_code);
        job.node_count = Some(node_count);
        self.apply_instance(&node_list, job)?;

        job.stdout = Some(read_captured(&workspace.stdout_path(job)).await?);
        job.stderr = Some(read_captured(&workspace.stderr_path(job)).await?);

        info!(
            job_id = %job_id,
            exit_code,
            nodes = node_count,
            machine_type = job.machine_type.as_deref().unwrap_or("-"),
            "job finished"
        );
        Ok(())
    }

    fn apply_instance(&mut self, node_list: &str, job: &mut Job) -> Result<()> {
        let Some(prefix) = self.prefix.prefix(node_list) else {
            debug!(node_list, "node name does not match the instance naming scheme");
            return Ok(());
        };

        match self.instances.get()?.get(prefix) {
            Some(def) => {
                job.machine_type = Some(def.machine_type.clone());
                job.gpu_type = def.gpu_type.clone();
                job.gpu_count = Some(def.gpu_count);
            }
            None => debug!(prefix, "no instance definition, keeping run defaults"),
        }
        Ok(())
    }
}

async fn read_captured(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path).await.map_err(|source| Error::CapturedOutput {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
