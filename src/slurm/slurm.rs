// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Slurm CLI integration: submit via sbatch, query accounting via sacct.

use std::path::PathBuf;

use tracing::{debug, warn};

use super::accounting;
use super::types::{JobId, JobState};
use crate::error::{Error, Result};
use crate::process::{CommandOutput, CommandRunner, Invocation};

/// sacct column selectors, with the widths the parser expects
pub const FORMAT_STATE: &str = "--format=state%10";
pub const FORMAT_EXIT_CODE: &str = "--format=exitCode%10";
pub const FORMAT_NODE_COUNT: &str = "--format=NNodes";
pub const FORMAT_NODE_LIST: &str = "--format=nodelist%30";

/// One sbatch call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitRequest {
    /// Batch script to run
    pub script: PathBuf,
    /// Start only after this job has ended, whatever its outcome
    pub after_any: Option<JobId>,
    pub partition: Option<String>,
    pub stdout: PathBuf,
    pub stderr: PathBuf,
}

/// Result of a submission that sbatch could be launched for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted(JobId),
    /// sbatch exited non-zero; its captured output is kept for the job record
    Rejected(CommandOutput),
}

/// Thin wrapper around the Slurm command line tools
#[derive(Debug)]
pub struct SlurmClient<R> {
    runner: R,
    sbatch: String,
    sacct: String,
}

impl<R: CommandRunner> SlurmClient<R> {
    pub fn new(runner: R, sbatch: impl Into<String>, sacct: impl Into<String>) -> Self {
        Self {
            runner,
            sbatch: sbatch.into(),
            sacct: sacct.into(),
        }
    }

    #[cfg(test)]
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Build the sbatch command line for a request
    pub fn submit_invocation(&self, request: &SubmitRequest) -> Invocation {
        let mut inv = Invocation::new(&self.sbatch);
        if let Some(upstream) = request.after_any {
            inv = inv.arg(format!("--dependency=afterany:{}", upstream));
        }
        if let Some(partition) = &request.partition {
            inv = inv.arg(format!("--partition={}", partition));
        }
        inv.arg("-o")
            .arg(request.stdout.to_string_lossy())
            .arg("-e")
            .arg(request.stderr.to_string_lossy())
            .arg(request.script.to_string_lossy())
    }

    pub async fn submit(&self, request: &SubmitRequest) -> Result<SubmitOutcome> {
        let inv = self.submit_invocation(request);
        debug!(command = %inv, "submitting");
        let output = self.exec(&inv).await?;

        if !output.success() {
            return Ok(SubmitOutcome::Rejected(output));
        }
        parse_job_id(&output.stdout).map(SubmitOutcome::Accepted)
    }

    /// Current accounting state of a job
    pub async fn state(&self, job_id: JobId) -> Result<JobState> {
        let output = self.sacct(job_id, FORMAT_STATE).await?;
        if !output.success() {
            // slurmdbd hiccups are common; ask again next sweep
            warn!(
                job_id = %job_id,
                exit_code = output.exit_code,
                stderr = %output.stderr.trim(),
                "sacct state query failed"
            );
            return Ok(JobState::NotVisible);
        }
        accounting::parse_state(job_id, &output.stdout)
    }

    pub async fn exit_code(&self, job_id: JobId) -> Result<i32> {
        let raw = self.sacct_field(job_id, FORMAT_EXIT_CODE, "exitcode").await?;
        accounting::parse_exit_code(job_id, &raw)
    }

    pub async fn node_count(&self, job_id: JobId) -> Result<u32> {
        let raw = self.sacct_field(job_id, FORMAT_NODE_COUNT, "nnodes").await?;
        accounting::parse_node_count(job_id, &raw)
    }

    pub async fn node_list(&self, job_id: JobId) -> Result<String> {
        let raw = self.sacct_field(job_id, FORMAT_NODE_LIST, "nodelist").await?;
        accounting::parse_node_list(job_id, &raw)
    }

    /// Check if sbatch can be executed at all
    pub async fn is_available(&self) -> bool {
        let inv = Invocation::new(&self.sbatch).arg("--version");
        self.runner
            .run(&inv)
            .await
            .map(|o| o.success())
            .unwrap_or(false)
    }

    async fn sacct(&self, job_id: JobId, format: &str) -> Result<CommandOutput> {
        let inv = Invocation::new(&self.sacct).args(["-j".to_string(), job_id.to_string(), format.to_string()]);
        self.exec(&inv).await
    }

    async fn sacct_field(&self, job_id: JobId, format: &str, field: &'static str) -> Result<String> {
        let output = self.sacct(job_id, format).await?;
        if !output.success() {
            return Err(Error::AccountingFormat {
                job_id,
                field,
                reason: format!("sacct exited with {}: {}", output.exit_code, output.stderr.trim()),
                raw: output.stdout,
            });
        }
        Ok(output.stdout)
    }

    async fn exec(&self, inv: &Invocation) -> Result<CommandOutput> {
        self.runner.run(inv).await.map_err(|source| Error::Spawn {
            program: inv.program.clone(),
            source,
        })
    }
}

/// Extract the job id from an sbatch acknowledgement ("Submitted batch job 42")
pub fn parse_job_id(ack: &str) -> Result<JobId> {
    ack.split_whitespace()
        .last()
        .and_then(|token| token.parse().ok())
        .ok_or_else(|| Error::UnexpectedAck(ack.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ScriptedRunner;

    fn client(runner: ScriptedRunner) -> SlurmClient<ScriptedRunner> {
        SlurmClient::new(runner, "sbatch", "sacct")
    }

    fn request() -> SubmitRequest {
        SubmitRequest {
            script: PathBuf::from("/ws/tests/run.sh"),
            after_any: None,
            partition: None,
            stdout: PathBuf::from("/ws/out/a/stdout"),
            stderr: PathBuf::from("/ws/out/a/stderr"),
        }
    }

    #[test]
    fn test_parse_job_id() {
        assert_eq!(parse_job_id("Submitted batch job 42\n").unwrap(), JobId(42));
        assert_eq!(parse_job_id("Submitted batch job 1234567").unwrap(), JobId(1234567));
        assert!(matches!(parse_job_id(""), Err(Error::UnexpectedAck(_))));
        assert!(matches!(
            parse_job_id("Submitted batch job"),
            Err(Error::UnexpectedAck(_))
        ));
    }

    #[test]
    fn test_submit_invocation_plain() {
        let c = client(ScriptedRunner::new());
        let inv = c.submit_invocation(&request());
        assert_eq!(
            inv.to_string(),
            "sbatch -o /ws/out/a/stdout -e /ws/out/a/stderr /ws/tests/run.sh"
        );
    }

    #[test]
    fn test_submit_invocation_dependency_and_partition() {
        let c = client(ScriptedRunner::new());
        let req = SubmitRequest {
            after_any: Some(JobId(42)),
            partition: Some("gpu".to_string()),
            ..request()
        };
        let inv = c.submit_invocation(&req);
        assert_eq!(
            inv.args[..2],
            ["--dependency=afterany:42".to_string(), "--partition=gpu".to_string()]
        );
    }

    #[tokio::test]
    async fn test_submit_accepted_and_rejected() {
        let runner = ScriptedRunner::new();
        runner.on_submit_ok(42);
        runner.on_submit_fail(1, "", "sbatch: error: invalid partition");
        let c = client(runner);

        assert_eq!(c.submit(&request()).await.unwrap(), SubmitOutcome::Accepted(JobId(42)));
        match c.submit(&request()).await.unwrap() {
            SubmitOutcome::Rejected(out) => {
                assert_eq!(out.exit_code, 1);
                assert!(out.stderr.contains("invalid partition"));
            }
            other => panic!("unexpected outcome {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_state_query_wire_format() {
        let runner = ScriptedRunner::new();
        runner.set_state(JobId(7), &["COMPLETED"]);
        let c = client(runner);

        assert_eq!(c.state(JobId(7)).await.unwrap(), JobState::Completed);
        let calls = c.runner().calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].to_string(), "sacct -j 7 --format=state%10");
    }

    #[tokio::test]
    async fn test_failed_sacct_state_is_retried() {
        let runner = ScriptedRunner::new();
        runner.fail_sacct(JobId(7));
        let c = client(runner);
        assert_eq!(c.state(JobId(7)).await.unwrap(), JobState::NotVisible);
        assert!(c.exit_code(JobId(7)).await.is_err());
    }

    #[tokio::test]
    async fn test_spawn_failure_is_reported() {
        let runner = ScriptedRunner::new();
        runner.refuse_spawn();
        let c = client(runner);
        assert!(matches!(c.submit(&request()).await, Err(Error::Spawn { .. })));
        assert!(!c.is_available().await);
    }
}
