// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Slurm mode: submit every job, poll until they are terminal, harvest.
//!
//! Architecture:
//! - Submitter: one sbatch call per job, chaining jobs of a group with afterany
//! - Poller: sacct sweeps until every accepted submission is COMPLETED or FAILED
//! - AccountingResolver: exit code, nodes, hardware and captured output per job
//! - aggregator: renders the job list as the results artifact

pub mod aggregator;
pub mod poller;
pub mod resolver;
pub mod submitter;
pub mod tracker;

use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use tracing::{debug, info, warn};

pub use aggregator::{render, ResultSink};
pub use poller::{PollOptions, PollOutcome, PollReport, Poller};
pub use resolver::AccountingResolver;
pub use submitter::{SubmitSummary, Submitter, DEFAULT_SUBMIT_DELAY};
pub use tracker::DependencyTracker;

use crate::config::{JobList, RunSettings, Workspace};
use crate::error::Result;
use crate::process::CommandRunner;
use crate::slurm::instances::{LazyInstanceTable, TrailingSegments, DEFAULT_INSTANCE_CONFIG};
use crate::slurm::SlurmClient;

#[derive(Debug, Clone)]
pub struct OrchestratorOptions {
    pub submit_delay: Duration,
    pub poll: PollOptions,
    pub instance_config: PathBuf,
    /// Hyphen-delimited segments stripped from a node name to get its instance prefix
    pub node_suffix_segments: usize,
}

impl Default for OrchestratorOptions {
    fn default() -> Self {
        Self {
            submit_delay: DEFAULT_SUBMIT_DELAY,
            poll: PollOptions::default(),
            instance_config: PathBuf::from(DEFAULT_INSTANCE_CONFIG),
            node_suffix_segments: TrailingSegments::default().0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    pub submitted: SubmitSummary,
    pub polled: PollReport,
}

pub struct Orchestrator<'a, R> {
    slurm: SlurmClient<R>,
    workspace: &'a Workspace,
    settings: &'a RunSettings,
    datetime: &'a str,
    shutdown: &'a AtomicBool,
    options: OrchestratorOptions,
}

impl<'a, R: CommandRunner> Orchestrator<'a, R> {
    pub fn new(
        slurm: SlurmClient<R>,
        workspace: &'a Workspace,
        settings: &'a RunSettings,
        datetime: &'a str,
        shutdown: &'a AtomicBool,
        options: OrchestratorOptions,
    ) -> Self {
        Self {
            slurm,
            workspace,
            settings,
            datetime,
            shutdown,
            options,
        }
    }

    #[cfg(test)]
    pub fn slurm(&self) -> &SlurmClient<R> {
        &self.slurm
    }

    /// Run every job in `jobs` through Slurm, writing results onto the jobs.
    ///
    /// Returns once all accepted submissions are harvested, or earlier on
    /// shutdown or when the maximum wait runs out.
    pub async fn run(&self, jobs: &mut JobList) -> Result<RunReport> {
        if !self.slurm.is_available().await {
            warn!("sbatch --version failed; submissions will likely be rejected");
        }

        info!(jobs = jobs.len(), "submitting jobs");
        let mut tracker = DependencyTracker::new();
        let submitted = Submitter::new(&self.slurm, self.workspace, self.settings, self.datetime)
            .with_delay(self.options.submit_delay)
            .submit_all(jobs, &mut tracker)
            .await?;
        for group in tracker.group_names() {
            let ids: Vec<u64> = tracker.group(group).iter().map(|r| r.job_id.0).collect();
            debug!(group, ?ids, "dependency chain");
        }

        let mut resolver = AccountingResolver::new(LazyInstanceTable::new(self.options.instance_config.clone()))
            .with_prefix_strategy(TrailingSegments(self.options.node_suffix_segments));

        let polled = Poller::new(&self.slurm, self.workspace, self.shutdown, self.options.poll.clone())
            .run(jobs, &mut tracker, &mut resolver)
            .await?;

        Ok(RunReport { submitted, polled })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Job, PENDING_EXIT_CODE};
    use crate::slurm::types::JobId;
    use crate::testing::ScriptedRunner;

    fn settings() -> RunSettings {
        serde_json::from_str(
            r#"{"build_id": "42", "git_sha": "deadbeef", "machine_type": "c2-standard-8",
                "node_count": 1, "gpu_count": 0, "ci_file": "ci.json", "slurm_controller": true}"#,
        )
        .unwrap()
    }

    fn options(dir: &std::path::Path) -> OrchestratorOptions {
        let config = dir.join("config.yaml");
        std::fs::write(
            &config,
            "instance_defs:\n  c2-standard-8-c1:\n    machine_type: c2-standard-8\n    gpu_count: 0\n",
        )
        .unwrap();
        OrchestratorOptions {
            submit_delay: Duration::ZERO,
            instance_config: config,
            ..Default::default()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_to_end_with_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path());
        let settings = settings();
        let shutdown = AtomicBool::new(false);

        let runner = ScriptedRunner::new();
        runner.on_submit_ok(100);
        runner.on_submit_fail(1, "", "sbatch: error: Batch job submission failed");
        runner.on_submit_ok(101);
        runner.set_state(JobId(100), &["PENDING", "RUNNING", "COMPLETED"]);
        runner.set_state(JobId(101), &["PENDING", "FAILED"]);
        runner.set_exit_code(JobId(101), "2:0");

        let mut jobs = JobList::new(vec![
            Job::new("build", "build.sh").in_group("pipeline"),
            Job::new("lint", "lint.sh"),
            Job::new("test", "test.sh").in_group("pipeline"),
        ]);

        let orchestrator = Orchestrator::new(
            SlurmClient::new(runner, "sbatch", "sacct"),
            &workspace,
            &settings,
            "2026-01-01T00:00:00",
            &shutdown,
            options(dir.path()),
        );
        let report = orchestrator.run(&mut jobs).await.unwrap();

        assert_eq!(report.submitted, SubmitSummary { accepted: 2, rejected: 1 });
        assert_eq!(report.polled.outcome, PollOutcome::Completed);
        assert_eq!(report.polled.total, 2);

        let results: Vec<&Job> = jobs.iter().collect();
        assert_eq!(results[0].exit_code, Some(0));
        assert_eq!(results[0].stdout.as_deref(), Some("stdout of job 100\n"));
        assert_eq!(results[0].machine_type.as_deref(), Some("c2-standard-8"));
        assert_eq!(results[1].exit_code, Some(1));
        assert!(results[1].stderr.as_deref().unwrap().starts_with("sbatch stderr : "));
        assert_eq!(results[2].exit_code, Some(2));
        assert_eq!(results[2].datetime.as_deref(), Some("2026-01-01T00:00:00"));

        let sbatch = orchestrator.slurm().runner().sbatch_calls();
        assert!(sbatch[2].has_arg("--dependency=afterany:100"));
        // The rejected job is never polled
        assert!(orchestrator
            .slurm()
            .runner()
            .calls()
            .iter()
            .filter(|c| c.program == "sacct")
            .all(|c| c.args[1] == "100" || c.args[1] == "101"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_keeps_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let workspace = Workspace::new(dir.path());
        let settings = settings();
        let shutdown = AtomicBool::new(false);

        let runner = ScriptedRunner::new();
        runner.on_submit_ok(7);
        runner.set_state(JobId(7), &["PENDING"]);

        let mut opts = options(dir.path());
        opts.poll.max_wait = Some(Duration::from_secs(30));

        let mut jobs = JobList::new(vec![Job::new("slow", "slow.sh")]);
        let report = Orchestrator::new(
            SlurmClient::new(runner, "sbatch", "sacct"),
            &workspace,
            &settings,
            "now",
            &shutdown,
            opts,
        )
        .run(&mut jobs)
        .await
        .unwrap();

        assert_eq!(report.polled.outcome, PollOutcome::TimedOut);
        let job = jobs.iter().next().unwrap();
        assert_eq!(job.exit_code, Some(PENDING_EXIT_CODE));
        assert_eq!(job.stdout.as_deref(), Some(""));
    }
}
