// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Completion polling: sweep sacct until every submitted job is terminal.
//!
//! One sweep queries each pending submission once, sequentially, group by
//! group. Between sweeps the task sleeps for a fixed interval. Without a
//! maximum wait the loop ends only when Slurm reports COMPLETED or FAILED for
//! every job; a job stuck in any other state keeps it running forever.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::aggregator::ResultSink;
use super::resolver::AccountingResolver;
use super::tracker::DependencyTracker;
use crate::config::{JobList, Workspace};
use crate::error::Result;
use crate::process::CommandRunner;
use crate::slurm::types::JobId;
use crate::slurm::SlurmClient;

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Granularity at which the inter-sweep sleep notices a shutdown request
const SHUTDOWN_CHECK: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct PollOptions {
    pub interval: Duration,
    /// Give up after this long; `None` waits indefinitely
    pub max_wait: Option<Duration>,
    /// Rewrite the results artifact after every sweep
    pub snapshot: Option<ResultSink>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_wait: None,
            snapshot: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollOutcome {
    /// Every submitted job reached a terminal state
    Completed,
    /// Stopped on request; outstanding jobs keep their provisional results
    Cancelled,
    /// `max_wait` elapsed first
    TimedOut,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollReport {
    pub outcome: PollOutcome,
    pub sweeps: usize,
    pub completed: usize,
    pub total: usize,
}

pub struct Poller<'a, R> {
    slurm: &'a SlurmClient<R>,
    workspace: &'a Workspace,
    shutdown: &'a AtomicBool,
    options: PollOptions,
}

impl<'a, R: CommandRunner> Poller<'a, R> {
    pub fn new(
        slurm: &'a SlurmClient<R>,
        workspace: &'a Workspace,
        shutdown: &'a AtomicBool,
        options: PollOptions,
    ) -> Self {
        Self {
            slurm,
            workspace,
            shutdown,
            options,
        }
    }

    pub async fn run(
        &self,
        jobs: &mut JobList,
        tracker: &mut DependencyTracker,
        resolver: &mut AccountingResolver,
    ) -> Result<PollReport> {
        let total = tracker.total();
        let mut completed = tracker.completed();
        let mut sweeps = 0;
        let started = Instant::now();
        let mut warned: HashSet<JobId> = HashSet::new();

        if self.options.max_wait.is_none() && completed < total {
            warn!("no maximum wait configured: polling continues until Slurm reports every job COMPLETED or FAILED");
        }

        let outcome = loop {
            if completed == total {
                break PollOutcome::Completed;
            }
            if self.shutdown.load(Ordering::SeqCst) {
                break PollOutcome::Cancelled;
            }
            if self.options.max_wait.is_some_and(|max| started.elapsed() >= max) {
                break PollOutcome::TimedOut;
            }

            sweeps += 1;
            info!("Jobs status : {}/{}", completed, total);

            for record in tracker.pending_mut() {
                let state = self.slurm.state(record.job_id).await?;
                debug!(job_id = %record.job_id, state = %state, "polled");

                if state.is_terminal() {
                    let job = jobs.get_mut(record.job);
                    resolver.resolve(self.slurm, self.workspace, record.job_id, job).await?;
                    if record.mark_complete() {
                        completed += 1;
                    }
                } else if state.is_stuck_final() && warned.insert(record.job_id) {
                    warn!(
                        job_id = %record.job_id,
                        state = %state,
                        "job ended in a state that is not harvested; it will be polled until a timeout"
                    );
                }
            }

            if let Some(sink) = &self.options.snapshot {
                sink.write(jobs)?;
            }

            if completed < total {
                self.pause().await;
            }
        };

        match outcome {
            PollOutcome::Completed => info!("Jobs status : {}/{}", completed, total),
            PollOutcome::Cancelled => warn!(completed, total, "polling cancelled"),
            PollOutcome::TimedOut => warn!(completed, total, "maximum wait exceeded, giving up"),
        }

        Ok(PollReport {
            outcome,
            sweeps,
            completed,
            total,
        })
    }

    /// Sleep one poll interval, waking early on shutdown
    async fn pause(&self) {
        let mut slept = Duration::ZERO;
        while slept < self.options.interval {
            if self.shutdown.load(Ordering::SeqCst) {
                return;
            }
            let chunk = SHUTDOWN_CHECK.min(self.options.interval - slept);
            tokio::time::sleep(chunk).await;
            slept += chunk;
        }
    }
}
