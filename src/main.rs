// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod error;
mod local;
mod orchestrator;
mod process;
mod slurm;
#[cfg(test)]
mod testing;

use config::{JobList, RunSettings, Workspace};
use local::LocalRunner;
use orchestrator::{Orchestrator, OrchestratorOptions, PollOptions, PollOutcome, ResultSink};
use process::SystemRunner;
use slurm::instances::DEFAULT_INSTANCE_CONFIG;
use slurm::SlurmClient;

/// Exit status when polling stopped before every job finished
const INCOMPLETE_EXIT_CODE: u8 = 2;

#[derive(Parser, Debug)]
#[command(name = "cirun")]
#[command(about = "Run CI test jobs through Slurm (or locally) and collect their results")]
#[command(version)]
struct Args {
    /// Workspace root (default: /workspace, then /apps/workspace)
    #[arg(long, env = "CIRUN_WORKSPACE")]
    workspace: Option<PathBuf>,

    /// sbatch binary
    #[arg(long, env = "CIRUN_SBATCH", default_value = "sbatch")]
    sbatch: String,

    /// sacct binary
    #[arg(long, env = "CIRUN_SACCT", default_value = "sacct")]
    sacct: String,

    /// YAML file with the `instance_defs` node-to-hardware table
    #[arg(long, env = "CIRUN_INSTANCE_CONFIG", default_value = DEFAULT_INSTANCE_CONFIG)]
    instance_config: PathBuf,

    /// Seconds between accounting sweeps
    #[arg(long, default_value = "5")]
    poll_interval: u64,

    /// Milliseconds to pause after each submission
    #[arg(long, default_value = "500")]
    submit_delay: u64,

    /// Give up polling after this many seconds (default: wait forever)
    #[arg(long, env = "CIRUN_MAX_WAIT")]
    max_wait: Option<u64>,

    /// Hyphen-delimited segments stripped from a node name to get its instance prefix
    #[arg(long, default_value = "2")]
    node_suffix_segments: usize,

    /// Rewrite the results file after every polling sweep
    #[arg(long)]
    snapshot: bool,

    /// Results file (default: <workspace>/results.json)
    #[arg(long)]
    results: Option<PathBuf>,

    /// Debug logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<ExitCode> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let workspace = Workspace::discover(args.workspace.clone()).context("Failed to locate workspace")?;
    let settings = RunSettings::load(&workspace.settings_path()).context("Failed to load run settings")?;
    let mut jobs = JobList::load(&workspace.resolve(&settings.ci_file)).context("Failed to load job list")?;
    info!(
        workspace = %workspace.root().display(),
        jobs = jobs.len(),
        slurm = settings.slurm_controller,
        "starting run"
    );

    if jobs.is_empty() {
        warn!("job list is empty; only an empty results file will be written");
    }

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_clone = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_clone.store(true, Ordering::SeqCst);
    })
    .context("Failed to install signal handler")?;

    let datetime = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%S").to_string();
    let sink = ResultSink::new(args.results.clone().unwrap_or_else(|| workspace.results_path()));

    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;

    let finished = if settings.slurm_controller {
        let options = OrchestratorOptions {
            submit_delay: Duration::from_millis(args.submit_delay),
            poll: PollOptions {
                interval: Duration::from_secs(args.poll_interval),
                max_wait: args.max_wait.map(Duration::from_secs),
                snapshot: args.snapshot.then(|| sink.clone()),
            },
            instance_config: args.instance_config.clone(),
            node_suffix_segments: args.node_suffix_segments,
        };
        let slurm = SlurmClient::new(SystemRunner, &args.sbatch, &args.sacct);
        let orchestrator = Orchestrator::new(slurm, &workspace, &settings, &datetime, &shutdown, options);
        let report = rt.block_on(orchestrator.run(&mut jobs)).context("Slurm run failed")?;
        info!(
            accepted = report.submitted.accepted,
            rejected = report.submitted.rejected,
            sweeps = report.polled.sweeps,
            "slurm run finished"
        );
        report.polled.outcome == PollOutcome::Completed
    } else {
        let local = LocalRunner::new(SystemRunner, &workspace, &settings, &datetime, &shutdown);
        let report = rt.block_on(local.run_all(&mut jobs)).context("Local run failed")?;
        report.skipped == 0
    };

    sink.write(&jobs)
        .with_context(|| format!("Failed to write results to {}", sink.path().display()))?;
    info!(path = %sink.path().display(), "results written");

    if finished {
        Ok(ExitCode::SUCCESS)
    } else {
        let outstanding = jobs.iter().filter(|j| !j.is_resolved()).count();
        warn!(outstanding, "run did not finish; outstanding jobs keep placeholder results");
        Ok(ExitCode::from(INCOMPLETE_EXIT_CODE))
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
