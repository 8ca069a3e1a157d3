// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! In-memory stand-in for sbatch/sacct used by unit tests.

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::process::{CommandOutput, CommandRunner, Invocation};
use crate::slurm::types::JobId;

#[derive(Default)]
struct Script {
    submits: VecDeque<CommandOutput>,
    commands: VecDeque<CommandOutput>,
    states: HashMap<JobId, VecDeque<String>>,
    exit_codes: HashMap<JobId, String>,
    node_counts: HashMap<JobId, String>,
    node_lists: HashMap<JobId, String>,
    failing_sacct: HashSet<JobId>,
    raw_state: HashMap<JobId, String>,
    refuse_spawn: bool,
    write_outputs: bool,
    calls: Vec<Invocation>,
}

/// Scripted scheduler: sbatch answers come from a queue, sacct answers from
/// per-job tables. Every invocation is recorded.
pub struct ScriptedRunner {
    script: Mutex<Script>,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self {
            script: Mutex::new(Script {
                write_outputs: true,
                ..Default::default()
            }),
        }
    }

    fn with<T>(&self, f: impl FnOnce(&mut Script) -> T) -> T {
        let mut script = self.script.lock().unwrap();
        f(&mut script)
    }

    pub fn on_submit_ok(&self, job_id: u64) {
        self.with(|s| {
            s.submits.push_back(CommandOutput {
                stdout: format!("Submitted batch job {}\n", job_id),
                stderr: String::new(),
                exit_code: 0,
            })
        });
    }

    pub fn on_submit_fail(&self, exit_code: i32, stdout: &str, stderr: &str) {
        self.with(|s| {
            s.submits.push_back(CommandOutput {
                stdout: stdout.to_string(),
                stderr: stderr.to_string(),
                exit_code,
            })
        });
    }

    /// Queue the output of the next non-Slurm command
    pub fn on_command(&self, output: CommandOutput) {
        self.with(|s| s.commands.push_back(output));
    }

    /// States reported by successive queries; the last one repeats
    pub fn set_state(&self, job_id: JobId, states: &[&str]) {
        self.with(|s| {
            s.states
                .insert(job_id, states.iter().map(|st| st.to_string()).collect())
        });
    }

    /// Verbatim stdout of every state query for the job
    pub fn set_raw_state(&self, job_id: JobId, raw: &str) {
        self.with(|s| s.raw_state.insert(job_id, raw.to_string()));
    }

    pub fn set_exit_code(&self, job_id: JobId, field: &str) {
        self.with(|s| s.exit_codes.insert(job_id, field.to_string()));
    }

    pub fn set_node_count(&self, job_id: JobId, field: &str) {
        self.with(|s| s.node_counts.insert(job_id, field.to_string()));
    }

    pub fn set_node_list(&self, job_id: JobId, field: &str) {
        self.with(|s| s.node_lists.insert(job_id, field.to_string()));
    }

    pub fn fail_sacct(&self, job_id: JobId) {
        self.with(|s| s.failing_sacct.insert(job_id));
    }

    pub fn refuse_spawn(&self) {
        self.with(|s| s.refuse_spawn = true);
    }

    pub fn skip_output_files(&self) {
        self.with(|s| s.write_outputs = false);
    }

    pub fn calls(&self) -> Vec<Invocation> {
        self.with(|s| s.calls.clone())
    }

    pub fn sbatch_calls(&self) -> Vec<Invocation> {
        self.calls()
            .into_iter()
            .filter(|c| c.program.ends_with("sbatch") && !c.has_arg("--version"))
            .collect()
    }

    /// State queries issued for one job
    pub fn state_queries(&self, job_id: JobId) -> usize {
        let id = job_id.to_string();
        self.calls()
            .iter()
            .filter(|c| c.program.ends_with("sacct") && c.has_arg(&id) && c.has_arg("--format=state%10"))
            .count()
    }
}

fn table(header: &str, value: &str) -> String {
    format!(
        "{:>10} \n{} \n{:>10} \n",
        header,
        "-".repeat(10.max(header.len())),
        value
    )
}

fn ok(stdout: String) -> CommandOutput {
    CommandOutput {
        stdout,
        stderr: String::new(),
        exit_code: 0,
    }
}

fn flag_value(inv: &Invocation, flag: &str) -> Option<PathBuf> {
    let pos = inv.args.iter().position(|a| a == flag)?;
    inv.args.get(pos + 1).map(PathBuf::from)
}

impl Script {
    fn sbatch(&mut self, inv: &Invocation) -> CommandOutput {
        if inv.has_arg("--version") {
            return ok("slurm 23.11.4\n".to_string());
        }
        let output = self.submits.pop_front().unwrap_or_else(|| CommandOutput {
            stdout: String::new(),
            stderr: "sbatch: error: no scripted response\n".to_string(),
            exit_code: 1,
        });
        if output.success() && self.write_outputs {
            let id = output.stdout.split_whitespace().last().unwrap_or("?").to_string();
            for (flag, stream) in [("-o", "stdout"), ("-e", "stderr")] {
                if let Some(path) = flag_value(inv, flag) {
                    let _ = std::fs::write(path, format!("{} of job {}\n", stream, id));
                }
            }
        }
        output
    }

    fn sacct(&mut self, inv: &Invocation) -> CommandOutput {
        let job_id: JobId = match inv.args.get(1).and_then(|a| a.parse().ok()) {
            Some(id) => id,
            None => return ok(String::new()),
        };
        if self.failing_sacct.contains(&job_id) {
            return CommandOutput {
                stdout: String::new(),
                stderr: "sacct: error: slurmdbd unreachable\n".to_string(),
                exit_code: 1,
            };
        }
        let format = inv.args.get(2).map(String::as_str).unwrap_or("");
        let stdout = match format {
            "--format=state%10" => {
                if let Some(raw) = self.raw_state.get(&job_id) {
                    raw.clone()
                } else {
                    let queue = self.states.entry(job_id).or_default();
                    let state = if queue.len() > 1 {
                        queue.pop_front().unwrap_or_default()
                    } else {
                        queue.front().cloned().unwrap_or_else(|| "COMPLETED".to_string())
                    };
                    table("State", &state)
                }
            }
            "--format=exitCode%10" => table(
                "ExitCode",
                self.exit_codes.get(&job_id).map(String::as_str).unwrap_or("0:0"),
            ),
            "--format=NNodes" => table(
                "NNodes",
                self.node_counts.get(&job_id).map(String::as_str).unwrap_or("1"),
            ),
            "--format=nodelist%30" => format!(
                "{:>30} \n{} \n{:>30} \n",
                "NodeList",
                "-".repeat(30),
                self.node_lists
                    .get(&job_id)
                    .map(String::as_str)
                    .unwrap_or("c2-standard-8-c1-0001-0")
            ),
            _ => String::new(),
        };
        ok(stdout)
    }
}

#[async_trait]
impl CommandRunner for ScriptedRunner {
    async fn run(&self, invocation: &Invocation) -> io::Result<CommandOutput> {
        self.with(|s| {
            s.calls.push(invocation.clone());
            if s.refuse_spawn {
                return Err(io::Error::new(io::ErrorKind::NotFound, "no such file"));
            }
            let output = if invocation.program.ends_with("sbatch") {
                s.sbatch(invocation)
            } else if invocation.program.ends_with("sacct") {
                s.sacct(invocation)
            } else {
                s.commands.pop_front().unwrap_or_default()
            };
            Ok(output)
        })
    }
}
