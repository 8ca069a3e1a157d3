// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

use std::io;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::trace;

use super::types::{CommandOutput, Invocation};

/// Runs external commands to completion.
///
/// Everything that talks to the batch scheduler or executes a job goes
/// through this trait, so tests can substitute a scripted implementation.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run the command and wait for it to exit.
    ///
    /// A non-zero exit is reported through [`CommandOutput::exit_code`]; an
    /// `Err` means the process could not be started at all.
    async fn run(&self, invocation: &Invocation) -> io::Result<CommandOutput>;
}

/// Runs commands as real child processes
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, invocation: &Invocation) -> io::Result<CommandOutput> {
        trace!(command = %invocation, "running");

        let mut command = Command::new(&invocation.program);
        command
            .args(&invocation.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }

        let output = command.output().await?;
        Ok(CommandOutput::from(output))
    }
}
