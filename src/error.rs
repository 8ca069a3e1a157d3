// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Error types for the orchestration core.
//!
//! Per-job failures (a rejected submission, a node missing from the instance
//! table) never surface here; they are recorded on the job itself. The
//! variants below abort the whole run.

use std::path::PathBuf;

use thiserror::Error;

use crate::slurm::types::JobId;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Working directory could not be created for a reason other than
    /// "already exists".
    #[error("failed to create working directory {path}: {source}")]
    Directory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An accounting response did not have the expected header + data shape.
    #[error("unexpected sacct output for job {job_id} ({field}): {reason}; raw output: {raw:?}")]
    AccountingFormat {
        job_id: JobId,
        field: &'static str,
        reason: String,
        raw: String,
    },

    /// sbatch exited 0 but its acknowledgement carried no job id.
    #[error("could not extract job id from sbatch acknowledgement {0:?}")]
    UnexpectedAck(String),

    /// An external command could not be launched at all.
    #[error("failed to execute {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// Captured output of a finished job could not be read back.
    #[error("failed to read captured output {path}: {source}")]
    CapturedOutput {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to load instance table from {path}: {reason}")]
    InstanceTable { path: PathBuf, reason: String },

    #[error("workspace not found (checked {0})")]
    Workspace(String),

    #[error("invalid configuration in {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}
