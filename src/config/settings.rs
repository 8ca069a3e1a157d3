// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

use std::fs;
use std::path::Path;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};

/// Run-wide settings from `settings.json`.
///
/// Loaded once and passed by reference to everything that stamps metadata
/// onto jobs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RunSettings {
    #[serde(deserialize_with = "de_text")]
    pub build_id: String,
    #[serde(deserialize_with = "de_text")]
    pub git_sha: String,
    pub machine_type: String,
    #[serde(default = "one", deserialize_with = "de_count")]
    pub node_count: u32,
    #[serde(default)]
    pub gpu_type: Option<String>,
    #[serde(default, deserialize_with = "de_count")]
    pub gpu_count: u32,
    /// Job list file, relative to the workspace
    pub ci_file: String,
    /// Submit through Slurm instead of running jobs locally
    #[serde(default)]
    pub slurm_controller: bool,

    // Local execution only
    #[serde(default)]
    pub artifact_type: Option<String>,
    #[serde(default)]
    pub singularity_image: Option<String>,
    #[serde(default)]
    pub mpi: bool,
    #[serde(default = "one", deserialize_with = "de_count")]
    pub nproc: u32,
    #[serde(default)]
    pub task_affinity: String,
}

fn one() -> u32 {
    1
}

impl RunSettings {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|e| Error::Config {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(u64),
    Float(f64),
    Text(String),
}

/// Counts are written both as `2` and `"2"` in the wild
pub fn de_count<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<u32, D::Error> {
    match Scalar::deserialize(deserializer)? {
        Scalar::Int(n) => u32::try_from(n).map_err(D::Error::custom),
        Scalar::Float(f) => Err(D::Error::custom(format!("expected a whole number, got {}", f))),
        Scalar::Text(s) => s
            .trim()
            .parse()
            .map_err(|_| D::Error::custom(format!("expected a number, got {:?}", s))),
    }
}

/// Identifiers such as build ids may be numeric in the JSON
fn de_text<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<String, D::Error> {
    Ok(match Scalar::deserialize(deserializer)? {
        Scalar::Int(n) => n.to_string(),
        Scalar::Float(f) => f.to_string(),
        Scalar::Text(s) => s,
    })
}
