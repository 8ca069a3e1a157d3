// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Static mapping from node-name prefix to hardware description.
//!
//! The table comes from the slurm-gcp cluster config (`instance_defs`),
//! keyed by the node-name prefix the cluster uses for each instance group.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::config::de_count;
use crate::error::{Error, Result};

/// Default location of the slurm-gcp config on the controller
pub const DEFAULT_INSTANCE_CONFIG: &str = "/slurm/scripts/config.yaml";

/// Hardware of one instance group
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct InstanceDef {
    pub machine_type: String,
    #[serde(default)]
    pub gpu_type: Option<String>,
    #[serde(default, deserialize_with = "de_count")]
    pub gpu_count: u32,
}

#[derive(Debug, Deserialize)]
struct ClusterConfig {
    #[serde(default)]
    instance_defs: HashMap<String, InstanceDef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstanceTable {
    defs: HashMap<String, InstanceDef>,
}

impl InstanceTable {
    pub fn from_defs(defs: HashMap<String, InstanceDef>) -> Self {
        Self { defs }
    }

    pub fn from_yaml(content: &str) -> std::result::Result<Self, serde_yaml::Error> {
        let config: ClusterConfig = serde_yaml::from_str(content)?;
        Ok(Self::from_defs(config.instance_defs))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| Error::InstanceTable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        let table = Self::from_yaml(&content).map_err(|e| Error::InstanceTable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), entries = table.len(), "loaded instance table");
        Ok(table)
    }

    pub fn get(&self, prefix: &str) -> Option<&InstanceDef> {
        self.defs.get(prefix)
    }

    pub fn len(&self) -> usize {
        self.defs.len()
    }
}

/// Instance table read from disk on first use, then cached for the run
#[derive(Debug)]
pub struct LazyInstanceTable {
    path: PathBuf,
    table: Option<InstanceTable>,
}

impl LazyInstanceTable {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            table: None,
        }
    }

    #[cfg(test)]
    pub fn preloaded(table: InstanceTable) -> Self {
        Self {
            path: PathBuf::new(),
            table: Some(table),
        }
    }

    pub fn get(&mut self) -> Result<&InstanceTable> {
        if self.table.is_none() {
            self.table = Some(InstanceTable::load(&self.path)?);
        }
        Ok(self.table.get_or_insert_with(InstanceTable::default))
    }
}

/// Reduces an allocated node name to an instance table key
pub trait NodePrefix: Send + Sync {
    /// `None` when the node name does not follow the naming scheme
    fn prefix<'a>(&self, node: &'a str) -> Option<&'a str>;
}

/// Drops a fixed number of trailing hyphen-delimited segments.
///
/// slurm-gcp names nodes `<prefix>-<index>-<suffix>`, so the default of two
/// turns `g2-standard-16-a3-0002-5` into `g2-standard-16-a3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrailingSegments(pub usize);

impl Default for TrailingSegments {
    fn default() -> Self {
        TrailingSegments(2)
    }
}

impl NodePrefix for TrailingSegments {
    fn prefix<'a>(&self, node: &'a str) -> Option<&'a str> {
        let node = node.trim();
        let mut end = node.len();
        for _ in 0..self.0 {
            end = node[..end].rfind('-')?;
        }
        let prefix = &node[..end];
        (!prefix.is_empty()).then_some(prefix)
    }
}
