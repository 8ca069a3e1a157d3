// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Results artifact: the job list with whatever results are known so far.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::JobList;
use crate::error::Result;

/// Serialize the job list. Pure: the same list always renders to the same bytes.
pub fn render(jobs: &JobList) -> Result<String> {
    let mut out = serde_json::to_string_pretty(jobs)?;
    out.push('\n');
    Ok(out)
}

/// Writes rendered results to a fixed path
#[derive(Debug, Clone)]
pub struct ResultSink {
    path: PathBuf,
}

impl ResultSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the artifact; readers never observe a partially written file
    pub fn write(&self, jobs: &JobList) -> Result<()> {
        let rendered = render(jobs)?;
        let tmp = self.path.with_extension("json.partial");
        fs::write(&tmp, rendered.as_bytes())?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), jobs = jobs.len(), "wrote results");
        Ok(())
    }
}
