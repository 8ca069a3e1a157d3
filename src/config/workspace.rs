// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

use std::io;
use std::path::{Path, PathBuf};

use tracing::info;

use super::jobs::Job;
use crate::error::{Error, Result};

/// Workspace locations probed when none is given, in order
pub const WORKSPACE_CANDIDATES: [&str; 2] = ["/workspace", "/apps/workspace"];

pub const SETTINGS_FILE: &str = "settings.json";
pub const RESULTS_FILE: &str = "results.json";

/// Shared directory holding settings, scripts and per-job output directories
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: PathBuf,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Use `explicit` if given, otherwise the first existing default location
    pub fn discover(explicit: Option<PathBuf>) -> Result<Self> {
        if let Some(root) = explicit {
            if root.is_dir() {
                return Ok(Self::new(root));
            }
            return Err(Error::Workspace(root.display().to_string()));
        }

        for candidate in WORKSPACE_CANDIDATES {
            if Path::new(candidate).is_dir() {
                info!(workspace = candidate, "found workspace");
                return Ok(Self::new(candidate));
            }
        }
        Err(Error::Workspace(WORKSPACE_CANDIDATES.join(", ")))
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a workspace-relative path; a leading '/' does not escape the workspace
    pub fn resolve(&self, relative: &str) -> PathBuf {
        self.root.join(relative.trim_start_matches('/'))
    }

    pub fn settings_path(&self) -> PathBuf {
        self.root.join(SETTINGS_FILE)
    }

    pub fn results_path(&self) -> PathBuf {
        self.root.join(RESULTS_FILE)
    }

    pub fn job_dir(&self, job: &Job) -> PathBuf {
        self.resolve(&job.output_directory)
    }

    pub fn stdout_path(&self, job: &Job) -> PathBuf {
        self.job_dir(job).join("stdout")
    }

    pub fn stderr_path(&self, job: &Job) -> PathBuf {
        self.job_dir(job).join("stderr")
    }

    /// Create the job's working directory; an existing one is fine
    pub fn ensure_job_dir(&self, job: &Job) -> Result<PathBuf> {
        let dir = self.job_dir(job);
        match std::fs::create_dir_all(&dir) {
            Ok(()) => Ok(dir),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists && dir.is_dir() => Ok(dir),
            Err(source) => Err(Error::Directory { path: dir, source }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_keeps_paths_inside() {
        let ws = Workspace::new("/apps/workspace");
        assert_eq!(ws.resolve("tests/run.sh"), PathBuf::from("/apps/workspace/tests/run.sh"));
        assert_eq!(ws.resolve("/tests/run.sh"), PathBuf::from("/apps/workspace/tests/run.sh"));
    }

    #[test]
    fn test_job_paths() {
        let ws = Workspace::new("/ws");
        let job = Job::new("out/a", "a.sh");
        assert_eq!(ws.stdout_path(&job), PathBuf::from("/ws/out/a/stdout"));
        assert_eq!(ws.stderr_path(&job), PathBuf::from("/ws/out/a/stderr"));
    }

    #[test]
    fn test_ensure_job_dir_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::new(dir.path());
        let job = Job::new("nested/a", "a.sh");

        let created = ws.ensure_job_dir(&job).unwrap();
        assert!(created.is_dir());
        assert_eq!(ws.ensure_job_dir(&job).unwrap(), created);
    }

    #[test]
    fn test_ensure_job_dir_blocked_by_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("blocked"), "not a directory").unwrap();
        let ws = Workspace::new(dir.path());

        let err = ws.ensure_job_dir(&Job::new("blocked", "a.sh")).unwrap_err();
        assert!(matches!(err, Error::Directory { .. }));
    }

    #[test]
    fn test_discover_explicit() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::discover(Some(dir.path().to_path_buf())).unwrap();
        assert_eq!(ws.root(), dir.path());

        let missing = dir.path().join("missing");
        assert!(matches!(Workspace::discover(Some(missing)), Err(Error::Workspace(_))));
    }
}
