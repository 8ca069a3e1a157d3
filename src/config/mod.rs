// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Inputs of a run: workspace layout, run-wide settings and the job list.

pub mod jobs;
pub mod settings;
pub mod workspace;

pub use jobs::{Job, JobHandle, JobList, PENDING_EXIT_CODE};
pub use settings::{de_count, RunSettings};
pub use workspace::Workspace;
