// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Slurm integration: sbatch submission, sacct accounting and the
//! node-to-hardware instance table.

pub mod accounting;
pub mod instances;
pub mod slurm;
pub mod types;

pub use slurm::{SlurmClient, SubmitOutcome, SubmitRequest};
