// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Process invocation: runs an external command and captures its output.

pub mod runner;
pub mod types;

pub use runner::{CommandRunner, SystemRunner};
pub use types::{CommandOutput, Invocation};
