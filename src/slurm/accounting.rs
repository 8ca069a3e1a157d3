// SPDX-FileCopyrightText: 2026 GSI Helmholtzzentrum f. Schwerionenforschung GmbH, Darmstadt, Germany
// SPDX-License-Identifier: LGPL-3.0-or-later

//! Parsing of single-column `sacct --format=<field>` tables.
//!
//! sacct prints a header line, a dash separator and one data line per job
//! step, usually followed by a trailing newline:
//!
//! ```text
//!      State
//! ----------
//!  COMPLETED
//! ```
//!
//! The value of interest is always the last non-blank line. Anything that
//! does not have a header and a data row is rejected instead of guessed at.

use super::types::{JobId, JobState};
use crate::error::{Error, Result};

/// Shape of a single-column sacct table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Table<'a> {
    /// Trimmed content of the last data row
    Row(&'a str),
    /// Header and separator but no rows yet
    HeaderOnly,
}

/// Locate the data row of a sacct table.
///
/// Errors carry a short reason; callers attach job and field context.
pub fn parse_table(raw: &str) -> std::result::Result<Table<'_>, &'static str> {
    let mut lines: Vec<&str> = raw.lines().collect();
    while lines.last().is_some_and(|l| l.trim().is_empty()) {
        lines.pop();
    }

    let Some(last) = lines.last().map(|l| l.trim()) else {
        return Err("empty output");
    };
    if lines.len() < 2 {
        return Err("expected a header line followed by a data line");
    }
    if is_separator(last) {
        return Ok(Table::HeaderOnly);
    }
    Ok(Table::Row(last))
}

fn is_separator(line: &str) -> bool {
    !line.is_empty() && line.chars().all(|c| c == '-' || c == ' ')
}

fn format_error(job_id: JobId, field: &'static str, reason: impl Into<String>, raw: &str) -> Error {
    Error::AccountingFormat {
        job_id,
        field,
        reason: reason.into(),
        raw: raw.to_string(),
    }
}

/// Data row of a field query; a table without rows is a format error
pub fn field_row<'a>(job_id: JobId, field: &'static str, raw: &'a str) -> Result<&'a str> {
    match parse_table(raw) {
        Ok(Table::Row(row)) => Ok(row),
        Ok(Table::HeaderOnly) => Err(format_error(job_id, field, "no data row", raw)),
        Err(reason) => Err(format_error(job_id, field, reason, raw)),
    }
}

/// Parse `sacct --format=state%10`.
///
/// A header-only table means the job is not in accounting yet, which is not
/// an error: the poller asks again on the next sweep.
pub fn parse_state(job_id: JobId, raw: &str) -> Result<JobState> {
    match parse_table(raw) {
        Ok(Table::Row(row)) => Ok(JobState::from(row)),
        Ok(Table::HeaderOnly) => Ok(JobState::NotVisible),
        Err(reason) => Err(format_error(job_id, "state", reason, raw)),
    }
}

/// Parse `sacct --format=exitCode%10`; the field reads `<code>:<signal>`
pub fn parse_exit_code(job_id: JobId, raw: &str) -> Result<i32> {
    let row = field_row(job_id, "exitcode", raw)?;
    let code = row.split(':').next().unwrap_or(row).trim();
    code.parse()
        .map_err(|_| format_error(job_id, "exitcode", format!("{:?} is not an exit code", row), raw))
}

/// Parse `sacct --format=NNodes`
pub fn parse_node_count(job_id: JobId, raw: &str) -> Result<u32> {
    let row = field_row(job_id, "nnodes", raw)?;
    row.parse()
        .map_err(|_| format_error(job_id, "nnodes", format!("{:?} is not a node count", row), raw))
}

/// Parse `sacct --format=nodelist%30`
pub fn parse_node_list(job_id: JobId, raw: &str) -> Result<String> {
    field_row(job_id, "nodelist", raw).map(str::to_string)
}
