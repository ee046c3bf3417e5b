//! Logs module for application log and record retrieval.
//!
//! This module provides the core business logic for fetching logs.
//! It is used by both the CLI and REST API.

use crate::history::{self, AttendanceEntry};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::process::Command;

/// Combined logs result containing both app logs and recent records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogsResult {
    /// Application logs from systemd journal
    pub app_logs: Vec<String>,
    /// Recent attendance entries
    pub records: Vec<AttendanceEntry>,
}

/// Options for log retrieval.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LogsOptions {
    /// Number of log entries to retrieve
    pub lines: usize,
}

impl LogsOptions {
    pub fn new(lines: usize) -> Self {
        Self { lines }
    }
}

/// Get combined application logs and recent attendance entries.
pub fn get_logs(options: &LogsOptions) -> Result<LogsResult> {
    let app_logs = get_app_logs(options.lines)?;
    let records = history::get_recent(options.lines)?;

    Ok(LogsResult { app_logs, records })
}

/// Get application logs from systemd journal.
///
/// Returns a vector of log lines. Returns empty vec if journal is unavailable.
pub fn get_app_logs(lines: usize) -> Result<Vec<String>> {
    let output = Command::new("journalctl")
        .arg("--user")
        .arg("-u")
        .arg("rollcall.service")
        .arg("-n")
        .arg(lines.to_string())
        .arg("--output=short-iso")
        .arg("--no-pager")
        .output()
        .context("Failed to execute journalctl. Is the service running?")?;

    if output.status.success() {
        let logs = String::from_utf8_lossy(&output.stdout);
        Ok(logs
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(String::from)
            .collect())
    } else {
        // Journal might not be available on this system
        Ok(Vec::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logs_options_new() {
        let opts = LogsOptions::new(50);
        assert_eq!(opts.lines, 50);
    }
}
