//! History module for attendance record queries.
//!
//! This module provides the core business logic for searching and retrieving
//! attendance records. It is used by both the CLI and REST API.

use crate::db::{self, AttendanceRecord, AttendanceRepository};
use anyhow::Result;
use serde::{Deserialize, Serialize};

/// Parameters for searching attendance history.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SearchParams {
    /// Name substring to filter records
    pub query: Option<String>,
    /// Filter by start date (YYYY-MM-DD format)
    pub from: Option<String>,
    /// Filter by end date (YYYY-MM-DD format)
    pub to: Option<String>,
    /// Maximum number of results
    pub limit: usize,
}

impl SearchParams {
    pub fn new() -> Self {
        Self {
            limit: 20,
            ..Default::default()
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = Some(query.into());
        self
    }

    pub fn with_date_range(mut self, from: Option<String>, to: Option<String>) -> Self {
        self.from = from;
        self.to = to;
        self
    }

    /// Returns true if any filter beyond the limit is specified
    pub fn has_filters(&self) -> bool {
        self.query.is_some() || self.from.is_some() || self.to.is_some()
    }
}

/// A single history entry for list views. The image payload is deliberately
/// omitted; fetch a record by id for the full data URI.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceEntry {
    pub id: i64,
    pub person_name: String,
    pub logged_by: String,
    pub created_at: String,
}

impl From<AttendanceRecord> for AttendanceEntry {
    fn from(record: AttendanceRecord) -> Self {
        Self {
            id: record.id,
            person_name: record.person_name,
            logged_by: record.logged_by,
            created_at: record.created_at,
        }
    }
}

/// Search attendance history with optional filters.
///
/// If no filters are specified, returns recent records.
pub fn search(params: &SearchParams) -> Result<Vec<AttendanceEntry>> {
    let conn = db::init_db()?;

    let records = if params.has_filters() {
        AttendanceRepository::search(
            &conn,
            params.query.as_deref(),
            params.from.as_deref(),
            params.to.as_deref(),
            params.limit,
        )?
    } else {
        AttendanceRepository::list(&conn, params.limit)?
    };

    Ok(records.into_iter().map(AttendanceEntry::from).collect())
}

/// Get recent attendance entries.
pub fn get_recent(limit: usize) -> Result<Vec<AttendanceEntry>> {
    let conn = db::init_db()?;
    let records = AttendanceRepository::list(&conn, limit)?;
    Ok(records.into_iter().map(AttendanceEntry::from).collect())
}

/// Get a full record by id, image included.
pub fn get_by_id(id: i64) -> Result<Option<AttendanceRecord>> {
    let conn = db::init_db()?;
    AttendanceRepository::get(&conn, id)
}
