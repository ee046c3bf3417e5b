//! Attendance record persistence.
//!
//! Raw SQL with rusqlite, no ORM. The table is append-only: rows are inserted
//! once and never updated or deleted.

use anyhow::{bail, Context, Result};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

/// An attendance row as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttendanceRecord {
    pub id: i64,
    pub person_name: String,
    /// Still image the record was verified against, kept verbatim as a data URI.
    pub image: String,
    pub logged_by: String,
    pub created_at: String,
}

/// Fields supplied by the caller; the store assigns id and created_at.
#[derive(Debug, Clone)]
pub struct NewAttendanceRecord {
    pub person_name: String,
    pub image: String,
    pub logged_by: String,
}

/// Repository for attendance records.
pub struct AttendanceRepository;

impl AttendanceRepository {
    /// Append a record. Returns the new record id.
    ///
    /// Rejects empty names: a record must never exist without the person it
    /// attests to.
    pub fn insert(conn: &Connection, record: &NewAttendanceRecord) -> Result<i64> {
        if record.person_name.trim().is_empty() {
            bail!("Attendance record requires a non-empty person name");
        }

        conn.execute(
            "INSERT INTO attendance (person_name, image, logged_by) VALUES (?1, ?2, ?3)",
            params![
                record.person_name.trim(),
                record.image,
                record.logged_by,
            ],
        )
        .context("Failed to insert attendance record")?;

        Ok(conn.last_insert_rowid())
    }

    /// Get a record by id.
    pub fn get(conn: &Connection, id: i64) -> Result<Option<AttendanceRecord>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, person_name, image, logged_by, created_at \
                 FROM attendance WHERE id = ?1",
            )
            .context("Failed to prepare attendance query")?;

        let mut rows = stmt
            .query_map(params![id], Self::map_row)
            .context("Failed to query attendance record")?;

        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// List records, newest first.
    pub fn list(conn: &Connection, limit: usize) -> Result<Vec<AttendanceRecord>> {
        let mut stmt = conn
            .prepare(
                "SELECT id, person_name, image, logged_by, created_at \
                 FROM attendance ORDER BY created_at DESC, id DESC LIMIT ?1",
            )
            .context("Failed to prepare attendance list query")?;

        let rows = stmt
            .query_map(params![limit as i64], Self::map_row)
            .context("Failed to list attendance records")?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }

        Ok(records)
    }

    /// Search records by name substring and optional date range, newest first.
    pub fn search(
        conn: &Connection,
        query: Option<&str>,
        date_from: Option<&str>,
        date_to: Option<&str>,
        limit: usize,
    ) -> Result<Vec<AttendanceRecord>> {
        let mut sql = "SELECT id, person_name, image, logged_by, created_at \
                       FROM attendance WHERE 1=1"
            .to_string();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(q) = query {
            sql.push_str(" AND person_name LIKE ?");
            params.push(Box::new(format!("%{}%", q)));
        }

        if let Some(from) = date_from {
            sql.push_str(" AND created_at >= ?");
            params.push(Box::new(from.to_string()));
        }

        if let Some(to) = date_to {
            sql.push_str(" AND created_at <= ?");
            params.push(Box::new(to.to_string()));
        }

        sql.push_str(" ORDER BY created_at DESC, id DESC LIMIT ?");
        params.push(Box::new(limit as i64));

        let mut stmt = conn
            .prepare(&sql)
            .context("Failed to prepare attendance search query")?;

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();

        let rows = stmt
            .query_map(param_refs.as_slice(), Self::map_row)
            .context("Failed to execute attendance search")?;

        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }

        Ok(records)
    }

    /// Count all records.
    pub fn count(conn: &Connection) -> Result<i64> {
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM attendance", [], |row| row.get(0))
            .context("Failed to count attendance records")?;

        Ok(count)
    }

    fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<AttendanceRecord> {
        Ok(AttendanceRecord {
            id: row.get(0)?,
            person_name: row.get(1)?,
            image: row.get(2)?,
            logged_by: row.get(3)?,
            created_at: row.get(4)?,
        })
    }
}
