use anyhow::{Context, Result};
use rusqlite::Connection;

pub mod attendance;

pub use attendance::{AttendanceRecord, AttendanceRepository, NewAttendanceRecord};

pub fn init_db() -> Result<Connection> {
    let db_path = crate::global::db_file()?;

    // Ensure parent directory exists
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).context("Failed to create database directory")?;
    }

    let conn = Connection::open(&db_path).context("Failed to open database connection")?;

    migrate(&conn)?;

    Ok(conn)
}

pub fn migrate(conn: &Connection) -> Result<()> {
    // Append-only: no update or delete path exists for attendance rows, and
    // created_at is assigned by the store, never by the caller.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS attendance (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            person_name TEXT NOT NULL,
            image TEXT NOT NULL,
            logged_by TEXT NOT NULL,
            created_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
        )",
        [],
    )
    .context("Failed to create attendance table")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_created_at ON attendance(created_at DESC)",
        [],
    )
    .context("Failed to create index on created_at")?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_attendance_person_name ON attendance(person_name)",
        [],
    )
    .context("Failed to create index on person_name")?;

    Ok(())
}

/// Write seam between the capture machine and the attendance table, so tests
/// can substitute a double for the real database.
pub trait RecordStore: Send + Sync {
    /// Append one attendance record. Returns the new record id.
    fn insert(&self, record: &NewAttendanceRecord) -> Result<i64>;
}

/// Record store backed by the local SQLite database.
pub struct SqliteStore;

impl RecordStore for SqliteStore {
    fn insert(&self, record: &NewAttendanceRecord) -> Result<i64> {
        let conn = init_db()?;
        AttendanceRepository::insert(&conn, record)
    }
}
