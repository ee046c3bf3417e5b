use crate::db::{self, AttendanceRepository};
use anyhow::{anyhow, Result};
use arboard::Clipboard;

use super::args::HistoryCliArgs;

pub fn handle_history_command(args: HistoryCliArgs) -> Result<()> {
    let conn = db::init_db()?;

    // If copy flag is provided, copy that record's name to the clipboard
    if let Some(id) = args.copy {
        let record = AttendanceRepository::get(&conn, id)?
            .ok_or_else(|| anyhow!("Record with ID {} not found", id))?;

        let mut clipboard =
            Clipboard::new().map_err(|e| anyhow!("Failed to initialize clipboard: {}", e))?;
        clipboard
            .set_text(&record.person_name)
            .map_err(|e| anyhow!("Failed to copy to clipboard: {}", e))?;

        println!(
            "Copied name from record #{} to clipboard ({})",
            id, record.person_name
        );
        return Ok(());
    }

    // Otherwise, search and display results
    let records = AttendanceRepository::search(
        &conn,
        args.query.as_deref(),
        args.from.as_deref(),
        args.to.as_deref(),
        args.limit,
    )?;

    if records.is_empty() {
        println!("No attendance records found matching your criteria.");
        return Ok(());
    }

    println!("Found {} record(s):\n", records.len());

    for record in records {
        println!("ID: {}", record.id);
        println!("Name: {}", record.person_name);
        println!("Logged by: {}", record.logged_by);
        println!("Date: {}", record.created_at);
        println!("---");
    }

    println!("\nTo copy a name to the clipboard, use: rollcall history --copy <ID>");

    Ok(())
}
