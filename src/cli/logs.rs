use anyhow::Result;

use crate::logs::{self, LogsOptions};

use super::args::LogsCliArgs;

pub fn handle_logs_command(args: LogsCliArgs) -> Result<()> {
    let result = logs::get_logs(&LogsOptions::new(args.lines))?;

    if result.app_logs.is_empty() {
        println!("No service logs available (is rollcall.service running?).");
    } else {
        println!("Service logs:");
        for line in &result.app_logs {
            println!("  {}", line);
        }
    }

    if !result.records.is_empty() {
        println!("\nRecent records:");
        for record in &result.records {
            println!(
                "  #{} {} ({}) at {}",
                record.id, record.person_name, record.logged_by, record.created_at
            );
        }
    }

    Ok(())
}
