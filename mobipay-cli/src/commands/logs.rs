//! Logs command - view and manage application logs

use std::path::PathBuf;

use anyhow::{anyhow, Result};
use chrono::{Duration, TimeZone, Utc};
use clap::Subcommand;
use colored::Colorize;
use dialoguer::Confirm;

use super::get_data_dir;
use crate::output;
use mobipay_core::services::{EntryPoint, LoggingService};

#[derive(Subcommand)]
pub enum LogsCommands {
    /// Show recent log entries
    List {
        /// Number of entries to show
        #[arg(short, long, default_value = "50")]
        limit: usize,
        /// Show only errors
        #[arg(long)]
        errors: bool,
    },
    /// Clear old log entries
    Clear {
        /// Delete logs older than N days
        #[arg(long, default_value = "30")]
        older_than_days: u32,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },
    /// Show log statistics and file path
    Stats,
    /// Copy the log file, e.g. to attach to a bug report
    Export {
        /// Destination file
        path: PathBuf,
    },
}

fn get_logging_service() -> Result<LoggingService> {
    LoggingService::new(&get_data_dir()?, EntryPoint::Cli, env!("CARGO_PKG_VERSION"))
}

fn format_timestamp(timestamp_ms: i64) -> String {
    Utc.timestamp_millis_opt(timestamp_ms)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| timestamp_ms.to_string())
}

pub fn run(command: LogsCommands, json: bool) -> Result<()> {
    let service = get_logging_service()?;

    match command {
        LogsCommands::List { limit, errors } => {
            let entries = if errors {
                service.get_errors(limit)?
            } else {
                service.get_recent(limit)?
            };

            if json {
                return output::print_json(entries);
            }
            if entries.is_empty() {
                println!("No log entries found.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Time", "Entry", "Event", "Command", "Error"]);
            for entry in &entries {
                let error_indicator = if entry.error_message.is_some() {
                    "!".red().to_string()
                } else {
                    String::new()
                };
                table.add_row(vec![
                    format_timestamp(entry.timestamp),
                    entry.entry_point.clone(),
                    entry.event.clone(),
                    entry.command.clone().unwrap_or_default(),
                    error_indicator,
                ]);
            }
            println!("{}", table);

            if !errors {
                let recent_errors = service.get_errors(3)?;
                if !recent_errors.is_empty() {
                    println!();
                    println!("{}", "Recent Errors:".red().bold());
                    for err in &recent_errors {
                        println!(
                            "  {} [{}]: {}",
                            format_timestamp(err.timestamp).dimmed(),
                            err.event,
                            err.error_message.as_deref().unwrap_or("Unknown error")
                        );
                    }
                }
            }
        }
        LogsCommands::Clear {
            older_than_days,
            force,
        } => {
            let cutoff = Utc::now()
                .checked_sub_signed(Duration::days(i64::from(older_than_days)))
                .ok_or_else(|| anyhow!("--older-than-days is out of range"))?;

            if !force
                && !json
                && !Confirm::new()
                    .with_prompt(format!("Delete logs older than {} days?", older_than_days))
                    .default(false)
                    .interact()?
            {
                println!("Cancelled.");
                return Ok(());
            }

            let deleted = service.delete_before(cutoff.timestamp_millis())?;
            if json {
                return output::print_json(serde_json::json!({ "deleted": deleted }));
            }
            println!("Deleted {} log entries", deleted);
        }
        LogsCommands::Stats => {
            let total = service.count()?;
            let errors = service.get_errors(usize::MAX)?.len();
            let path = service.path().to_path_buf();
            let size_bytes = std::fs::metadata(&path).map(|m| m.len()).unwrap_or(0);

            if json {
                return output::print_json(serde_json::json!({
                    "total_entries": total,
                    "error_count": errors,
                    "log_path": path.to_string_lossy(),
                    "log_size_bytes": size_bytes,
                }));
            }
            println!("{}", "Log Statistics".bold());
            println!("  Total entries: {}", total);
            println!("  Errors: {}", errors);
            println!("  File: {}", path.display());
            println!("  Size: {} bytes", size_bytes);
        }
        LogsCommands::Export { path } => {
            let exported = service.export(&path)?;
            if json {
                return output::print_json(serde_json::json!({ "exported": exported }));
            }
            output::success(&format!("Logs exported to {}", exported.display()));
        }
    }

    Ok(())
}
