//! Backup command - manage data directory backups
//!
//! Backups copy the encrypted files as they are, so no passphrase is needed.
//! Create and restore hold the data-directory lock so no ledger is open
//! while files are read or replaced.

use anyhow::Result;
use clap::Subcommand;
use dialoguer::Confirm;

use super::get_data_dir;
use crate::output;
use mobipay_core::adapters::DataDirLock;
use mobipay_core::config::Config;
use mobipay_core::services::BackupService;

#[derive(Subcommand)]
pub enum BackupCommands {
    /// Create a new backup
    Create {
        /// Maximum number of backups to keep (defaults to backups.maxBackups)
        #[arg(long, short = 'm')]
        max_backups: Option<usize>,
    },
    /// List available backups
    List,
    /// Restore from a backup
    Restore {
        /// Backup name to restore
        name: String,
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },
    /// Clear all backups
    Clear {
        /// Skip confirmation prompt
        #[arg(long, short = 'f')]
        force: bool,
    },
}

pub fn run(command: BackupCommands, json: bool) -> Result<()> {
    let data_dir = get_data_dir()?;
    let backup_service = BackupService::new(data_dir.clone());

    match command {
        BackupCommands::Create { max_backups } => {
            let _lock = DataDirLock::acquire(&data_dir)?;
            let max_backups = max_backups.or(Config::load(&data_dir)?.max_backups);
            let result = backup_service.create(max_backups)?;
            if json {
                return output::print_json(result);
            }
            output::success("Backup created");
            println!("  Name: {}", result.name);
            println!("  Size: {}", result.size_display());
        }
        BackupCommands::List => {
            let backups = backup_service.list()?;

            if json {
                return output::print_json(backups);
            }
            if backups.is_empty() {
                println!("No backups found.");
                return Ok(());
            }

            let mut table = output::create_table();
            table.set_header(vec!["Name", "Created", "Size"]);
            for backup in &backups {
                table.add_row(vec![
                    backup.name.clone(),
                    backup.created_at.format("%Y-%m-%d %H:%M:%S").to_string(),
                    backup.size_display(),
                ]);
            }
            println!("{}", table);
        }
        BackupCommands::Restore { name, force } => {
            if !force
                && !json
                && !Confirm::new()
                    .with_prompt(format!("Restore from backup '{}'?", name))
                    .default(false)
                    .interact()?
            {
                println!("Cancelled.");
                return Ok(());
            }
            let _lock = DataDirLock::acquire(&data_dir)?;
            let result = backup_service.restore(&name)?;
            if json {
                return output::print_json(result);
            }
            output::success(&format!("Data restored from backup: {}", name));
            if let Some(pre_restore) = &result.pre_restore {
                println!("  Previous files saved as: {}", pre_restore);
            }
            println!("  Run `mobipay doctor` to check the restored ledger.");
        }
        BackupCommands::Clear { force } => {
            if !force
                && !json
                && !Confirm::new()
                    .with_prompt("Delete all backups?")
                    .default(false)
                    .interact()?
            {
                println!("Cancelled.");
                return Ok(());
            }
            let result = backup_service.clear()?;
            if json {
                return output::print_json(result);
            }
            println!("Deleted {} backup(s)", result.deleted);
        }
    }

    Ok(())
}
