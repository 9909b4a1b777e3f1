//! Encrypt command - inspect store encryption

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::get_data_dir;
use crate::output;
use mobipay_core::services::EncryptionService;

#[derive(Subcommand)]
pub enum EncryptCommands {
    /// Show encryption status
    Status,
}

pub fn run(command: EncryptCommands, json: bool) -> Result<()> {
    let encryption_service = EncryptionService::new(get_data_dir()?);

    match command {
        EncryptCommands::Status => {
            let status = encryption_service.status()?;
            if json {
                return output::print_json(status);
            }

            println!("Stores are encrypted with {}", status.algorithm.green());
            println!("  Key derivation: {}", status.kdf);
            if !status.configured {
                println!(
                    "  {}",
                    "No encryption.json yet; the passphrase is used directly as key material."
                        .dimmed()
                );
            }
            if !encryption_service.has_store_files() {
                println!("  No ledger data has been written yet.");
            }
        }
    }

    Ok(())
}
