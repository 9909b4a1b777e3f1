//! Init command - set up a new data directory

use anyhow::{Context, Result};
use colored::Colorize;
use dialoguer::Password;

use super::{get_data_dir, ADMIN_NAME, ADMIN_PHONE, ADMIN_PIN};
use crate::output;
use mobipay_core::adapters::DataDirLock;
use mobipay_core::domain::Argon2Params;
use mobipay_core::services::{EncryptionService, InitResult};
use mobipay_core::MobipayContext;

pub fn run(passphrase: Option<&str>, argon2: bool, json: bool) -> Result<()> {
    let data_dir = get_data_dir()?;
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("Failed to create {}", data_dir.display()))?;

    let passphrase = match passphrase {
        Some(p) => p.to_string(),
        None => Password::new()
            .with_prompt("New passphrase")
            .with_confirmation("Confirm passphrase", "Passphrases do not match")
            .interact()?,
    };

    let metadata = {
        let _lock = DataDirLock::acquire(&data_dir)?;
        EncryptionService::new(data_dir.clone()).initialize(argon2.then(Argon2Params::default))?
    };

    let ctx = MobipayContext::new(&data_dir, &passphrase)?;
    let admin_seeded = ctx.ensure_admin(ADMIN_PHONE, ADMIN_NAME, ADMIN_PIN)?;

    let result = InitResult {
        data_dir: data_dir.display().to_string(),
        kdf: metadata.key_derivation.name().to_string(),
        admin_seeded,
    };
    if json {
        return output::print_json(result);
    }

    output::success("Data directory initialized");
    println!("  Location: {}", result.data_dir);
    println!("  Key derivation: {}", result.kdf);
    if result.admin_seeded {
        println!(
            "  Admin account {} created with PIN '{}'. {}",
            ADMIN_PHONE,
            ADMIN_PIN,
            "Change it with `mobipay change-pin`.".yellow()
        );
    }
    Ok(())
}
