//! CLI command implementations

pub mod account;
pub mod admin;
pub mod backup;
pub mod config;
pub mod doctor;
pub mod encrypt;
pub mod init;
pub mod logs;
pub mod money;
pub mod status;

use std::fmt;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use dialoguer::Password;
use mobipay_core::services::{EntryPoint, LogEvent, LoggingService};
use mobipay_core::{Error, MobipayContext, Outcome, Rejection};

/// Seeded on first open when missing
pub const ADMIN_PHONE: &str = "9999";
pub const ADMIN_NAME: &str = "Administrator";
pub const ADMIN_PIN: &str = "admin";

/// Get the logging service for CLI operations
///
/// Returns None if logging fails to initialize (shouldn't block operations)
pub fn get_logger() -> Option<LoggingService> {
    let data_dir = get_data_dir().ok()?;
    LoggingService::new(&data_dir, EntryPoint::Cli, env!("CARGO_PKG_VERSION")).ok()
}

/// Log an event, ignoring any errors (logging should never break the app)
pub fn log_event(logger: &Option<LoggingService>, event: LogEvent) {
    if let Some(l) = logger {
        let _ = l.log(event);
    }
}

/// Get the data directory from MOBIPAY_DIR or ~/.mobipay
pub fn get_data_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("MOBIPAY_DIR") {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|home| home.join(".mobipay"))
        .ok_or_else(|| anyhow!("Could not find home directory; set MOBIPAY_DIR"))
}

/// Passphrase from --passphrase / MOBIPAY_PASSPHRASE, or a hidden prompt
pub fn get_passphrase(flag: Option<&str>) -> Result<String> {
    if let Some(p) = flag {
        return Ok(p.to_string());
    }
    let p = Password::new().with_prompt("Passphrase").interact()?;
    Ok(p)
}

/// PIN from --pin, or a hidden prompt
pub fn get_pin(flag: Option<String>, prompt: &str) -> Result<String> {
    if let Some(p) = flag {
        return Ok(p);
    }
    let p = Password::new().with_prompt(prompt).interact()?;
    Ok(p)
}

/// Open the data directory and make sure the admin account exists
pub fn get_context(passphrase: Option<&str>) -> Result<MobipayContext> {
    let data_dir = get_data_dir()?;
    let passphrase = get_passphrase(passphrase)?;

    let ctx = MobipayContext::new(&data_dir, &passphrase)
        .context("Failed to open the MobiPay data directory")?;
    if ctx.ledger.recovery().replayed() {
        eprintln!("Recovered an interrupted transaction while opening the ledger.");
    }
    ctx.ensure_admin(ADMIN_PHONE, ADMIN_NAME, ADMIN_PIN)?;
    Ok(ctx)
}

/// A business rejection surfaced as a command failure
#[derive(Debug)]
pub struct Rejected(pub Rejection);

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Rejected: {}", self.0)
    }
}

impl std::error::Error for Rejected {}

/// Unwrap a committed outcome or fail the command with the rejection
pub fn committed<T>(outcome: Outcome<T>) -> Result<T> {
    match outcome {
        Outcome::Committed(value) => Ok(value),
        Outcome::Rejected(rejection) => Err(Rejected(rejection).into()),
    }
}

/// Short failure category for the event log; never carries account data
pub fn error_kind(err: &anyhow::Error) -> String {
    if let Some(Rejected(rejection)) = err.downcast_ref::<Rejected>() {
        return format!("rejected:{}", rejection.code());
    }
    let core = err.chain().find_map(|e| e.downcast_ref::<Error>());
    match core {
        Some(Error::Authentication(_)) => "authentication",
        Some(Error::CorruptStore { .. }) => "corrupt_store",
        Some(Error::Persistence(_)) => "persistence",
        Some(Error::Locked(_)) => "locked",
        Some(Error::Integrity(_)) => "integrity",
        Some(Error::Encryption(_)) => "encryption",
        Some(Error::Io(_)) => "io",
        Some(_) => "core",
        None => "error",
    }
    .to_string()
}
