//! Configuration management
//!
//! settings.json in the data directory:
//! ```json
//! {
//!   "fees": { "sendMoney": "3.00", "cashOut": "5.00" },
//!   "backups": { "maxBackups": 10 }
//! }
//! ```
//! Keys this crate does not manage are preserved on save.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::adapters::snapshot_store::write_atomic;
use crate::services::FeeSchedule;

pub const SETTINGS_FILE: &str = "settings.json";

pub const SEND_FEE_ENV: &str = "MOBIPAY_SEND_FEE";
pub const CASHOUT_FEE_ENV: &str = "MOBIPAY_CASHOUT_FEE";

/// Raw settings.json structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SettingsFile {
    #[serde(default)]
    fees: FeeSettings,
    #[serde(default)]
    backups: BackupSettings,
    #[serde(flatten)]
    other: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FeeSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    send_money: Option<Decimal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    cash_out: Option<Decimal>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BackupSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    max_backups: Option<usize>,
}

/// MobiPay configuration (simplified view of settings)
///
/// `fees` is the effective schedule, environment overrides included. Setters
/// change both the effective value and the file contents; `save` writes the
/// file contents only, so an override never ends up in settings.json.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub fees: FeeSchedule,
    /// Backups kept after `backup create`; unlimited when unset
    pub max_backups: Option<usize>,
    // Keep the raw settings for preservation when saving
    raw: SettingsFile,
}

impl Config {
    /// Load config from the data directory
    ///
    /// Fees can be overridden through `MOBIPAY_SEND_FEE` and
    /// `MOBIPAY_CASHOUT_FEE`.
    pub fn load(data_dir: &Path) -> Result<Self> {
        Self::load_with(data_dir, |name| std::env::var(name).ok())
    }

    fn load_with(data_dir: &Path, env: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let settings_path = data_dir.join(SETTINGS_FILE);

        let raw: SettingsFile = if settings_path.exists() {
            let content = std::fs::read_to_string(&settings_path)?;
            serde_json::from_str(&content)
                .with_context(|| format!("Invalid {}", settings_path.display()))?
        } else {
            SettingsFile::default()
        };

        let defaults = FeeSchedule::default();
        let mut fees = FeeSchedule {
            send_money: raw.fees.send_money.unwrap_or(defaults.send_money),
            cash_out: raw.fees.cash_out.unwrap_or(defaults.cash_out),
        };
        if let Some(value) = env(SEND_FEE_ENV) {
            fees.send_money = parse_fee(SEND_FEE_ENV, &value)?;
        }
        if let Some(value) = env(CASHOUT_FEE_ENV) {
            fees.cash_out = parse_fee(CASHOUT_FEE_ENV, &value)?;
        }
        check_fee("fees.sendMoney", fees.send_money)?;
        check_fee("fees.cashOut", fees.cash_out)?;
        check_max_backups(raw.backups.max_backups)?;

        Ok(Self {
            fees,
            max_backups: raw.backups.max_backups,
            raw,
        })
    }

    pub fn set_send_fee(&mut self, fee: Decimal) -> Result<()> {
        check_fee("send fee", fee)?;
        self.fees.send_money = fee;
        self.raw.fees.send_money = Some(fee);
        Ok(())
    }

    pub fn set_cash_out_fee(&mut self, fee: Decimal) -> Result<()> {
        check_fee("cash-out fee", fee)?;
        self.fees.cash_out = fee;
        self.raw.fees.cash_out = Some(fee);
        Ok(())
    }

    /// `None` keeps every backup
    pub fn set_max_backups(&mut self, max_backups: Option<usize>) -> Result<()> {
        check_max_backups(max_backups)?;
        self.max_backups = max_backups;
        self.raw.backups.max_backups = max_backups;
        Ok(())
    }

    /// Save config to the data directory
    /// Preserves other settings this crate doesn't manage
    pub fn save(&self, data_dir: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(&self.raw)?;
        write_atomic(&data_dir.join(SETTINGS_FILE), content.as_bytes())?;
        Ok(())
    }
}

fn parse_fee(source: &str, value: &str) -> Result<Decimal> {
    value
        .trim()
        .parse::<Decimal>()
        .with_context(|| format!("{} is not a decimal amount: {:?}", source, value))
}

fn check_fee(source: &str, fee: Decimal) -> Result<()> {
    if fee.is_sign_negative() || fee.round_dp(2) != fee {
        bail!(
            "{} must be a non-negative amount with at most 2 decimals, got {}",
            source,
            fee
        );
    }
    Ok(())
}

fn check_max_backups(max_backups: Option<usize>) -> Result<()> {
    if max_backups == Some(0) {
        bail!("backups.maxBackups must be at least 1");
    }
    Ok(())
}
