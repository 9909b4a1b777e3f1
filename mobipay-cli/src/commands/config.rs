//! Config command - view and change settings.json
//!
//! Values set through MOBIPAY_SEND_FEE / MOBIPAY_CASHOUT_FEE show up in
//! `config show` but are never written back to the file.

use anyhow::{bail, Result};
use clap::Subcommand;
use colored::Colorize;
use rust_decimal::Decimal;
use serde::Serialize;

use super::get_data_dir;
use crate::output;
use mobipay_core::adapters::DataDirLock;
use mobipay_core::config::Config;
use mobipay_core::services::FeeSchedule;

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Show the effective settings
    Show,
    /// Set a fee in settings.json
    SetFee {
        #[arg(value_enum)]
        kind: FeeKind,
        amount: Decimal,
    },
    /// Set how many backups `backup create` keeps
    SetMaxBackups {
        /// Omit to keep every backup
        count: Option<usize>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
pub enum FeeKind {
    Send,
    CashOut,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigView {
    fees: FeeSchedule,
    max_backups: Option<usize>,
}

impl From<&Config> for ConfigView {
    fn from(config: &Config) -> Self {
        Self {
            fees: config.fees,
            max_backups: config.max_backups,
        }
    }
}

pub fn run(command: ConfigCommands, json: bool) -> Result<()> {
    let data_dir = get_data_dir()?;

    if let ConfigCommands::Show = command {
        let config = Config::load(&data_dir)?;
        return show(&config, json);
    }

    if !data_dir.is_dir() {
        bail!("{} does not exist; run `mobipay init` first", data_dir.display());
    }
    let _lock = DataDirLock::acquire(&data_dir)?;
    let mut config = Config::load(&data_dir)?;
    match command {
        ConfigCommands::SetFee { kind, amount } => match kind {
            FeeKind::Send => config.set_send_fee(amount)?,
            FeeKind::CashOut => config.set_cash_out_fee(amount)?,
        },
        ConfigCommands::SetMaxBackups { count } => config.set_max_backups(count)?,
        ConfigCommands::Show => {}
    }
    config.save(&data_dir)?;

    if !json {
        output::success("Settings saved");
    }
    show(&config, json)
}

fn show(config: &Config, json: bool) -> Result<()> {
    if json {
        return output::print_json(ConfigView::from(config));
    }
    println!("{}", "Settings".bold());
    println!("  Send fee: {}", output::money(config.fees.send_money));
    println!("  Cash-out fee: {}", output::money(config.fees.cash_out));
    match config.max_backups {
        Some(n) => println!("  Backups kept: {}", n),
        None => println!("  Backups kept: all"),
    }
    Ok(())
}
