//! Account commands - register, login, balance, history, change-pin

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use colored::Colorize;
use rust_decimal::Decimal;
use serde::Serialize;

use super::{committed, get_context, get_pin};
use crate::output;
use mobipay_core::{Account, MobipayContext, Transaction};

/// Account as shown to its owner; the PIN digest stays in the store
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    pub phone: String,
    pub name: String,
    pub balance: Decimal,
    pub role: &'static str,
    pub created_at: DateTime<Utc>,
    pub transaction_count: usize,
}

impl From<&Account> for AccountView {
    fn from(account: &Account) -> Self {
        Self {
            phone: account.phone.clone(),
            name: account.name.clone(),
            balance: account.balance,
            role: account.role.as_str(),
            created_at: account.created_at,
            transaction_count: account.transactions.len(),
        }
    }
}

/// Open the ledger and check the PIN of `phone`
fn authenticated(
    passphrase: Option<&str>,
    phone: &str,
    pin: Option<String>,
) -> Result<(MobipayContext, Account)> {
    let pin = get_pin(pin, "PIN")?;
    let ctx = get_context(passphrase)?;
    if !ctx.ledger.authenticate(phone, &pin) {
        bail!("Invalid phone number or PIN");
    }
    match ctx.ledger.account_details(phone) {
        Some(account) => Ok((ctx, account)),
        None => bail!("Invalid phone number or PIN"),
    }
}

pub fn register(
    passphrase: Option<&str>,
    phone: &str,
    name: &str,
    pin: Option<String>,
    json: bool,
) -> Result<()> {
    let pin = match pin {
        Some(p) => p,
        None => dialoguer::Password::new()
            .with_prompt("Choose a PIN")
            .with_confirmation("Confirm PIN", "PINs do not match")
            .interact()?,
    };
    let ctx = get_context(passphrase)?;
    let account = committed(ctx.ledger.register(phone, name, &pin)?)?;

    if json {
        return output::print_json(AccountView::from(&account));
    }
    output::success("Account registered");
    println!("  Phone: {}", account.phone);
    println!("  Name:  {}", account.name);
    Ok(())
}

pub fn login(passphrase: Option<&str>, phone: &str, pin: Option<String>, json: bool) -> Result<()> {
    let (_ctx, account) = authenticated(passphrase, phone, pin)?;

    if json {
        return output::print_json(AccountView::from(&account));
    }
    output::success(&format!("Welcome, {}", account.name));
    println!("  Phone:        {}", account.phone);
    println!("  Role:         {}", account.role.as_str());
    println!("  Balance:      {}", output::money(account.balance));
    println!("  Transactions: {}", account.transactions.len());
    Ok(())
}

pub fn balance(
    passphrase: Option<&str>,
    phone: &str,
    pin: Option<String>,
    json: bool,
) -> Result<()> {
    let (_ctx, account) = authenticated(passphrase, phone, pin)?;

    if json {
        return output::print_json(serde_json::json!({
            "phone": account.phone,
            "balance": account.balance,
        }));
    }
    println!("{} {}", "Balance:".bold(), output::money(account.balance));
    Ok(())
}

pub fn history(
    passphrase: Option<&str>,
    phone: &str,
    pin: Option<String>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    let (ctx, _account) = authenticated(passphrase, phone, pin)?;
    let mut transactions: Vec<Transaction> = ctx.ledger.history(phone);
    if let Some(limit) = limit {
        let skip = transactions.len().saturating_sub(limit);
        transactions.drain(..skip);
    }

    if json {
        return output::print_json(transactions);
    }
    if transactions.is_empty() {
        println!("No transactions yet.");
        return Ok(());
    }
    println!("{}", output::transaction_table(&transactions));
    Ok(())
}

pub fn change_pin(
    passphrase: Option<&str>,
    phone: &str,
    old_pin: Option<String>,
    new_pin: Option<String>,
    json: bool,
) -> Result<()> {
    let old_pin = get_pin(old_pin, "Current PIN")?;
    let new_pin = match new_pin {
        Some(p) => p,
        None => dialoguer::Password::new()
            .with_prompt("New PIN")
            .with_confirmation("Confirm new PIN", "PINs do not match")
            .interact()?,
    };
    let ctx = get_context(passphrase)?;
    committed(ctx.ledger.change_pin(phone, &old_pin, &new_pin)?)?;

    if json {
        return output::print_json(serde_json::json!({ "changed": true }));
    }
    output::success("PIN changed");
    Ok(())
}
