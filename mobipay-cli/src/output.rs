//! Output formatting utilities

use anyhow::Result;
use colored::Colorize;
use comfy_table::{presets::UTF8_FULL_CONDENSED, ContentArrangement, Table};
use mobipay_core::{OperationResult, Transaction};
use rust_decimal::Decimal;
use serde::Serialize;

pub fn success(msg: &str) {
    println!("{}", msg.green());
}

pub fn error(msg: &str) {
    eprintln!("{}", msg.red());
}

pub fn warning(msg: &str) {
    println!("{}", msg.yellow());
}

/// Create a styled table
pub fn create_table() -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Print `data` wrapped in a successful [`OperationResult`]
pub fn print_json<T: Serialize>(data: T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(&OperationResult::ok(data))?);
    Ok(())
}

/// Money with two decimals, e.g. `1,234.50` is printed as `1234.50 Tk`
pub fn money(amount: Decimal) -> String {
    format!("{:.2} Tk", amount)
}

pub fn transaction_table(transactions: &[Transaction]) -> Table {
    let mut table = create_table();
    table.set_header(vec!["#", "Time", "Type", "From", "To", "Amount", "Fee", "Description"]);
    for tx in transactions {
        table.add_row(vec![
            tx.sequence.to_string(),
            tx.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            tx.tx_type.as_str().to_string(),
            tx.from.clone().unwrap_or_else(|| "SYSTEM".to_string()),
            tx.to.clone().unwrap_or_else(|| "SYSTEM".to_string()),
            format!("{:.2}", tx.amount),
            format!("{:.2}", tx.fee),
            tx.description.clone(),
        ]);
    }
    table
}
