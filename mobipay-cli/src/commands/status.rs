//! Status command - show ledger status and summary

use anyhow::Result;
use colored::Colorize;

use super::get_context;
use crate::output;
use mobipay_core::adapters::StoreOrigin;

pub fn run(passphrase: Option<&str>, json: bool) -> Result<()> {
    let ctx = get_context(passphrase)?;
    let status = ctx.status_service.get_status(&ctx.encryption_service)?;

    if json {
        return output::print_json(status);
    }

    println!("{}", "Ledger Status".bold());
    println!();

    let mut table = output::create_table();
    table.add_row(vec!["Accounts".to_string(), status.total_accounts.to_string()]);
    table.add_row(vec!["Admins".to_string(), status.admin_accounts.to_string()]);
    table.add_row(vec!["Transactions".to_string(), status.total_transactions.to_string()]);
    table.add_row(vec!["Total balance".to_string(), output::money(status.total_balance)]);
    table.add_row(vec!["Fees collected".to_string(), output::money(status.fees_burned)]);
    table.add_row(vec![
        "Fees".to_string(),
        format!(
            "send {:.2} / cash out {:.2}",
            status.fees.send_money, status.fees.cash_out
        ),
    ]);
    table.add_row(vec!["Key derivation".to_string(), status.kdf.clone()]);
    if let Some(last) = &status.last_transaction {
        table.add_row(vec!["Last transaction".to_string(), last.clone()]);
    }
    println!("{}", table);
    println!();

    println!("{}", "Stores".bold());
    for store in &status.stores {
        let origin = match &store.origin {
            StoreOrigin::Fresh => "new".to_string(),
            StoreOrigin::Loaded => "loaded".to_string(),
            StoreOrigin::Reset { quarantined } => {
                format!("reset, old file kept at {}", quarantined.display())
                    .red()
                    .to_string()
            }
        };
        println!("  • {} ({}): {}", store.kind, store.file, origin);
    }

    if status.recovery.replayed() {
        println!();
        output::warning("An interrupted transaction was completed while opening the ledger.");
    }

    Ok(())
}
