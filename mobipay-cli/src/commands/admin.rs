//! Admin panel - list every account or the whole transaction log

use anyhow::Result;
use clap::Subcommand;
use colored::Colorize;

use super::{committed, get_context, get_pin, ADMIN_PHONE};
use super::account::AccountView;
use crate::output;

#[derive(Subcommand)]
pub enum AdminCommands {
    /// List all accounts
    Users {
        /// Admin phone number
        #[arg(long, default_value = ADMIN_PHONE)]
        phone: String,
        /// Admin PIN (prompted when omitted)
        #[arg(long)]
        pin: Option<String>,
    },
    /// Show every transaction in commit order
    Transactions {
        /// Admin phone number
        #[arg(long, default_value = ADMIN_PHONE)]
        phone: String,
        /// Admin PIN (prompted when omitted)
        #[arg(long)]
        pin: Option<String>,
        /// Only show the most recent N transactions
        #[arg(long, short = 'n')]
        limit: Option<usize>,
    },
}

pub fn run(command: AdminCommands, passphrase: Option<&str>, json: bool) -> Result<()> {
    match command {
        AdminCommands::Users { phone, pin } => {
            let pin = get_pin(pin, "Admin PIN")?;
            let ctx = get_context(passphrase)?;
            committed(ctx.ledger.authorize_admin(&phone, &pin))?;

            let accounts = ctx.ledger.accounts();
            if json {
                let views: Vec<AccountView> = accounts.iter().map(AccountView::from).collect();
                return output::print_json(views);
            }

            let mut table = output::create_table();
            table.set_header(vec!["Phone", "Name", "Role", "Balance", "Transactions"]);
            for account in &accounts {
                table.add_row(vec![
                    account.phone.clone(),
                    account.name.clone(),
                    account.role.as_str().to_string(),
                    format!("{:.2}", account.balance),
                    account.transactions.len().to_string(),
                ]);
            }
            println!("{}", table);

            let summary = ctx.ledger.summary();
            println!();
            println!(
                "{} accounts, {} held, {} collected in fees",
                summary.accounts,
                output::money(summary.total_balance).bold(),
                output::money(summary.fees_burned),
            );
        }
        AdminCommands::Transactions { phone, pin, limit } => {
            let pin = get_pin(pin, "Admin PIN")?;
            let ctx = get_context(passphrase)?;
            committed(ctx.ledger.authorize_admin(&phone, &pin))?;

            let mut transactions = ctx.ledger.transactions();
            if let Some(limit) = limit {
                let skip = transactions.len().saturating_sub(limit);
                transactions.drain(..skip);
            }
            if json {
                return output::print_json(transactions);
            }
            if transactions.is_empty() {
                println!("No transactions recorded.");
                return Ok(());
            }
            println!("{}", output::transaction_table(&transactions));
        }
    }

    Ok(())
}
