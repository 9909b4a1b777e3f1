//! Money commands - send, cash-out, pay, recharge, top-up

use anyhow::Result;
use rust_decimal::Decimal;

use super::{committed, get_context, get_pin};
use crate::output;
use mobipay_core::Transaction;

/// Which ledger operation to run
pub enum Movement<'a> {
    Send { to: &'a str },
    CashOut,
    Pay { merchant: &'a str },
    Recharge { number: &'a str },
    TopUp,
}

impl Movement<'_> {
    fn label(&self) -> &'static str {
        match self {
            Movement::Send { .. } => "Money sent",
            Movement::CashOut => "Cash out complete",
            Movement::Pay { .. } => "Payment complete",
            Movement::Recharge { .. } => "Recharge complete",
            Movement::TopUp => "Money added",
        }
    }
}

pub fn run(
    passphrase: Option<&str>,
    phone: &str,
    movement: Movement<'_>,
    amount: Decimal,
    pin: Option<String>,
    json: bool,
) -> Result<()> {
    let pin = get_pin(pin, "PIN")?;
    let ctx = get_context(passphrase)?;
    let ledger = &ctx.ledger;

    let outcome = match &movement {
        Movement::Send { to } => ledger.transfer(phone, to, amount, &pin)?,
        Movement::CashOut => ledger.cash_out(phone, amount, &pin)?,
        Movement::Pay { merchant } => ledger.pay(phone, merchant, amount, &pin)?,
        Movement::Recharge { number } => ledger.recharge(phone, number, amount, &pin)?,
        Movement::TopUp => ledger.top_up(phone, amount, &pin)?,
    };
    let tx = committed(outcome)?;

    if json {
        return output::print_json(tx);
    }
    print_receipt(movement.label(), &tx, ledger.balance_of(phone));
    Ok(())
}

fn print_receipt(label: &str, tx: &Transaction, balance: Option<Decimal>) {
    output::success(label);
    println!("  Transaction: {}", tx.id);
    if let Some(to) = &tx.to {
        println!("  To:          {}", to);
    }
    println!("  Amount:      {}", output::money(tx.amount));
    if !tx.fee.is_zero() {
        println!("  Fee:         {}", output::money(tx.fee));
    }
    if let Some(balance) = balance {
        println!("  New balance: {}", output::money(balance));
    }
}
