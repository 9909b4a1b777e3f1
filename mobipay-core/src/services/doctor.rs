//! Doctor service - ledger consistency checks

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Result;
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::json;

use super::ledger::LedgerService;
use crate::domain::{AccountBook, TransactionLog};

pub struct DoctorService {
    ledger: Arc<LedgerService>,
}

impl DoctorService {
    pub fn new(ledger: Arc<LedgerService>) -> Self {
        Self { ledger }
    }

    /// Run all health checks against one consistent publication
    pub fn run_checks(&self) -> Result<DoctorResult> {
        let (book, log) = self.ledger.snapshot();
        Ok(diagnose(&book, &log, self.ledger.has_pending_intent()))
    }
}

fn check(
    ok: bool,
    failure: &str,
    pass_msg: &str,
    fail_msg: String,
    details: Vec<serde_json::Value>,
) -> CheckResult {
    if ok {
        CheckResult {
            status: "pass".to_string(),
            message: pass_msg.to_string(),
            details: None,
        }
    } else {
        CheckResult {
            status: failure.to_string(),
            message: fail_msg,
            details: Some(details),
        }
    }
}

fn diagnose(book: &AccountBook, log: &TransactionLog, pending_intent: bool) -> DoctorResult {
    let mut checks = HashMap::new();

    // Every account a transaction touches lists it
    let unlinked: Vec<serde_json::Value> = log
        .iter()
        .flat_map(|tx| {
            tx.account_refs()
                .into_iter()
                .filter(|phone| {
                    book.get(phone)
                        .is_some_and(|a| !a.transactions.contains(&tx.id))
                })
                .map(|phone| json!({"transaction_id": tx.id, "account": phone}))
                .collect::<Vec<_>>()
        })
        .collect();
    checks.insert(
        "transaction_linkage".to_string(),
        check(
            unlinked.is_empty(),
            "error",
            "Every transaction is linked to its accounts",
            format!("{} transaction link(s) missing", unlinked.len()),
            unlinked,
        ),
    );

    // References that point nowhere, in either direction
    let mut orphans: Vec<serde_json::Value> = Vec::new();
    for tx in log.iter() {
        for phone in tx.account_refs() {
            if !book.contains(phone) {
                orphans.push(json!({"transaction_id": tx.id, "missing_account": phone}));
            }
        }
    }
    for account in book.sorted() {
        for id in &account.transactions {
            if !log.contains(id) {
                orphans.push(json!({"account": account.phone, "missing_transaction": id}));
            }
        }
    }
    checks.insert(
        "orphaned_references".to_string(),
        check(
            orphans.is_empty(),
            "error",
            "No dangling references",
            format!("{} dangling reference(s)", orphans.len()),
            orphans,
        ),
    );

    let negative: Vec<serde_json::Value> = book
        .sorted()
        .into_iter()
        .filter(|a| a.balance < Decimal::ZERO)
        .map(|a| json!({"account": a.phone}))
        .collect();
    checks.insert(
        "negative_balances".to_string(),
        check(
            negative.is_empty(),
            "error",
            "No negative balances",
            format!("{} account(s) below zero", negative.len()),
            negative,
        ),
    );

    // Accounts start at zero, so replaying the log must reproduce every balance
    let mut replayed: HashMap<&str, Decimal> = HashMap::new();
    for tx in log.iter() {
        if let Some(from) = tx.debited_account() {
            *replayed.entry(from).or_default() -= tx.debit_total();
        }
        if let Some(to) = tx.credited_account() {
            *replayed.entry(to).or_default() += tx.amount;
        }
    }
    let mismatched: Vec<serde_json::Value> = book
        .sorted()
        .into_iter()
        .filter(|a| replayed.get(a.phone.as_str()).copied().unwrap_or_default() != a.balance)
        .map(|a| json!({"account": a.phone}))
        .collect();
    checks.insert(
        "balance_reconciliation".to_string(),
        check(
            mismatched.is_empty(),
            "error",
            "Balances match the transaction log",
            format!("{} balance(s) disagree with the log", mismatched.len()),
            mismatched,
        ),
    );

    checks.insert(
        "pending_intent".to_string(),
        check(
            !pending_intent,
            "warning",
            "Commit journal is clear",
            "A commit intent is pending; it will be replayed on next open".to_string(),
            Vec::new(),
        ),
    );

    let passed = checks.values().filter(|c| c.status == "pass").count() as i64;
    let warnings = checks.values().filter(|c| c.status == "warning").count() as i64;
    let errors = checks.values().filter(|c| c.status == "error").count() as i64;

    DoctorResult {
        checks,
        summary: DoctorSummary {
            passed,
            warnings,
            errors,
        },
    }
}

#[derive(Debug, Serialize)]
pub struct DoctorResult {
    pub checks: HashMap<String, CheckResult>,
    pub summary: DoctorSummary,
}

impl DoctorResult {
    pub fn is_healthy(&self) -> bool {
        self.summary.errors == 0
    }
}

#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub status: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize)]
pub struct DoctorSummary {
    pub passed: i64,
    pub warnings: i64,
    pub errors: i64,
}
