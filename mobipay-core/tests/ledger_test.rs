//! Ledger behaviour through the public API, against real encrypted files

use std::path::Path;

use rust_decimal::Decimal;
use tempfile::TempDir;

use mobipay_core::adapters::crypto::derive_key;
use mobipay_core::domain::{Outcome, Rejection, Role, TransactionType};
use mobipay_core::services::{DoctorService, FeeSchedule, LedgerService};
use mobipay_core::Error;

const PASSPHRASE: &[u8] = b"ledger-test-passphrase";

fn d(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn open(dir: &Path) -> LedgerService {
    LedgerService::open(dir, &derive_key(PASSPHRASE), FeeSchedule::default()).unwrap()
}

/// Ledger with A (pin 1111) and B (pin 2222)
fn two_accounts() -> (TempDir, LedgerService) {
    let dir = TempDir::new().unwrap();
    let ledger = open(dir.path());
    assert!(ledger.register("A", "Alice", "1111").unwrap().is_committed());
    assert!(ledger.register("B", "Bob", "2222").unwrap().is_committed());
    (dir, ledger)
}

#[test]
fn test_register_twice_is_rejected_without_change() {
    let (_dir, ledger) = two_accounts();
    let before = ledger.accounts();

    let outcome = ledger.register("A", "Impostor", "9999").unwrap();
    assert_eq!(
        outcome,
        Outcome::Rejected(Rejection::AccountExists {
            phone: "A".to_string()
        })
    );
    assert_eq!(ledger.accounts(), before);
    assert!(ledger.authenticate("A", "1111"));
    assert!(!ledger.authenticate("A", "9999"));
}

#[test]
fn test_phone_number_is_an_opaque_key() {
    let (dir, ledger) = two_accounts();

    let outcome = ledger.register("  ", "Blank", "1").unwrap();
    assert!(outcome.is_committed());
    assert!(ledger.authenticate("  ", "1"));
    assert_eq!(
        ledger.register("  ", "Again", "2").unwrap(),
        Outcome::Rejected(Rejection::AccountExists {
            phone: "  ".to_string()
        })
    );

    drop(ledger);
    let reopened = open(dir.path());
    assert_eq!(reopened.account_details("  ").unwrap().name, "Blank");
    assert_eq!(reopened.accounts().len(), 3);
}

#[test]
fn test_new_account_starts_empty() {
    let (_dir, ledger) = two_accounts();
    let alice = ledger.account_details("A").unwrap();
    assert_eq!(alice.name, "Alice");
    assert_eq!(alice.role, Role::User);
    assert!(alice.balance.is_zero());
    assert!(alice.transactions.is_empty());
    assert_eq!(alice.pin_hash.len(), 64);
    assert_ne!(alice.pin_hash, "1111");
}

#[test]
fn test_transfer_from_empty_account_is_rejected() {
    let (_dir, ledger) = two_accounts();

    let outcome = ledger.transfer("A", "B", d("10"), "1111").unwrap();
    assert_eq!(
        outcome.rejection(),
        Some(&Rejection::InsufficientFunds {
            required: d("13"),
            available: d("0"),
        })
    );
    assert!(ledger.transactions().is_empty());
}

#[test]
fn test_topup_then_cash_out_charges_fee() {
    let (_dir, ledger) = two_accounts();

    let topup = ledger.top_up("A", d("100"), "1111").unwrap().into_committed().unwrap();
    assert_eq!(topup.tx_type, TransactionType::Topup);
    assert_eq!(topup.from, None);
    assert_eq!(topup.to.as_deref(), Some("A"));

    let cash = ledger.cash_out("A", d("20"), "1111").unwrap().into_committed().unwrap();
    assert_eq!(ledger.balance_of("A"), Some(d("75")));
    assert_eq!(cash.tx_type, TransactionType::CashOut);
    assert_eq!(cash.from.as_deref(), Some("A"));
    assert_eq!(cash.to, None);
    assert_eq!(cash.amount, d("20"));
    assert_eq!(cash.fee, d("5"));

    let history = ledger.history("A");
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].id, topup.id);
    assert_eq!(history[1].id, cash.id);
    assert_eq!(history[1].sequence, 2);
}

#[test]
fn test_transfer_moves_amount_and_burns_fee() {
    let (_dir, ledger) = two_accounts();
    ledger.top_up("A", d("50"), "1111").unwrap();

    let tx = ledger
        .transfer("A", "B", d("10"), "1111")
        .unwrap()
        .into_committed()
        .unwrap();

    assert_eq!(ledger.balance_of("A"), Some(d("37")));
    assert_eq!(ledger.balance_of("B"), Some(d("10")));
    assert_eq!(tx.tx_type, TransactionType::SendMoney);
    assert_eq!(tx.amount, d("10"));

    let sends: Vec<_> = ledger
        .transactions()
        .into_iter()
        .filter(|t| t.tx_type == TransactionType::SendMoney)
        .collect();
    assert_eq!(sends.len(), 1);
    assert!(ledger.account_details("A").unwrap().transactions.contains(&tx.id));
    assert!(ledger.account_details("B").unwrap().transactions.contains(&tx.id));

    let summary = ledger.summary();
    assert_eq!(summary.total_balance, d("47"));
    assert_eq!(summary.fees_burned, d("3"));
}

#[test]
fn test_exact_balance_can_be_spent() {
    let (_dir, ledger) = two_accounts();
    ledger.top_up("A", d("13"), "1111").unwrap();
    assert!(ledger.transfer("A", "B", d("10"), "1111").unwrap().is_committed());
    assert_eq!(ledger.balance_of("A"), Some(Decimal::ZERO));
}

#[test]
fn test_payment_and_recharge_do_not_touch_other_accounts() {
    let (_dir, ledger) = two_accounts();
    ledger.top_up("A", d("100"), "1111").unwrap();

    let payment = ledger.pay("A", "B", d("30"), "1111").unwrap().into_committed().unwrap();
    let recharge = ledger
        .recharge("A", "01711111111", d("20"), "1111")
        .unwrap()
        .into_committed()
        .unwrap();

    assert_eq!(ledger.balance_of("A"), Some(d("50")));
    // "B" as a merchant id is not the account B
    assert_eq!(ledger.balance_of("B"), Some(Decimal::ZERO));
    assert!(ledger.history("B").is_empty());
    assert_eq!(payment.fee, Decimal::ZERO);
    assert_eq!(payment.tx_type, TransactionType::Payment);
    assert_eq!(payment.to.as_deref(), Some("B"));
    assert_eq!(payment.description, "Payment to merchant");
    assert_eq!(recharge.to.as_deref(), Some("01711111111"));
    assert_eq!(recharge.description, "Mobile recharge");
}

#[test]
fn test_rejections_leave_no_trace() {
    let (_dir, ledger) = two_accounts();
    ledger.top_up("A", d("100"), "1111").unwrap();
    let before = (ledger.accounts(), ledger.transactions());

    let cases = vec![
        ledger.transfer("A", "B", d("10"), "0000").unwrap(),
        ledger.transfer("A", "A", d("10"), "1111").unwrap(),
        ledger.transfer("A", "Z", d("10"), "1111").unwrap(),
        ledger.transfer("A", "B", d("0"), "1111").unwrap(),
        ledger.transfer("A", "B", d("-5"), "1111").unwrap(),
        ledger.transfer("A", "B", d("1.005"), "1111").unwrap(),
        ledger.cash_out("A", d("96"), "1111").unwrap(),
        ledger.pay("Z", "shop", d("1"), "1111").unwrap(),
        ledger.recharge("A", "017", d("101"), "1111").unwrap(),
        ledger.top_up("A", d("5"), "2222").unwrap(),
    ];
    let reasons: Vec<Rejection> = cases
        .into_iter()
        .map(|o| o.rejection().cloned().unwrap())
        .collect();

    assert_eq!(reasons[0], Rejection::WrongPin);
    assert_eq!(reasons[1], Rejection::SelfTransfer);
    assert_eq!(
        reasons[2],
        Rejection::UnknownAccount {
            phone: "Z".to_string()
        }
    );
    assert!(matches!(reasons[3], Rejection::InvalidAmount { .. }));
    assert!(matches!(reasons[4], Rejection::InvalidAmount { .. }));
    assert!(matches!(reasons[5], Rejection::InvalidAmount { .. }));
    assert!(matches!(reasons[6], Rejection::InsufficientFunds { .. }));
    assert!(matches!(reasons[7], Rejection::UnknownAccount { .. }));
    assert!(matches!(reasons[8], Rejection::InsufficientFunds { .. }));
    assert_eq!(reasons[9], Rejection::WrongPin);

    assert_eq!((ledger.accounts(), ledger.transactions()), before);
}

#[test]
fn test_change_pin() {
    let (_dir, ledger) = two_accounts();
    ledger.top_up("A", d("10"), "1111").unwrap();
    let log_len = ledger.transactions().len();

    let wrong = ledger.change_pin("A", "0000", "4321").unwrap();
    assert_eq!(wrong.rejection(), Some(&Rejection::WrongPin));
    assert!(ledger.authenticate("A", "1111"));

    assert!(ledger.change_pin("A", "1111", "4321").unwrap().is_committed());
    assert!(ledger.authenticate("A", "4321"));
    assert!(!ledger.authenticate("A", "1111"));
    assert_eq!(ledger.transactions().len(), log_len);
    assert_eq!(ledger.balance_of("A"), Some(d("10")));
}

#[test]
fn test_queries_for_unknown_account() {
    let (_dir, ledger) = two_accounts();
    assert_eq!(ledger.balance_of("nobody"), None);
    assert!(ledger.history("nobody").is_empty());
    assert!(!ledger.authenticate("nobody", "1111"));
}

#[test]
fn test_authorize_admin() {
    let (_dir, ledger) = two_accounts();
    ledger
        .register_with_role("9999", "Admin", "admin", Role::Admin)
        .unwrap();

    assert!(ledger.authorize_admin("9999", "admin").is_committed());
    assert_eq!(
        ledger.authorize_admin("9999", "nope").rejection(),
        Some(&Rejection::WrongPin)
    );
    assert_eq!(
        ledger.authorize_admin("A", "1111").rejection(),
        Some(&Rejection::NotPermitted)
    );
    assert_eq!(ledger.summary().admins, 1);
}

#[test]
fn test_custom_fee_schedule() {
    let dir = TempDir::new().unwrap();
    let fees = FeeSchedule {
        send_money: d("0.50"),
        cash_out: Decimal::ZERO,
    };
    let ledger = LedgerService::open(dir.path(), &derive_key(PASSPHRASE), fees).unwrap();
    ledger.register("A", "Alice", "1").unwrap();
    ledger.register("B", "Bob", "2").unwrap();
    ledger.top_up("A", d("10"), "1").unwrap();

    ledger.transfer("A", "B", d("1.25"), "1").unwrap();
    ledger.cash_out("A", d("1"), "1").unwrap();
    assert_eq!(ledger.balance_of("A"), Some(d("7.25")));
}

#[test]
fn test_balances_never_negative_over_mixed_operations() {
    let (_dir, ledger) = two_accounts();
    ledger.top_up("A", d("40"), "1111").unwrap();

    for i in 0..30 {
        let amount = Decimal::new(i * 137 % 2000 + 1, 2);
        match i % 5 {
            0 => ledger.transfer("A", "B", amount, "1111").unwrap(),
            1 => ledger.transfer("B", "A", amount, "2222").unwrap(),
            2 => ledger.cash_out("A", amount, "1111").unwrap(),
            3 => ledger.pay("B", "shop", amount, "2222").unwrap(),
            _ => ledger.recharge("A", "017", amount, "1111").unwrap(),
        };
        for account in ledger.accounts() {
            assert!(account.balance >= Decimal::ZERO, "{} went negative", account.phone);
        }
    }
}

#[test]
fn test_state_survives_reopen_and_doctor_agrees() {
    let dir = TempDir::new().unwrap();
    {
        let ledger = open(dir.path());
        ledger.register("A", "Alice", "1111").unwrap();
        ledger.register("B", "Bob", "2222").unwrap();
        ledger.top_up("A", d("100"), "1111").unwrap();
        ledger.transfer("A", "B", d("25.50"), "1111").unwrap();
        ledger.cash_out("B", d("5"), "2222").unwrap();
    }

    let ledger = std::sync::Arc::new(open(dir.path()));
    assert!(!ledger.recovery().replayed());
    assert_eq!(ledger.balance_of("A"), Some(d("71.50")));
    assert_eq!(ledger.balance_of("B"), Some(d("15.50")));
    assert_eq!(ledger.transactions().len(), 3);
    let sequences: Vec<u64> = ledger.transactions().iter().map(|t| t.sequence).collect();
    assert_eq!(sequences, vec![1, 2, 3]);

    let report = DoctorService::new(std::sync::Arc::clone(&ledger)).run_checks().unwrap();
    assert!(report.is_healthy(), "{:?}", report);
    assert_eq!(report.summary.passed, 5);
}

#[test]
fn test_wrong_passphrase_fails_to_open() {
    let dir = TempDir::new().unwrap();
    {
        let ledger = open(dir.path());
        ledger.register("A", "Alice", "1111").unwrap();
    }

    let err = LedgerService::open(dir.path(), &derive_key(b"not it"), FeeSchedule::default())
        .err()
        .unwrap();
    assert!(matches!(err, Error::Authentication(_)));

    // Nothing was discarded
    let ledger = open(dir.path());
    assert!(ledger.authenticate("A", "1111"));
}

#[test]
fn test_discarding_open_starts_over_but_keeps_files() {
    let dir = TempDir::new().unwrap();
    {
        let ledger = open(dir.path());
        ledger.register("A", "Alice", "1111").unwrap();
    }

    let ledger = LedgerService::open_discarding_unreadable(
        dir.path(),
        &derive_key(b"new key"),
        FeeSchedule::default(),
    )
    .unwrap();
    assert!(ledger.accounts().is_empty());

    let quarantined = std::fs::read_dir(dir.path())
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("accounts.dat.unreadable-"))
        .count();
    assert_eq!(quarantined, 1);
}
